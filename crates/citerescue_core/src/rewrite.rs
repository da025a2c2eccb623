use std::collections::BTreeSet;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::accessdate::extract_accessdate;
use crate::aliases::TemplateAliasResolver;
use crate::mediawiki::WikiMetadataApi;
use crate::wayback::{Snapshot, SnapshotLookup};
use crate::wikitext::{Document, NodeId};

/// Parameter names that mean a citation already points at an archive.
const ARCHIVE_URL_PARAMS: [&str; 2] = ["archiveurl", "archive-url"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReferenceOutcome {
    NoCitation,
    Ambiguous { citations: usize },
    MissingUrl,
    AlreadyArchived,
    NoSnapshot,
    Archived {
        archive_url: String,
        archive_date: String,
        merged_dead_link: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceReport {
    pub index: usize,
    pub outcome: ReferenceOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewriteOutcome {
    pub text: String,
    pub references: Vec<ReferenceReport>,
}

impl RewriteOutcome {
    pub fn archived_count(&self) -> usize {
        self.references
            .iter()
            .filter(|report| matches!(report.outcome, ReferenceOutcome::Archived { .. }))
            .count()
    }
}

#[derive(Debug)]
struct ArchivePlan {
    citation: NodeId,
    marker: Option<NodeId>,
    snapshot: Snapshot,
    archive_date: String,
}

pub struct CitationRewriter<A: WikiMetadataApi, L: SnapshotLookup> {
    resolver: TemplateAliasResolver<A>,
    lookup: L,
    citation_template: String,
    dead_link_template: String,
}

impl<A: WikiMetadataApi, L: SnapshotLookup> CitationRewriter<A, L> {
    pub fn new(
        resolver: TemplateAliasResolver<A>,
        lookup: L,
        citation_template: &str,
        dead_link_template: &str,
    ) -> Self {
        Self {
            resolver,
            lookup,
            citation_template: citation_template.to_string(),
            dead_link_template: dead_link_template.to_string(),
        }
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    pub fn resolver(&self) -> &TemplateAliasResolver<A> {
        &self.resolver
    }

    /// Add archive links to every unambiguous dead citation in `document_text`.
    ///
    /// Alias resolution failures abort the whole rewrite; every other problem
    /// only leaves the affected reference untouched.
    pub fn rewrite(&mut self, document_text: &str) -> Result<RewriteOutcome> {
        let mut document = Document::parse(document_text);
        let refs = document.ref_tags();
        if refs.is_empty() {
            return Ok(RewriteOutcome {
                text: document_text.to_string(),
                references: Vec::new(),
            });
        }

        let citation_names = self.resolver.resolve_aliases(&self.citation_template)?;
        let dead_link_names = self.resolver.resolve_aliases(&self.dead_link_template)?;

        let mut plans = Vec::new();
        let mut references = Vec::with_capacity(refs.len());
        for (index, tag) in refs.into_iter().enumerate() {
            let (outcome, plan) =
                self.plan_reference(&document, tag, &citation_names, &dead_link_names);
            debug!(reference = index, ?outcome, "reference inspected");
            if let Some(plan) = plan {
                plans.push(plan);
            }
            references.push(ReferenceReport { index, outcome });
        }

        for plan in &plans {
            apply_plan(&mut document, plan);
        }

        let outcome = RewriteOutcome {
            text: document.render(),
            references,
        };
        info!(
            references = outcome.references.len(),
            archived = outcome.archived_count(),
            "rewrite finished"
        );
        Ok(outcome)
    }

    fn plan_reference(
        &mut self,
        document: &Document,
        tag: NodeId,
        citation_names: &BTreeSet<String>,
        dead_link_names: &BTreeSet<String>,
    ) -> (ReferenceOutcome, Option<ArchivePlan>) {
        let body = document
            .tag(tag)
            .and_then(|tag| tag.body())
            .unwrap_or_default();

        let mut citations = Vec::new();
        let mut marker = None;
        for id in document.templates_within(body) {
            let Some(template) = document.template(id) else {
                continue;
            };
            if template.matches(citation_names) {
                citations.push(id);
            } else if template.matches(dead_link_names) {
                marker = Some(id);
            }
        }

        let citation = match citations.as_slice() {
            [] => return (ReferenceOutcome::NoCitation, None),
            [single] => *single,
            many => {
                return (
                    ReferenceOutcome::Ambiguous {
                        citations: many.len(),
                    },
                    None,
                );
            }
        };

        let Some(template) = document.template(citation) else {
            return (ReferenceOutcome::NoCitation, None);
        };
        if ARCHIVE_URL_PARAMS
            .iter()
            .any(|name| template.has_param(name))
        {
            return (ReferenceOutcome::AlreadyArchived, None);
        }
        let url = match document.param_value(citation, "url") {
            Some(url) if !url.is_empty() => url,
            _ => return (ReferenceOutcome::MissingUrl, None),
        };

        let accessdate = extract_accessdate(&document.render_ids(body));
        let snapshot = match self.lookup.lookup(&url, accessdate) {
            Some(snapshot) => snapshot,
            None => return (ReferenceOutcome::NoSnapshot, None),
        };
        let Some(archive_date) = snapshot.archive_date() else {
            debug!(timestamp = %snapshot.timestamp, "snapshot timestamp is not formattable");
            return (ReferenceOutcome::NoSnapshot, None);
        };

        (
            ReferenceOutcome::Archived {
                archive_url: snapshot.url.clone(),
                archive_date: archive_date.clone(),
                merged_dead_link: marker.is_some(),
            },
            Some(ArchivePlan {
                citation,
                marker,
                snapshot,
                archive_date,
            }),
        )
    }
}

/// Merge archive data into the citation, then drop the absorbed marker.
fn apply_plan(document: &mut Document, plan: &ArchivePlan) {
    document.set_param(plan.citation, "archiveurl", &plan.snapshot.url);
    document.set_param(plan.citation, "deadurl", "no");
    document.set_param(plan.citation, "archivedate", &plan.archive_date);

    if let Some(marker) = plan.marker {
        document.set_param(plan.citation, "deadurl", "yes");
        document.remove(marker);
    }
}
