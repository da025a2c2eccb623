use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use tracing::debug;

use crate::mediawiki::{NS_TEMPLATE, WikiMetadataApi, strip_namespace};

/// Memoized alias sets keyed by canonical template name.
///
/// Entries never expire on their own; the redirect graph is treated as stable
/// for as long as the cache lives. Call [`AliasCache::clear`] to force fresh
/// lookups. Failed lookups are never stored.
#[derive(Debug, Default)]
pub struct AliasCache {
    entries: HashMap<String, BTreeSet<String>>,
}

impl AliasCache {
    pub fn get(&self, canonical_name: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(canonical_name)
    }

    pub fn insert(&mut self, canonical_name: &str, aliases: BTreeSet<String>) {
        self.entries.insert(canonical_name.to_string(), aliases);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub struct TemplateAliasResolver<A: WikiMetadataApi> {
    api: A,
    cache: AliasCache,
}

impl<A: WikiMetadataApi> TemplateAliasResolver<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            cache: AliasCache::default(),
        }
    }

    /// Every name `Template:<canonical_name>` is reachable under, including itself.
    pub fn resolve_aliases(&mut self, canonical_name: &str) -> Result<BTreeSet<String>> {
        if let Some(cached) = self.cache.get(canonical_name) {
            return Ok(cached.clone());
        }

        let title = format!("Template:{canonical_name}");
        let redirects = self
            .api
            .get_redirects(&title, NS_TEMPLATE)
            .with_context(|| format!("failed to resolve redirects for {title}"))?;

        let mut aliases = redirects
            .iter()
            .map(|redirect| strip_namespace(redirect, "Template"))
            .filter(|name| !name.is_empty())
            .collect::<BTreeSet<_>>();
        aliases.insert(canonical_name.to_string());
        debug!(canonical_name, aliases = aliases.len(), "resolved template aliases");

        self.cache.insert(canonical_name, aliases.clone());
        Ok(aliases)
    }

    pub fn cache(&self) -> &AliasCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut AliasCache {
        &mut self.cache
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::bail;

    use super::TemplateAliasResolver;
    use crate::mediawiki::WikiMetadataApi;

    #[derive(Default)]
    struct MockApi {
        redirects: BTreeMap<String, Vec<String>>,
        fail: bool,
        request_count: usize,
    }

    impl WikiMetadataApi for MockApi {
        fn get_redirects(&mut self, title: &str, _namespace: i32) -> anyhow::Result<Vec<String>> {
            self.request_count += 1;
            if self.fail {
                bail!("MediaWiki API request failed with HTTP 503 Service Unavailable");
            }
            Ok(self.redirects.get(title).cloned().unwrap_or_default())
        }

        fn request_count(&self) -> usize {
            self.request_count
        }
    }

    #[test]
    fn resolve_aliases_includes_canonical_name_and_strips_namespace() {
        let mut api = MockApi::default();
        api.redirects.insert(
            "Template:Cite web".to_string(),
            vec!["Template:Cite url".to_string(), "Template:Web cite".to_string()],
        );
        let mut resolver = TemplateAliasResolver::new(api);

        let aliases = resolver.resolve_aliases("Cite web").expect("resolve");
        let names = aliases.iter().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(names, vec!["Cite url", "Cite web", "Web cite"]);
    }

    #[test]
    fn resolve_aliases_memoizes_per_name() {
        let mut resolver = TemplateAliasResolver::new(MockApi::default());
        resolver.resolve_aliases("Cite web").expect("first");
        resolver.resolve_aliases("Cite web").expect("second");
        resolver.resolve_aliases("Dead link").expect("third");

        assert_eq!(resolver.api().request_count(), 2);
        assert_eq!(resolver.cache().len(), 2);

        resolver.cache_mut().clear();
        resolver.resolve_aliases("Cite web").expect("after clear");
        assert_eq!(resolver.api().request_count(), 3);
    }

    #[test]
    fn resolve_aliases_propagates_lookup_failure_without_caching() {
        let api = MockApi {
            fail: true,
            ..MockApi::default()
        };
        let mut resolver = TemplateAliasResolver::new(api);

        let error = resolver.resolve_aliases("Cite web").expect_err("must fail");
        assert!(error.to_string().contains("Template:Cite web"));
        assert!(resolver.cache().is_empty());
    }
}
