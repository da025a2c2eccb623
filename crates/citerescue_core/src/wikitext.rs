//! Minimal wikitext tree: plain text, comments, `<ref>` tags and templates.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`], so callers can record ids during a read-only walk and mutate
//! afterwards. Anything the parser does not model stays as text, which keeps
//! `Document::parse(text).render() == text` for every input.

use std::collections::{BTreeSet, HashSet};

/// Tags whose content is never parsed for templates.
const OPAQUE_TAGS: [&str; 7] = [
    "nowiki",
    "pre",
    "math",
    "syntaxhighlight",
    "source",
    "score",
    "chem",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Comment(String),
    Tag(TagNode),
    Template(TemplateNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNode {
    pub name: String,
    open: String,
    body: Option<Vec<NodeId>>,
    close: String,
}

impl TagNode {
    pub fn body(&self) -> Option<&[NodeId]> {
        self.body.as_deref()
    }

    pub fn is_self_closing(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNode {
    name: String,
    params: Vec<Param>,
}

/// One `|...` field. `name` keeps its surrounding whitespace; positional
/// fields have no name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    name: Option<String>,
    value: Vec<NodeId>,
}

impl Param {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim)
    }
}

impl TemplateNode {
    pub fn name(&self) -> String {
        normalize_template_name(&self.name)
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// MediaWiki-style name comparison against a set of candidate names.
    pub fn matches(&self, names: &BTreeSet<String>) -> bool {
        let own = self.name();
        !own.is_empty()
            && names
                .iter()
                .any(|candidate| normalize_template_name(candidate) == own)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.param_index(name).is_some()
    }

    fn param_index(&self, name: &str) -> Option<usize> {
        self.params
            .iter()
            .position(|param| param.name() == Some(name.trim()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
    root: Vec<NodeId>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let mut parser = Parser {
            src: text,
            pos: 0,
            nodes: Vec::new(),
            unclosed: HashSet::new(),
        };
        let root = parser.parse_nodes(Stop::Eof).unwrap_or_default();
        Self {
            nodes: parser.nodes,
            root,
        }
    }

    pub fn root(&self) -> &[NodeId] {
        &self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn tag(&self, id: NodeId) -> Option<&TagNode> {
        match self.nodes.get(id.0) {
            Some(Node::Tag(tag)) => Some(tag),
            _ => None,
        }
    }

    pub fn template(&self, id: NodeId) -> Option<&TemplateNode> {
        match self.nodes.get(id.0) {
            Some(Node::Template(template)) => Some(template),
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&self.root, &mut out);
        out
    }

    pub fn render_ids(&self, ids: &[NodeId]) -> String {
        let mut out = String::new();
        self.render_into(ids, &mut out);
        out
    }

    fn render_into(&self, ids: &[NodeId], out: &mut String) {
        render_nodes(&self.nodes, ids, out);
    }

    /// `<ref>` tags with a body, in document order, including ones nested in templates.
    pub fn ref_tags(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(&self.root, &mut |id, node| {
            if let Node::Tag(tag) = node
                && tag.name.eq_ignore_ascii_case("ref")
                && !tag.is_self_closing()
            {
                out.push(id);
            }
        });
        out
    }

    /// Templates under `ids`, outer before inner.
    pub fn templates_within(&self, ids: &[NodeId]) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(ids, &mut |id, node| {
            if matches!(node, Node::Template(_)) {
                out.push(id);
            }
        });
        out
    }

    fn walk(&self, ids: &[NodeId], visit: &mut dyn FnMut(NodeId, &Node)) {
        for id in ids {
            let node = self.node(*id);
            visit(*id, node);
            match node {
                Node::Tag(tag) => {
                    if let Some(body) = &tag.body {
                        self.walk(body, visit);
                    }
                }
                Node::Template(template) => {
                    for param in &template.params {
                        self.walk(&param.value, visit);
                    }
                }
                Node::Text(_) | Node::Comment(_) => {}
            }
        }
    }

    /// Trimmed text of a named parameter.
    pub fn param_value(&self, template: NodeId, name: &str) -> Option<String> {
        let node = self.template(template)?;
        let index = node.param_index(name)?;
        Some(self.render_ids(&node.params[index].value).trim().to_string())
    }

    /// Replace an existing parameter's value (keeping its surrounding
    /// whitespace) or append a new one styled like the last parameter.
    /// Returns false when `template` is not a template node.
    pub fn set_param(&mut self, template: NodeId, name: &str, value: &str) -> bool {
        let Some(node) = self.template(template) else {
            return false;
        };

        if let Some(index) = node.param_index(name) {
            let old = self.render_ids(&node.params[index].value);
            let (leading, trailing) = surrounding_whitespace(&old);
            let text = self.alloc(Node::Text(format!("{leading}{value}{trailing}")));
            if let Some(Node::Template(node)) = self.nodes.get_mut(template.0) {
                node.params[index].value = vec![text];
            }
            return true;
        }

        let style = self.param_style(template);
        let trailing = self.closing_whitespace(template);
        let text = self.alloc(Node::Text(format!(
            "{}{value}{trailing}",
            style.value_leading
        )));
        if let Some(Node::Template(node)) = self.nodes.get_mut(template.0) {
            node.params.push(Param {
                name: Some(format!("{}{name}{}", style.name_leading, style.name_trailing)),
                value: vec![text],
            });
        }
        true
    }

    /// Detach `id` from whichever container holds it.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if let Some(index) = self.root.iter().position(|child| *child == id) {
            self.root.remove(index);
            return true;
        }
        for node in &mut self.nodes {
            let containers: Vec<&mut Vec<NodeId>> = match node {
                Node::Tag(tag) => tag.body.iter_mut().collect(),
                Node::Template(template) => template
                    .params
                    .iter_mut()
                    .map(|param| &mut param.value)
                    .collect(),
                Node::Text(_) | Node::Comment(_) => Vec::new(),
            };
            for container in containers {
                if let Some(index) = container.iter().position(|child| *child == id) {
                    container.remove(index);
                    return true;
                }
            }
        }
        false
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn param_style(&self, template: NodeId) -> ParamStyle {
        let Some(node) = self.template(template) else {
            return ParamStyle::default();
        };
        let Some(last_named) = node.params.iter().rev().find(|param| param.name.is_some()) else {
            return ParamStyle::default();
        };
        let raw_name = last_named.name.as_deref().unwrap_or("");
        let (name_leading, name_trailing) = surrounding_whitespace(raw_name);
        let value = self.render_ids(&last_named.value);
        let value_leading = &value[..value.len() - value.trim_start().len()];
        ParamStyle {
            name_leading: name_leading.to_string(),
            name_trailing: name_trailing.to_string(),
            value_leading: if value.trim().is_empty() {
                String::new()
            } else {
                value_leading.to_string()
            },
        }
    }

    /// Whitespace that closes the last parameter (or the name), repeated
    /// after an appended parameter so line layout is kept.
    fn closing_whitespace(&self, template: NodeId) -> String {
        let Some(node) = self.template(template) else {
            return String::new();
        };
        let rendered = match node.params.last() {
            Some(param) => self.render_ids(&param.value),
            None => node.name.clone(),
        };
        rendered[rendered.trim_end().len()..].to_string()
    }
}

#[derive(Debug, Default)]
struct ParamStyle {
    name_leading: String,
    name_trailing: String,
    value_leading: String,
}

/// Canonical form used for template-name comparison: comments dropped,
/// `Template:` prefix dropped, underscores as spaces, whitespace collapsed,
/// first letter uppercased.
pub fn normalize_template_name(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("<!--") {
        stripped.push_str(&rest[..start]);
        match rest[start + 4..].find("-->") {
            Some(end) => rest = &rest[start + 4 + end + 3..],
            None => {
                rest = "";
                break;
            }
        }
    }
    stripped.push_str(rest);

    let spaced = stripped.replace('_', " ");
    let mut collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some((prefix, body)) = collapsed.split_once(':')
        && prefix.trim().eq_ignore_ascii_case("template")
    {
        collapsed = body.trim().to_string();
    }

    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_nodes(nodes: &[Node], ids: &[NodeId], out: &mut String) {
    for id in ids {
        match &nodes[id.0] {
            Node::Text(text) | Node::Comment(text) => out.push_str(text),
            Node::Tag(tag) => {
                out.push_str(&tag.open);
                if let Some(body) = &tag.body {
                    render_nodes(nodes, body, out);
                }
                out.push_str(&tag.close);
            }
            Node::Template(template) => {
                out.push_str("{{");
                out.push_str(&template.name);
                for param in &template.params {
                    out.push('|');
                    if let Some(name) = &param.name {
                        out.push_str(name);
                        out.push('=');
                    }
                    render_nodes(nodes, &param.value, out);
                }
                out.push_str("}}");
            }
        }
    }
}

fn surrounding_whitespace(value: &str) -> (&str, &str) {
    let trimmed_start = value.trim_start();
    let leading = &value[..value.len() - trimmed_start.len()];
    if trimmed_start.is_empty() {
        return (leading, "");
    }
    let trimmed = trimmed_start.trim_end();
    let trailing = &trimmed_start[trimmed.len()..];
    (leading, trailing)
}

#[derive(Debug, Clone, Copy)]
enum Stop<'a> {
    Eof,
    TagClose(&'a str),
    TemplateField,
}

#[derive(Debug, Clone, Copy)]
enum Opener {
    Template,
    Tag,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    nodes: Vec<Node>,
    /// Offsets of openers that already failed to close. Whether an opener
    /// closes does not depend on what encloses it, so each is tried once.
    unclosed: HashSet<usize>,
}

impl<'a> Parser<'a> {
    /// Parse until `stop`. Returns `None` if the input ends before a
    /// non-EOF stop is reached.
    fn parse_nodes(&mut self, stop: Stop<'a>) -> Option<Vec<NodeId>> {
        let src = self.src;
        let mut out = Vec::new();
        let mut text_start = self.pos;
        let mut link_depth = 0usize;

        loop {
            if self.pos >= self.src.len() {
                self.push_text(&mut out, text_start, self.pos);
                return match stop {
                    Stop::Eof => Some(out),
                    Stop::TagClose(_) | Stop::TemplateField => None,
                };
            }

            let rest = &src[self.pos..];
            if self.at_stop(rest, stop, link_depth) {
                self.push_text(&mut out, text_start, self.pos);
                return Some(out);
            }

            if rest.starts_with("<!--") {
                self.push_text(&mut out, text_start, self.pos);
                let end = rest[4..]
                    .find("-->")
                    .map(|offset| self.pos + 4 + offset + 3)
                    .unwrap_or(self.src.len());
                let id = self.alloc(Node::Comment(src[self.pos..end].to_string()));
                out.push(id);
                self.pos = end;
                text_start = end;
                continue;
            }

            if rest.starts_with("{{") {
                let start = self.pos;
                if let Some(id) = self.attempt(Opener::Template) {
                    self.push_text(&mut out, text_start, start);
                    out.push(id);
                    text_start = self.pos;
                } else {
                    self.pos = start + 2;
                }
                continue;
            }

            if rest.starts_with("[[") {
                link_depth += 1;
                self.pos += 2;
                continue;
            }
            if link_depth > 0 && rest.starts_with("]]") {
                link_depth -= 1;
                self.pos += 2;
                continue;
            }

            if rest.starts_with('<') {
                let start = self.pos;
                if let Some(id) = self.attempt(Opener::Tag) {
                    self.push_text(&mut out, text_start, start);
                    out.push(id);
                    text_start = self.pos;
                } else {
                    self.pos = start + 1;
                }
                continue;
            }

            self.pos += rest.chars().next().map(char::len_utf8).unwrap_or(1);
        }
    }

    fn at_stop(&self, rest: &str, stop: Stop<'a>, link_depth: usize) -> bool {
        match stop {
            Stop::Eof => false,
            Stop::TagClose(name) => closing_tag_len(rest, name).is_some(),
            Stop::TemplateField => {
                rest.starts_with("}}") || (link_depth == 0 && rest.starts_with('|'))
            }
        }
    }

    /// Parse the construct opening at the cursor. On failure the cursor and
    /// the arena are rolled back and the offset is remembered as unclosed.
    fn attempt(&mut self, opener: Opener) -> Option<NodeId> {
        let start = self.pos;
        if self.unclosed.contains(&start) {
            return None;
        }
        let mark = self.nodes.len();
        let parsed = match opener {
            Opener::Template => self.parse_template(),
            Opener::Tag => self.parse_tag(),
        };
        if parsed.is_none() {
            self.nodes.truncate(mark);
            self.pos = start;
            self.unclosed.insert(start);
        }
        parsed
    }

    fn parse_template(&mut self) -> Option<NodeId> {
        self.pos += 2;
        let name_nodes = self.parse_nodes(Stop::TemplateField)?;
        let name = self.render(&name_nodes);
        if name.trim().is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            if self.src[self.pos..].starts_with("}}") {
                self.pos += 2;
                break;
            }
            self.pos += 1;
            let value = self.parse_nodes(Stop::TemplateField)?;
            params.push(self.split_param(value));
        }

        Some(self.alloc(Node::Template(TemplateNode { name, params })))
    }

    fn split_param(&mut self, mut value: Vec<NodeId>) -> Param {
        let Some(first) = value.first().copied() else {
            return Param { name: None, value };
        };
        let Node::Text(text) = &self.nodes[first.0] else {
            return Param { name: None, value };
        };
        let Some((name, remainder)) = text.split_once('=') else {
            return Param { name: None, value };
        };
        let (name, remainder) = (name.to_string(), remainder.to_string());
        if remainder.is_empty() {
            value.remove(0);
        } else {
            self.nodes[first.0] = Node::Text(remainder);
        }
        Param {
            name: Some(name),
            value,
        }
    }

    fn parse_tag(&mut self) -> Option<NodeId> {
        let src = self.src;
        let rest = &src[self.pos..];
        let name = tag_name(rest)?;
        let is_ref = name.eq_ignore_ascii_case("ref");
        let opaque = OPAQUE_TAGS
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(name));
        if !is_ref && opaque.is_none() {
            return None;
        }

        let open_len = rest.find('>')? + 1;
        let open = &rest[..open_len];
        let start = self.pos;
        self.pos += open_len;

        if open[..open_len - 1].trim_end().ends_with('/') {
            return Some(self.alloc(Node::Tag(TagNode {
                name: name.to_string(),
                open: open.to_string(),
                body: None,
                close: String::new(),
            })));
        }

        if let Some(opaque) = opaque {
            let (body_len, close_len) = find_closing_tag(&src[self.pos..], opaque)?;
            let end = self.pos + body_len + close_len;
            let id = self.alloc(Node::Text(src[start..end].to_string()));
            self.pos = end;
            return Some(id);
        }

        let body = self.parse_nodes(Stop::TagClose("ref"))?;
        let close_len = closing_tag_len(&src[self.pos..], "ref")?;
        let close = src[self.pos..self.pos + close_len].to_string();
        self.pos += close_len;
        Some(self.alloc(Node::Tag(TagNode {
            name: name.to_string(),
            open: open.to_string(),
            body: Some(body),
            close,
        })))
    }

    fn push_text(&mut self, out: &mut Vec<NodeId>, start: usize, end: usize) {
        if start < end {
            let src = self.src;
            let id = self.alloc(Node::Text(src[start..end].to_string()));
            out.push(id);
        }
    }

    fn render(&self, ids: &[NodeId]) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, ids, &mut out);
        out
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }
}

/// Name of an opening tag at the start of `rest` (`<name` followed by
/// whitespace, `>` or `/`).
fn tag_name(rest: &str) -> Option<&str> {
    let after = rest.strip_prefix('<')?;
    let len = after
        .find(|ch: char| !ch.is_ascii_alphanumeric())
        .unwrap_or(after.len());
    if len == 0 {
        return None;
    }
    let next = after[len..].chars().next()?;
    if next.is_whitespace() || next == '>' || next == '/' {
        return Some(&after[..len]);
    }
    None
}

/// Byte length of `</name\s*>` at the start of `rest`.
fn closing_tag_len(rest: &str, name: &str) -> Option<usize> {
    let after = rest.strip_prefix("</")?;
    let candidate = after.get(..name.len())?;
    if !candidate.eq_ignore_ascii_case(name) {
        return None;
    }
    let tail = &after[name.len()..];
    let trimmed = tail.trim_start();
    if !trimmed.starts_with('>') {
        return None;
    }
    Some(2 + name.len() + (tail.len() - trimmed.len()) + 1)
}

/// Offset of the first `</name>` in `rest` and its length.
fn find_closing_tag(rest: &str, name: &str) -> Option<(usize, usize)> {
    let bytes = rest.as_bytes();
    let mut cursor = 0usize;
    while cursor + 1 < bytes.len() {
        if bytes[cursor] == b'<'
            && bytes[cursor + 1] == b'/'
            && let Some(len) = closing_tag_len(&rest[cursor..], name)
        {
            return Some((cursor, len));
        }
        cursor += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{Document, Node, normalize_template_name};

    fn names(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parse_and_render_round_trips_unmodified_text() {
        let samples = [
            "",
            "plain text only",
            "Intro.<ref name=\"a\">{{cite web |url=http://a.example |title=[[Alpha|A]] }}</ref> More.",
            "<ref>{{cite web|url=x}}{{dead link|date=May 2020}}</ref><ref name=b />",
            "{{unclosed template <ref>text</ref>",
            "<ref>never closed {{cite web|url=y}}",
            "<nowiki>{{cite web|url=z}}</nowiki> <!-- {{dead link}} --> {{{1}}}",
            "é {{Infobox|name=Ünïcode|{{nested|a=b}}}} ü",
            "{{cite web\n| url = http://b.example\n| title = B\n}}",
        ];
        for sample in samples {
            assert_eq!(Document::parse(sample).render(), sample, "sample: {sample}");
        }
    }

    #[test]
    fn repeated_unclosed_openers_are_each_tried_once() {
        let stray_templates = format!("<ref>{}{{{{cite web|url=x}}}}</ref>", "{{a ".repeat(200));
        let stray_refs = format!("{}<ref>{{{{cite web|url=y}}}}</ref>", "<ref>a ".repeat(200));

        for sample in [stray_templates, stray_refs] {
            let document = Document::parse(&sample);
            assert_eq!(document.render(), sample);
            assert!(document.nodes.len() < 50, "arena kept {} nodes", document.nodes.len());

            let refs = document.ref_tags();
            assert_eq!(refs.len(), 1);
            let body = document.tag(refs[0]).and_then(|tag| tag.body()).expect("body");
            let templates = document.templates_within(body);
            assert_eq!(templates.len(), 1);
            assert_eq!(document.template(templates[0]).expect("template").name(), "Cite web");
        }
    }

    #[test]
    fn ref_tags_skip_self_closing_and_include_nested() {
        let document = Document::parse(
            "<ref name=x/>A<ref>one</ref>{{efn|note<REF>two</REF>}}<ref name=\"y\" >three</ref >",
        );
        let refs = document.ref_tags();
        assert_eq!(refs.len(), 3);
        let bodies = refs
            .iter()
            .map(|id| {
                let body = document.tag(*id).and_then(|tag| tag.body()).expect("body");
                document.render_ids(body)
            })
            .collect::<Vec<_>>();
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[test]
    fn templates_within_are_recursive_and_ordered() {
        let document =
            Document::parse("<ref>{{cite web|title={{lang|fr|Titre}}|url=u}} {{dead link}}</ref>");
        let tag = document.ref_tags()[0];
        let body = document.tag(tag).and_then(|tag| tag.body()).expect("body");
        let found = document
            .templates_within(body)
            .into_iter()
            .map(|id| document.template(id).expect("template").name())
            .collect::<Vec<_>>();
        assert_eq!(found, vec!["Cite web", "Lang", "Dead link"]);
    }

    #[test]
    fn params_split_on_first_equals_and_ignore_link_pipes() {
        let document = Document::parse("{{cite web|url=http://x.example/?a=b|title=[[A|B]]|pos}}");
        let id = document.root()[0];
        let template = document.template(id).expect("template");
        let param_names = template
            .params()
            .iter()
            .map(|param| param.name())
            .collect::<Vec<_>>();
        assert_eq!(param_names, vec![Some("url"), Some("title"), None]);
        assert_eq!(
            document.param_value(id, "url").as_deref(),
            Some("http://x.example/?a=b")
        );
        assert_eq!(document.param_value(id, "title").as_deref(), Some("[[A|B]]"));
    }

    #[test]
    fn matches_follows_mediawiki_name_rules() {
        let document = Document::parse("{{ cite_web <!-- c --> |url=x}}");
        let template = document.template(document.root()[0]).expect("template");
        assert!(template.matches(&names(&["Cite web"])));
        assert!(template.matches(&names(&["Template:cite  web"])));
        assert!(!template.matches(&names(&["Cite news"])));
        assert_eq!(normalize_template_name("dead_link"), "Dead link");
        assert_eq!(normalize_template_name("  "), "");
    }

    #[test]
    fn set_param_updates_in_place_preserving_whitespace() {
        let mut document = Document::parse("{{cite web | url = x | deadurl = no }}");
        let id = document.root()[0];
        assert!(document.set_param(id, "deadurl", "yes"));
        assert_eq!(document.render(), "{{cite web | url = x | deadurl = yes }}");
    }

    #[test]
    fn set_param_appends_in_inline_style() {
        let mut document = Document::parse("{{cite web |url=x |title=y }}");
        let id = document.root()[0];
        document.set_param(id, "archiveurl", "http://a");
        assert_eq!(
            document.render(),
            "{{cite web |url=x |title=y |archiveurl=http://a }}"
        );
    }

    #[test]
    fn set_param_appends_in_multiline_style() {
        let mut document = Document::parse("{{cite web\n| url = x\n| title = y\n}}");
        let id = document.root()[0];
        document.set_param(id, "archivedate", "01 January 2015");
        assert_eq!(
            document.render(),
            "{{cite web\n| url = x\n| title = y\n| archivedate = 01 January 2015\n}}"
        );
    }

    #[test]
    fn set_param_on_template_without_params() {
        let mut document = Document::parse("{{cite web}}");
        let id = document.root()[0];
        document.set_param(id, "url", "x");
        assert_eq!(document.render(), "{{cite web|url=x}}");
    }

    #[test]
    fn remove_detaches_nested_template() {
        let mut document = Document::parse("<ref>{{cite web|url=x}}{{dead link|date=2020}}</ref>");
        let tag = document.ref_tags()[0];
        let body = document
            .tag(tag)
            .and_then(|tag| tag.body())
            .expect("body")
            .to_vec();
        let marker = document.templates_within(&body)[1];
        assert!(document.remove(marker));
        assert!(!document.remove(marker));
        assert_eq!(document.render(), "<ref>{{cite web|url=x}}</ref>");
    }

    #[test]
    fn comments_are_nodes_and_not_parsed() {
        let document = Document::parse("a<!-- {{cite web|url=x}} -->b");
        assert!(matches!(document.node(document.root()[1]), Node::Comment(_)));
        assert!(document.templates_within(document.root()).is_empty());
    }
}
