//! Line-annotated YAML tree.
//!
//! `serde_yaml` drops source positions, so manifests are loaded through the
//! `yaml-rust2` event stream instead and every node keeps the 1-based line it
//! started on. Anchors and aliases are resolved, `<<` merge keys are applied,
//! and local tags such as GitLab's `!reference` are kept as [`NodeKind::Tagged`].

use crate::error::DecodeError;
use std::collections::HashMap;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// Nodes copied through aliases may not exceed this base plus a multiple of
/// the nodes written in the source.
const ALIAS_EXPANSION_BASE: usize = 1_000;
const ALIAS_EXPANSION_FACTOR: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub line: usize,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Null,
    Bool(bool),
    /// Numbers keep their source text so `1.10` stays `1.10`.
    Number(String),
    Str(String),
    Sequence(Vec<Node>),
    Mapping(Vec<(Node, Node)>),
    Tagged(String, Box<Node>),
}

impl Node {
    pub fn new(line: usize, kind: NodeKind) -> Self {
        Self { line, kind }
    }

    pub fn null(line: usize) -> Self {
        Self::new(line, NodeKind::Null)
    }

    /// Human name of the node's shape, used in decode errors.
    pub fn shape(&self) -> &'static str {
        match &self.kind {
            NodeKind::Null => "null",
            NodeKind::Bool(_) => "boolean",
            NodeKind::Number(_) => "number",
            NodeKind::Str(_) => "string",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Mapping(_) => "mapping",
            NodeKind::Tagged(..) => "tagged value",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::Null)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Bool(_) | NodeKind::Number(_) | NodeKind::Str(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Any scalar rendered as text. `Null` and collections yield `None`.
    pub fn as_scalar_string(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Str(s) => Some(s.clone()),
            NodeKind::Number(n) => Some(n.clone()),
            NodeKind::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.kind {
            NodeKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[(Node, Node)]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a string key in a mapping, returning the key node and the value.
    pub fn entry(&self, key: &str) -> Option<(&Node, &Node)> {
        self.as_mapping()?
            .iter()
            .find(|(k, _)| k.as_scalar_string().as_deref() == Some(key))
            .map(|(k, v)| (k, v))
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entry(key).map(|(_, v)| v)
    }

    /// Line of the key `key` in this mapping.
    pub fn key_line(&self, key: &str) -> Option<usize> {
        self.entry(key).map(|(k, _)| k.line)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Node::as_str)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Node::as_scalar_string)
    }

    /// Mapping entries with scalar keys, in document order.
    pub fn entries(&self) -> impl Iterator<Item = (String, &Node, &Node)> {
        self.as_mapping()
            .unwrap_or(&[])
            .iter()
            .filter_map(|(k, v)| k.as_scalar_string().map(|key| (key, k, v)))
    }

    /// Render a node as compact YAML-ish text, for values that are stored as strings.
    pub fn render(&self) -> String {
        match &self.kind {
            NodeKind::Null => String::new(),
            NodeKind::Tagged(tag, inner) => format!("!{} {}", tag, inner.render_flow()),
            _ if self.is_scalar() => self.as_scalar_string().unwrap_or_default(),
            _ => self.render_flow(),
        }
    }

    /// Number of nodes in this subtree, keys included.
    fn size(&self) -> usize {
        1 + match &self.kind {
            NodeKind::Sequence(items) => items.iter().map(Node::size).sum(),
            NodeKind::Mapping(entries) => entries.iter().map(|(k, v)| k.size() + v.size()).sum(),
            NodeKind::Tagged(_, inner) => inner.size(),
            _ => 0,
        }
    }

    fn render_flow(&self) -> String {
        match &self.kind {
            NodeKind::Sequence(items) => format!(
                "[{}]",
                items.iter().map(Node::render_flow).collect::<Vec<_>>().join(", ")
            ),
            NodeKind::Mapping(entries) => format!(
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.render_flow(), v.render_flow()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            NodeKind::Null => "null".to_string(),
            _ => self.render(),
        }
    }
}

/// Parse every document in `source`.
pub fn load_all(source: &str) -> Result<Vec<Node>, DecodeError> {
    let mut builder = TreeBuilder::default();
    let mut parser = Parser::new_from_str(source);
    parser
        .load(&mut builder, true)
        .map_err(|e| DecodeError::Syntax {
            line: e.marker().line(),
            message: e.to_string(),
        })?;
    match builder.error {
        Some(e) => Err(e),
        None => Ok(builder.docs),
    }
}

/// Parse the first document in `source`. An empty file yields a `Null` node.
pub fn load(source: &str) -> Result<Node, DecodeError> {
    Ok(load_all(source)?
        .into_iter()
        .next()
        .unwrap_or_else(|| Node::null(1)))
}

enum Frame {
    Sequence {
        line: usize,
        anchor: usize,
        tag: Option<String>,
        items: Vec<Node>,
    },
    Mapping {
        line: usize,
        anchor: usize,
        tag: Option<String>,
        entries: Vec<(Node, Node)>,
        pending_key: Option<Node>,
    },
}

#[derive(Default)]
struct TreeBuilder {
    docs: Vec<Node>,
    stack: Vec<Frame>,
    /// Anchored nodes with their node counts.
    anchors: HashMap<usize, (Node, usize)>,
    written: usize,
    expanded: usize,
    error: Option<DecodeError>,
}

impl TreeBuilder {
    fn finish(&mut self, node: Node, anchor: usize) {
        if anchor > 0 {
            let size = node.size();
            self.anchors.insert(anchor, (node.clone(), size));
        }
        self.push(node);
    }

    fn alias(&mut self, id: usize, line: usize) {
        let Some((node, size)) = self.anchors.get(&id) else {
            self.push(Node::null(line));
            return;
        };
        self.expanded += size;
        let limit = ALIAS_EXPANSION_BASE + ALIAS_EXPANSION_FACTOR * self.written;
        if self.expanded > limit {
            self.error = Some(DecodeError::AliasExpansion { line, limit });
            return;
        }
        let node = node.clone();
        self.push(node);
    }

    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            None => self.docs.push(node),
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping {
                entries,
                pending_key,
                ..
            }) => match pending_key.take() {
                None => *pending_key = Some(node),
                Some(key) => entries.push((key, node)),
            },
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        let line = mark.line();
        if matches!(
            ev,
            Event::Alias(_) | Event::Scalar(..) | Event::SequenceStart(..) | Event::MappingStart(..)
        ) {
            self.written += 1;
        }
        match ev {
            Event::Alias(id) => self.alias(id, line),
            Event::Scalar(value, style, anchor, tag) => {
                let node = scalar_node(line, value, style, tag.as_ref());
                self.finish(node, anchor);
            }
            Event::SequenceStart(anchor, tag) => self.stack.push(Frame::Sequence {
                line,
                anchor,
                tag: local_tag(tag.as_ref()),
                items: Vec::new(),
            }),
            Event::MappingStart(anchor, tag) => self.stack.push(Frame::Mapping {
                line,
                anchor,
                tag: local_tag(tag.as_ref()),
                entries: Vec::new(),
                pending_key: None,
            }),
            Event::SequenceEnd => {
                if let Some(Frame::Sequence {
                    line,
                    anchor,
                    tag,
                    items,
                }) = self.stack.pop()
                {
                    let node = wrap_tag(Node::new(line, NodeKind::Sequence(items)), tag);
                    self.finish(node, anchor);
                }
            }
            Event::MappingEnd => {
                if let Some(Frame::Mapping {
                    line,
                    anchor,
                    tag,
                    entries,
                    ..
                }) = self.stack.pop()
                {
                    let node = wrap_tag(Node::new(line, NodeKind::Mapping(merge_keys(entries))), tag);
                    self.finish(node, anchor);
                }
            }
            _ => {}
        }
    }
}

fn local_tag(tag: Option<&Tag>) -> Option<String> {
    let tag = tag?;
    if tag.handle == "!" {
        Some(tag.suffix.clone())
    } else {
        None
    }
}

fn wrap_tag(node: Node, tag: Option<String>) -> Node {
    match tag {
        Some(tag) => Node::new(node.line, NodeKind::Tagged(tag, Box::new(node))),
        None => node,
    }
}

fn scalar_node(line: usize, value: String, style: TScalarStyle, tag: Option<&Tag>) -> Node {
    if let Some(tag) = tag {
        if tag.handle == "!" {
            let inner = Node::new(line, NodeKind::Str(value));
            return Node::new(line, NodeKind::Tagged(tag.suffix.clone(), Box::new(inner)));
        }
        let is_core = tag.handle == "!!" || tag.handle == CORE_TAG_PREFIX;
        if is_core && tag.suffix == "str" {
            return Node::new(line, NodeKind::Str(value));
        }
    }

    if style != TScalarStyle::Plain {
        return Node::new(line, NodeKind::Str(value));
    }
    Node::new(line, resolve_plain(value))
}

fn resolve_plain(value: String) -> NodeKind {
    match value.as_str() {
        "" | "~" | "null" | "Null" | "NULL" => NodeKind::Null,
        "true" | "True" | "TRUE" => NodeKind::Bool(true),
        "false" | "False" | "FALSE" => NodeKind::Bool(false),
        _ if looks_numeric(&value) => NodeKind::Number(value),
        _ => NodeKind::Str(value),
    }
}

fn looks_numeric(value: &str) -> bool {
    let unsigned = value.strip_prefix(['-', '+']).unwrap_or(value);
    if let Some(hex) = unsigned.strip_prefix("0x") {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    if let Some(oct) = unsigned.strip_prefix("0o") {
        return !oct.is_empty() && oct.chars().all(|c| ('0'..='7').contains(&c));
    }
    if matches!(unsigned, ".inf" | ".Inf" | ".INF" | ".nan" | ".NaN" | ".NAN") {
        return true;
    }
    !unsigned.is_empty()
        && unsigned.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '.')
        && unsigned.parse::<f64>().is_ok()
}

/// Apply `<<` merge keys. Explicit keys win over merged ones.
fn merge_keys(entries: Vec<(Node, Node)>) -> Vec<(Node, Node)> {
    if !entries.iter().any(|(k, _)| k.as_str() == Some("<<")) {
        return entries;
    }

    let (merges, mut explicit): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|(k, _)| k.as_str() == Some("<<"));

    for (_, source) in merges {
        let sources: Vec<Node> = match source.kind {
            NodeKind::Mapping(_) => vec![source],
            NodeKind::Sequence(items) => items,
            _ => continue,
        };
        for source in sources {
            let NodeKind::Mapping(merged) = source.kind else {
                continue;
            };
            for (key, value) in merged {
                let exists = explicit
                    .iter()
                    .any(|(k, _)| k.as_scalar_string() == key.as_scalar_string());
                if !exists {
                    explicit.push((key, value));
                }
            }
        }
    }
    explicit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_lines_for_keys_and_values() {
        let doc = load("name: CI\njobs:\n  build:\n    runs-on: ubuntu-latest\n").unwrap();
        assert_eq!(doc.key_line("name"), Some(1));
        let build = doc.get("jobs").unwrap().get("build").unwrap();
        assert_eq!(build.key_line("runs-on"), Some(4));
        assert_eq!(build.get_str("runs-on"), Some("ubuntu-latest"));
    }

    #[test]
    fn test_resolves_plain_scalars() {
        let doc = load("a: true\nb: 1.10\nc: ~\nd: 'true'\ne: on\n").unwrap();
        assert_eq!(doc.get("a").unwrap().as_bool(), Some(true));
        assert_eq!(doc.get_string("b").as_deref(), Some("1.10"));
        assert!(doc.get("c").unwrap().is_null());
        assert_eq!(doc.get_str("d"), Some("true"));
        assert_eq!(doc.get_str("e"), Some("on"));
    }

    #[test]
    fn test_applies_merge_keys_and_aliases() {
        let doc = load(
            ".base: &base\n  image: node:20\n  stage: test\njob:\n  <<: *base\n  stage: build\n",
        )
        .unwrap();
        let job = doc.get("job").unwrap();
        assert_eq!(job.get_str("image"), Some("node:20"));
        assert_eq!(job.get_str("stage"), Some("build"));
        assert!(job.get("<<").is_none());
    }

    #[test]
    fn test_keeps_local_tags() {
        let doc = load("script:\n  - !reference [.setup, script]\n  - echo hi\n").unwrap();
        let script = doc.get("script").unwrap().as_sequence().unwrap();
        match &script[0].kind {
            NodeKind::Tagged(tag, inner) => {
                assert_eq!(tag, "reference");
                assert_eq!(inner.as_sequence().unwrap().len(), 2);
            }
            other => panic!("expected tagged node, got {other:?}"),
        }
        assert_eq!(script[0].render(), "!reference [.setup, script]");
    }

    #[test]
    fn test_loads_multiple_documents() {
        let docs = load_all("spec:\n  inputs: {}\n---\njob:\n  script: [echo]\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].key_line("job"), Some(4));
    }

    #[test]
    fn test_rejects_exponential_alias_expansion() {
        let mut yaml = String::from("a0: &a0 [x, x, x, x, x, x, x, x, x]\n");
        for i in 1..8 {
            let refs = vec![format!("*a{}", i - 1); 9].join(", ");
            yaml.push_str(&format!("a{i}: &a{i} [{refs}]\n"));
        }
        yaml.push_str("on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n");

        let err = load(&yaml).unwrap_err();
        assert!(matches!(err, DecodeError::AliasExpansion { .. }), "got {err:?}");
    }

    #[test]
    fn test_allows_ordinary_alias_reuse() {
        let yaml = ".env: &env {A: 1, B: 2}\njobs:\n  a: {env: *env}\n  b: {env: *env}\n  c: {env: *env}\n";
        let doc = load(yaml).unwrap();
        let c = doc.get("jobs").unwrap().get("c").unwrap();
        assert_eq!(c.get("env").unwrap().get_string("B").as_deref(), Some("2"));
    }

    #[test]
    fn test_reports_syntax_errors_with_line() {
        let err = load("a: [1, 2\nb: c\n").unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { .. }));
    }
}
