//! Decode rules shared by the manifest parsers.
//!
//! Each rule matches on the shape of the raw node first and picks exactly one
//! conversion per shape; any other shape is a [`DecodeError::Shape`].

use super::node::{Node, NodeKind};
use crate::error::DecodeError;
use crate::models::{EnvVar, Lines};

pub type Decoded<T> = Result<T, DecodeError>;

/// `x`, `[x, y]` or nothing, as a list of strings.
pub fn string_list(field: &str, node: Option<&Node>) -> Decoded<Vec<String>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    match &node.kind {
        NodeKind::Null => Ok(Vec::new()),
        NodeKind::Bool(_) | NodeKind::Number(_) | NodeKind::Str(_) => {
            Ok(node.as_scalar_string().into_iter().collect())
        }
        NodeKind::Sequence(items) => items
            .iter()
            .map(|item| {
                item.as_scalar_string()
                    .ok_or_else(|| DecodeError::shape(field, "a list of scalars", item))
            })
            .collect(),
        _ => Err(DecodeError::shape(field, "a scalar or a list of scalars", node)),
    }
}

/// A scalar rendered as text; absent or null is empty.
pub fn scalar(field: &str, node: Option<&Node>) -> Decoded<String> {
    let Some(node) = node else {
        return Ok(String::new());
    };
    match &node.kind {
        NodeKind::Null => Ok(String::new()),
        NodeKind::Bool(_) | NodeKind::Number(_) | NodeKind::Str(_) => {
            Ok(node.as_scalar_string().unwrap_or_default())
        }
        _ => Err(DecodeError::shape(field, "a scalar", node)),
    }
}

/// A "when to run" expression. Booleans and numbers are kept as written.
pub fn condition(field: &str, node: Option<&Node>) -> Decoded<String> {
    scalar(field, node)
}

pub fn bool_flag(field: &str, node: Option<&Node>) -> Decoded<bool> {
    let Some(node) = node else {
        return Ok(false);
    };
    match &node.kind {
        NodeKind::Null => Ok(false),
        NodeKind::Bool(b) => Ok(*b),
        NodeKind::Str(s) => Ok(s.eq_ignore_ascii_case("true")),
        _ => Err(DecodeError::shape(field, "a boolean", node)),
    }
}

/// `KEY: value` mapping. Non-scalar values are stored in flow form.
pub fn env_vars(field: &str, node: Option<&Node>) -> Decoded<Vec<EnvVar>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    match &node.kind {
        NodeKind::Null => Ok(Vec::new()),
        NodeKind::Mapping(_) => Ok(node
            .entries()
            .map(|(name, key, value)| EnvVar {
                name,
                value: value.render(),
                lines: Lines::new(key.line),
            })
            .collect()),
        _ => Err(DecodeError::shape(field, "a mapping", node)),
    }
}

/// Mapping that must be present as a mapping when given at all.
pub fn mapping<'a>(field: &str, node: Option<&'a Node>) -> Decoded<Option<&'a Node>> {
    match node {
        None => Ok(None),
        Some(n) if n.is_null() => Ok(None),
        Some(n) if n.as_mapping().is_some() => Ok(Some(n)),
        Some(n) => Err(DecodeError::shape(field, "a mapping", n)),
    }
}

/// Sequence that must be a sequence when given at all.
pub fn sequence<'a>(field: &str, node: Option<&'a Node>) -> Decoded<&'a [Node]> {
    match node {
        None => Ok(&[]),
        Some(n) if n.is_null() => Ok(&[]),
        Some(n) => n
            .as_sequence()
            .ok_or_else(|| DecodeError::shape(field, "a sequence", n)),
    }
}
