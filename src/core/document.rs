//! Dynamically typed YAML document tree and its traversal.
//!
//! Manifests and replacement files are parsed into [`Node`], an ordered sum
//! type. [`traverse`] rebuilds a tree through a per-scalar transformation and
//! reports whether anything changed. The input tree is never mutated.

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_yml::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Map(IndexMap<String, Node>),
    Seq(Vec<Node>),
}

impl Node {
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::String(_) => "string",
            Node::Bool(_) => "bool",
            Node::Int(_) => "int",
            Node::Float(_) => "float",
            Node::Map(_) => "map",
            Node::Seq(_) => "sequence",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Node>> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Node]> {
        match self {
            Node::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Converts a parsed YAML value. Tagged values and non-scalar map keys
    /// have no representation and are rejected.
    ///
    /// The conversion is lossy in two places, visible once a document is
    /// written back: scalar map keys become strings (`1:` is written as
    /// `'1':`), and integers outside the `i64` range become [`Node::Float`].
    /// Manifests and vars files key their maps by name, so neither matters
    /// for them.
    pub fn from_yaml(value: Value) -> Result<Node> {
        match value {
            Value::Null => Ok(Node::Null),
            Value::Bool(b) => Ok(Node::Bool(b)),
            Value::String(s) => Ok(Node::String(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Node::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Node::Float(f))
                } else {
                    Err(Error::manifest_unsupported_type(n.to_string(), "number"))
                }
            }
            Value::Sequence(items) => items
                .into_iter()
                .map(Node::from_yaml)
                .collect::<Result<Vec<_>>>()
                .map(Node::Seq),
            Value::Mapping(mapping) => {
                let mut map = IndexMap::with_capacity(mapping.len());
                for (key, value) in mapping {
                    map.insert(key_to_string(key)?, Node::from_yaml(value)?);
                }
                Ok(Node::Map(map))
            }
            Value::Tagged(tagged) => Err(Error::manifest_unsupported_type(
                format!("{:?}", tagged),
                "tagged",
            )),
        }
    }

    /// JSON view, used in error details and the command envelope.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn key_to_string(key: Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok("null".to_string()),
        other => Err(Error::manifest_unsupported_type(
            format!("{:?}", other),
            "map key",
        )),
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::String(s) => serializer.serialize_str(s),
            Node::Bool(b) => serializer.serialize_bool(*b),
            Node::Int(i) => serializer.serialize_i64(*i),
            Node::Float(f) => serializer.serialize_f64(*f),
            Node::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Node::Seq(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(item)?;
                }
                out.end()
            }
        }
    }
}

/// Parses a single YAML document. An empty input is `Node::Null`.
pub fn parse(content: &str, origin: &str) -> Result<Node> {
    let value: Value =
        serde_yml::from_str(content).map_err(|e| Error::config_invalid_yaml(origin, e))?;
    Node::from_yaml(value)
}

/// Parses every document of a multi-document YAML stream.
pub fn parse_all(content: &str, origin: &str) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    for document in serde_yml::Deserializer::from_str(content) {
        let value = Value::deserialize(document).map_err(|e| Error::config_invalid_yaml(origin, e))?;
        nodes.push(Node::from_yaml(value)?);
    }
    Ok(nodes)
}

pub fn to_yaml(node: &Node) -> Result<String> {
    serde_yml::to_string(node)
        .map_err(|e| Error::internal_unexpected(format!("Cannot serialize yaml: {}", e)))
}

/// Rebuilds `node`, passing every scalar (including null) to `transform`.
///
/// `transform` returns `Some(replacement)` to change a scalar, `None` to keep
/// it. The returned flag is true when any scalar below `node` was replaced.
pub fn traverse<F>(node: &Node, transform: &mut F) -> Result<(Node, bool)>
where
    F: FnMut(&Node) -> Result<Option<Node>>,
{
    match node {
        Node::Map(map) => {
            let mut changed = false;
            let mut out = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                let (value, child_changed) = traverse(value, transform)?;
                changed |= child_changed;
                out.insert(key.clone(), value);
            }
            Ok((Node::Map(out), changed))
        }
        Node::Seq(items) => {
            let mut changed = false;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let (item, child_changed) = traverse(item, transform)?;
                changed |= child_changed;
                out.push(item);
            }
            Ok((Node::Seq(out), changed))
        }
        scalar => match transform(scalar)? {
            Some(replacement) => Ok((replacement, true)),
            None => Ok((scalar.clone(), false)),
        },
    }
}
