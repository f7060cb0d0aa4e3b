//! Nested settings document.

use std::collections::BTreeMap;

use fc_core::Value;
use serde::{Deserialize, Serialize};

use crate::{SettingsError, SettingsResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingsNode {
    Leaf(Value),
    Group(SettingsTree),
}

impl SettingsNode {
    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Self::Leaf(v) => Some(v),
            Self::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&SettingsTree> {
        match self {
            Self::Group(g) => Some(g),
            Self::Leaf(_) => None,
        }
    }
}

/// One level of a settings document. Keys are kept sorted so that every walk
/// over the tree is deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SettingsTree {
    entries: BTreeMap<String, SettingsNode>,
}

impl SettingsTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingsNode)> {
        self.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<&SettingsNode> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, node: SettingsNode) -> Option<SettingsNode> {
        self.entries.insert(key.into(), node)
    }

    /// Follow `segments` down the tree.
    pub fn get_path<S: AsRef<str>>(&self, segments: &[S]) -> Option<&SettingsNode> {
        let (last, parents) = segments.split_last()?;
        let mut level = self;
        for segment in parents {
            level = level.entries.get(segment.as_ref())?.as_group()?;
        }
        level.entries.get(last.as_ref())
    }

    pub fn leaf<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Value> {
        self.get_path(segments)?.as_leaf()
    }

    pub fn leaf_mut<S: AsRef<str>>(&mut self, segments: &[S]) -> Option<&mut Value> {
        let (last, parents) = segments.split_last()?;
        let mut level = self;
        for segment in parents {
            level = match level.entries.get_mut(segment.as_ref())? {
                SettingsNode::Group(g) => g,
                SettingsNode::Leaf(_) => return None,
            };
        }
        match level.entries.get_mut(last.as_ref())? {
            SettingsNode::Leaf(v) => Some(v),
            SettingsNode::Group(_) => None,
        }
    }

    /// Write a leaf, creating intermediate groups as needed.
    ///
    /// Fails when a segment on the way is already a leaf, or when the target
    /// is an existing group.
    pub fn set_leaf<S: AsRef<str>>(&mut self, segments: &[S], value: Value) -> SettingsResult<()> {
        let joined = || {
            segments
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join("/")
        };
        let Some((last, parents)) = segments.split_last() else {
            return Err(SettingsError::PathConflict {
                path: String::new(),
                reason: "empty path",
            });
        };

        let mut level = self;
        for segment in parents {
            let node = level
                .entries
                .entry(segment.as_ref().to_string())
                .or_insert_with(|| SettingsNode::Group(SettingsTree::new()));
            level = match node {
                SettingsNode::Group(g) => g,
                SettingsNode::Leaf(_) => {
                    return Err(SettingsError::PathConflict {
                        path: joined(),
                        reason: "a parent segment is a leaf",
                    });
                }
            };
        }

        if let Some(SettingsNode::Group(_)) = level.entries.get(last.as_ref()) {
            return Err(SettingsError::PathConflict {
                path: joined(),
                reason: "target is a group",
            });
        }
        level
            .entries
            .insert(last.as_ref().to_string(), SettingsNode::Leaf(value));
        Ok(())
    }

    /// Build a tree from a parsed JSON/YAML document. The root must be a map.
    pub fn from_json(document: &serde_json::Value) -> SettingsResult<Self> {
        match document {
            serde_json::Value::Object(map) => {
                let mut tree = SettingsTree::new();
                for (key, child) in map {
                    let node = match child {
                        serde_json::Value::Object(_) => {
                            SettingsNode::Group(SettingsTree::from_json(child)?)
                        }
                        other => SettingsNode::Leaf(json_to_value(key, other)?),
                    };
                    tree.entries.insert(key.clone(), node);
                }
                Ok(tree)
            }
            serde_json::Value::Null => Ok(SettingsTree::new()),
            _ => Err(SettingsError::Unsupported {
                path: "<root>".to_string(),
                reason: "settings document must be a mapping".to_string(),
            }),
        }
    }

    pub fn to_json(&self) -> SettingsResult<serde_json::Value> {
        let mut map = serde_json::Map::new();
        for (key, node) in &self.entries {
            let child = match node {
                SettingsNode::Group(g) => g.to_json()?,
                SettingsNode::Leaf(v) => value_to_json(key, v)?,
            };
            map.insert(key.clone(), child);
        }
        Ok(serde_json::Value::Object(map))
    }
}

fn json_to_value(path: &str, json: &serde_json::Value) -> SettingsResult<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(items) => Value::List(
            items
                .iter()
                .map(|item| json_to_value(path, item))
                .collect::<SettingsResult<Vec<_>>>()?,
        ),
        serde_json::Value::Object(_) => {
            return Err(SettingsError::Unsupported {
                path: path.to_string(),
                reason: "mappings inside lists are not supported".to_string(),
            });
        }
    })
}

fn value_to_json(path: &str, value: &Value) -> SettingsResult<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| SettingsError::Unsupported {
                path: path.to_string(),
                reason: format!("non-finite float {}", f),
            })?,
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(
            items
                .iter()
                .map(|item| value_to_json(path, item))
                .collect::<SettingsResult<Vec<_>>>()?,
        ),
    })
}
