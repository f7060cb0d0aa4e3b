//! Moving values between flat rows and a settings tree.
//!
//! Bulk operations never fail on a missing path. Each miss is collected as a
//! [`LookupError`] and returned next to whatever did resolve.

use fc_core::Value;
use thiserror::Error;

use crate::{FlatSettings, SettingsCodec, SettingsTree};

/// A flat key that does not address any leaf of the tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Settings path not found: {path}")]
pub struct LookupError {
    pub path: String,
}

/// Result of reading a set of flat keys out of a tree.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub values: FlatSettings,
    pub missing: Vec<LookupError>,
}

/// Result of writing a flat row into a copy of a tree.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub settings: SettingsTree,
    pub missing: Vec<LookupError>,
}

impl Transfer {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

fn resolve<'t>(codec: &SettingsCodec, tree: &'t SettingsTree, key: &str) -> Option<&'t Value> {
    if let Some(value) = tree.leaf(&codec.split(key)) {
        return Some(value);
    }
    let (base, index) = codec.parse_member(key)?;
    tree.leaf(&codec.split(base))?.as_list()?.get(index)
}

fn resolve_mut<'t>(
    codec: &SettingsCodec,
    tree: &'t mut SettingsTree,
    key: &str,
) -> Option<&'t mut Value> {
    let segments = codec.split(key);
    if tree.leaf(&segments).is_some() {
        return tree.leaf_mut(&segments);
    }
    let (base, index) = codec.parse_member(key)?;
    match tree.leaf_mut(&codec.split(base))? {
        Value::List(items) => items.get_mut(index),
        _ => None,
    }
}

/// Read `paths` from `tree`.
pub fn extract<S: AsRef<str>>(
    tree: &SettingsTree,
    codec: &SettingsCodec,
    paths: &[S],
) -> Extraction {
    let mut extraction = Extraction::default();
    for path in paths {
        let path = path.as_ref();
        match resolve(codec, tree, path) {
            Some(value) => {
                extraction.values.insert(path.to_string(), value.clone());
            }
            None => extraction.missing.push(LookupError {
                path: path.to_string(),
            }),
        }
    }
    extraction
}

/// Write every row value into a copy of `base`.
///
/// Only existing leaves (or elements of existing list leaves) are written;
/// the base document defines the settings schema.
pub fn merge_flat(base: &SettingsTree, codec: &SettingsCodec, row: &FlatSettings) -> Transfer {
    let mut settings = base.clone();
    let mut missing = Vec::new();
    for (key, value) in row {
        match resolve_mut(codec, &mut settings, key) {
            Some(slot) => *slot = value.clone(),
            None => missing.push(LookupError { path: key.clone() }),
        }
    }
    Transfer { settings, missing }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Only keys already present in the old settings are overwritten.
    #[default]
    Update,
    /// Overwrite existing keys and add new ones.
    Extend,
}

pub fn update_settings(new: &FlatSettings, old: &FlatSettings, mode: UpdateMode) -> FlatSettings {
    let mut updated = old.clone();
    for (key, value) in new {
        if mode == UpdateMode::Extend || updated.contains_key(key) {
            updated.insert(key.clone(), value.clone());
        }
    }
    updated
}
