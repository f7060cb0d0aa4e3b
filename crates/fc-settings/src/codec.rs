//! Flat key space <-> nested settings tree.
//!
//! Keys are the tree path joined with a separator (`-` by default). List
//! leaves can be represented three ways, see [`MultiValueEncoding`].

use std::collections::BTreeMap;

use fc_core::Value;

use crate::{SettingsError, SettingsResult, SettingsNode, SettingsTree};

/// Flat view of a settings tree (or one configuration row).
pub type FlatSettings = BTreeMap<String, Value>;

/// How list-valued leaves appear in the flat key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiValueEncoding {
    /// One key holding the whole list.
    #[default]
    Inline,
    /// One key per element with an explicit index marker: `x[0]`, `x[1]`.
    IndexMarkers,
    /// One key per element with a numeric suffix segment: `x-0`, `x-1`.
    ///
    /// Compatible with older settings forms, but ambiguous: any key whose
    /// last segment is all digits is read as a group member.
    DashSuffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsCodec {
    pub separator: char,
    pub multi_value: MultiValueEncoding,
}

impl Default for SettingsCodec {
    fn default() -> Self {
        Self {
            separator: '-',
            multi_value: MultiValueEncoding::Inline,
        }
    }
}

impl SettingsCodec {
    pub fn with_encoding(multi_value: MultiValueEncoding) -> Self {
        Self {
            multi_value,
            ..Self::default()
        }
    }

    /// Codec matching the legacy `name-0`, `name-1` input ids.
    pub fn legacy() -> Self {
        Self::with_encoding(MultiValueEncoding::DashSuffix)
    }

    /// Same separator with list leaves kept under one key.
    ///
    /// Configuration rows address parameters by their leaf path, so a list
    /// parameter stays one column whatever encoding the flat input ids use.
    pub fn whole_lists(&self) -> Self {
        Self {
            multi_value: MultiValueEncoding::Inline,
            ..*self
        }
    }

    pub fn join<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let sep = self.separator.to_string();
        segments
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(&sep)
    }

    pub fn split<'a>(&self, key: &'a str) -> Vec<&'a str> {
        key.split(self.separator).collect()
    }

    /// Key of element `index` of the list leaf at `key`.
    pub fn member_key(&self, key: &str, index: usize) -> String {
        match self.multi_value {
            MultiValueEncoding::Inline | MultiValueEncoding::IndexMarkers => {
                format!("{}[{}]", key, index)
            }
            MultiValueEncoding::DashSuffix => format!("{}{}{}", key, self.separator, index),
        }
    }

    /// Split a group member key into its list key and element index.
    ///
    /// Index markers are recognised under every encoding; dash suffixes only
    /// under [`MultiValueEncoding::DashSuffix`].
    pub fn parse_member<'a>(&self, key: &'a str) -> Option<(&'a str, usize)> {
        if let Some(stripped) = key.strip_suffix(']') {
            let (base, index) = stripped.rsplit_once('[')?;
            if base.is_empty() {
                return None;
            }
            return index.parse().ok().map(|i| (base, i));
        }
        if self.multi_value == MultiValueEncoding::DashSuffix {
            let (base, index) = key.rsplit_once(self.separator)?;
            if base.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            return index.parse().ok().map(|i| (base, i));
        }
        None
    }

    /// One entry per leaf; list leaves are split per the encoding.
    pub fn flatten(&self, tree: &SettingsTree) -> FlatSettings {
        let mut flat = FlatSettings::new();
        let mut prefix = Vec::new();
        self.flatten_into(tree, &mut prefix, &mut flat);
        flat
    }

    fn flatten_into<'a>(
        &self,
        tree: &'a SettingsTree,
        prefix: &mut Vec<&'a str>,
        flat: &mut FlatSettings,
    ) {
        for (key, node) in tree.iter() {
            prefix.push(key);
            match node {
                SettingsNode::Group(group) => self.flatten_into(group, prefix, flat),
                SettingsNode::Leaf(value) => {
                    let joined = self.join(prefix.as_slice());
                    match value {
                        Value::List(items)
                            if self.multi_value != MultiValueEncoding::Inline
                                && !items.is_empty() =>
                        {
                            for (i, item) in items.iter().enumerate() {
                                flat.insert(self.member_key(&joined, i), item.clone());
                            }
                        }
                        _ => {
                            flat.insert(joined, value.clone());
                        }
                    }
                }
            }
            prefix.pop();
        }
    }

    /// Rebuild the nested tree, regrouping list members.
    pub fn unflatten(&self, flat: &FlatSettings) -> SettingsResult<SettingsTree> {
        let mut tree = SettingsTree::new();
        let mut groups: BTreeMap<&str, BTreeMap<usize, &Value>> = BTreeMap::new();

        for (key, value) in flat {
            match self.parse_member(key) {
                Some((base, index)) => {
                    groups.entry(base).or_default().insert(index, value);
                }
                None => tree.set_leaf(&self.split(key), value.clone())?,
            }
        }

        for (base, members) in groups {
            if flat.contains_key(base) {
                return Err(SettingsError::PathConflict {
                    path: base.to_string(),
                    reason: "key is both a scalar and a multi-value group",
                });
            }
            let mut items = Vec::with_capacity(members.len());
            for (expected, (index, value)) in members.into_iter().enumerate() {
                if index != expected {
                    return Err(SettingsError::SparseGroup {
                        key: base.to_string(),
                        index: expected,
                    });
                }
                items.push(value.clone());
            }
            tree.set_leaf(&self.split(base), Value::List(items))?;
        }

        Ok(tree)
    }
}
