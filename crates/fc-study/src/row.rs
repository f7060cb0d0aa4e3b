//! Configuration rows and expanded batches.

use fc_core::Value;
use fc_settings::FlatSettings;
use serde::{Deserialize, Serialize};

/// One concrete study input.
///
/// `params` always holds the full nominal key set; the bookkeeping fields
/// never leak into the simulation settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigRow {
    pub params: FlatSettings,
    /// Varied parameter (single mode), comma-joined names (full mode), or
    /// `None` for the nominal row.
    pub variation_parameter: Option<String>,
    /// Set by the curve loop for polarization-curve points.
    #[serde(default)]
    pub operating_current_density: Option<f64>,
}

impl ConfigRow {
    pub fn nominal(params: FlatSettings) -> Self {
        Self {
            params,
            variation_parameter: None,
            operating_current_density: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn is_nominal(&self) -> bool {
        self.variation_parameter.is_none()
    }

    /// Copy of this row with `overrides` applied and a new tag.
    pub fn varied<'a, I>(&self, overrides: I, tag: &str) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut row = self.clone();
        for (key, value) in overrides {
            row.params.insert(key.to_string(), value.clone());
        }
        row.variation_parameter = Some(tag.to_string());
        row
    }

    /// Copy of this row operating at `current_density`, written to `path`.
    pub fn at_current_density(&self, path: &str, current_density: f64) -> Self {
        let mut row = self.clone();
        row.params
            .insert(path.to_string(), Value::Float(current_density));
        row.operating_current_density = Some(current_density);
        row
    }
}

/// Ordered rows produced by the expander.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpandedBatch {
    pub rows: Vec<ConfigRow>,
}

impl ExpandedBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigRow> {
        self.rows.iter()
    }

    /// Distinct tags in order of first appearance.
    pub fn variation_parameters(&self) -> Vec<Option<&str>> {
        let mut seen: Vec<Option<&str>> = Vec::new();
        for row in &self.rows {
            let tag = row.variation_parameter.as_deref();
            if !seen.contains(&tag) {
                seen.push(tag);
            }
        }
        seen
    }
}

impl IntoIterator for ExpandedBatch {
    type Item = ConfigRow;
    type IntoIter = std::vec::IntoIter<ConfigRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal() -> ConfigRow {
        let mut params = FlatSettings::new();
        params.insert("stack-cell_number".to_string(), Value::Int(10));
        params.insert("simulation-current_density".to_string(), Value::Float(5000.0));
        ConfigRow::nominal(params)
    }

    #[test]
    fn varied_keeps_other_keys() {
        let value = Value::Int(20);
        let row = nominal().varied([("stack-cell_number", &value)], "stack-cell_number");
        assert_eq!(row.get("stack-cell_number"), Some(&Value::Int(20)));
        assert_eq!(row.params.len(), 2);
        assert_eq!(row.variation_parameter.as_deref(), Some("stack-cell_number"));
    }

    #[test]
    fn current_density_is_mirrored_in_params() {
        let row = nominal().at_current_density("simulation-current_density", 250.0);
        assert_eq!(row.get("simulation-current_density"), Some(&Value::Float(250.0)));
        assert_eq!(row.operating_current_density, Some(250.0));
    }

    #[test]
    fn variation_parameters_are_unique_in_order() {
        let v = Value::Int(1);
        let batch = ExpandedBatch {
            rows: vec![
                nominal().varied([("a", &v)], "a"),
                nominal().varied([("b", &v)], "b"),
                nominal().varied([("a", &v)], "a"),
                nominal(),
            ],
        };
        assert_eq!(batch.variation_parameters(), vec![Some("a"), Some("b"), None]);
    }
}
