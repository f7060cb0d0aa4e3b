//! Bridging configuration rows and settings trees.

use std::path::Path;

use fc_core::{Coerced, Value, coerce_list, coerce_str};
use fc_settings::{
    FlatSettings, LookupError, SettingsCodec, SettingsTree, extract, load_settings, merge_flat,
};
use fc_study::ConfigRow;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

pub fn load_base_settings(path: &Path) -> AppResult<SettingsTree> {
    load_settings(path).map_err(|source| AppError::SettingsFileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// The nominal row: every leaf of `settings`, or only `input_paths`.
///
/// List leaves stay whole under their own path. Paths that do not resolve
/// are returned next to the row.
pub fn nominal_row(
    settings: &SettingsTree,
    codec: &SettingsCodec,
    input_paths: Option<&[String]>,
) -> (ConfigRow, Vec<LookupError>) {
    match input_paths {
        None => (
            ConfigRow::nominal(codec.whole_lists().flatten(settings)),
            Vec::new(),
        ),
        Some(paths) => {
            let extraction = extract(settings, codec, paths);
            for miss in &extraction.missing {
                warn!(path = %miss.path, "input path not found in base settings");
            }
            (ConfigRow::nominal(extraction.values), extraction.missing)
        }
    }
}

/// Settings tree for one row.
///
/// Row keys the base settings do not have are skipped with a warning.
pub fn row_settings(base: &SettingsTree, codec: &SettingsCodec, row: &ConfigRow) -> SettingsTree {
    let transfer = merge_flat(base, codec, &row.params);
    if !transfer.is_complete() {
        for miss in &transfer.missing {
            warn!(path = %miss.path, "row parameter not found in base settings");
        }
    }
    transfer.settings
}

/// Parse `key=value` overrides, coercing the value the way form inputs are.
///
/// A comma-separated value becomes a list.
pub fn parse_overrides<S: AsRef<str>>(overrides: &[S]) -> AppResult<FlatSettings> {
    let mut flat = FlatSettings::new();
    for item in overrides {
        let item = item.as_ref();
        let (key, raw) = item.split_once('=').ok_or_else(|| {
            AppError::InvalidInput(format!("override '{}' is not of the form key=value", item))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "override '{}' has an empty key",
                item
            )));
        }
        let raw = raw.trim();
        let coerced = if raw.contains(',') {
            let items: Vec<&str> = raw.split(',').map(str::trim).collect();
            coerce_list(&items)
        } else {
            coerce_str(raw)
        };
        let value = match coerced {
            Coerced::Text(text) => match text.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Text(text),
            },
            other => other.into_value(),
        };
        debug!(key, %value, "settings override");
        flat.insert(key.to_string(), value);
    }
    Ok(flat)
}

/// Apply overrides to `settings`; unknown keys are an error.
pub fn apply_overrides(
    settings: &SettingsTree,
    codec: &SettingsCodec,
    overrides: &FlatSettings,
) -> AppResult<SettingsTree> {
    let transfer = merge_flat(settings, codec, overrides);
    if let Some(miss) = transfer.missing.first() {
        return Err(AppError::Settings(miss.to_string()));
    }
    Ok(transfer.settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SettingsTree {
        let mut tree = SettingsTree::new();
        tree.set_leaf(&["stack", "cell_number"], Value::Int(10)).unwrap();
        tree.set_leaf(&["cathode", "porosity"], Value::Float(0.3)).unwrap();
        tree
    }

    #[test]
    fn nominal_row_with_filter_reports_misses() {
        let codec = SettingsCodec::default();
        let paths = vec!["stack-cell_number".to_string(), "stack-nope".to_string()];
        let (row, missing) = nominal_row(&base(), &codec, Some(&paths));
        assert_eq!(row.params.len(), 1);
        assert_eq!(missing.len(), 1);

        let (all, missing) = nominal_row(&base(), &codec, None);
        assert_eq!(all.params.len(), 2);
        assert!(missing.is_empty());
    }

    #[test]
    fn row_settings_skips_unknown_keys() {
        let codec = SettingsCodec::default();
        let mut row = ConfigRow::default();
        row.params.insert("cathode-porosity".to_string(), Value::Float(0.4));
        row.params.insert("anode-porosity".to_string(), Value::Float(0.4));
        let settings = row_settings(&base(), &codec, &row);
        assert_eq!(settings.leaf(&["cathode", "porosity"]), Some(&Value::Float(0.4)));
        assert!(settings.leaf(&["anode", "porosity"]).is_none());
    }

    #[test]
    fn overrides_are_coerced() {
        let flat = parse_overrides(&["a=1", "b=2.5", "c=ni-ysz", "d=True"]).unwrap();
        assert_eq!(flat["a"], Value::Int(1));
        assert_eq!(flat["b"], Value::Float(2.5));
        assert_eq!(flat["c"], Value::from("ni-ysz"));
        assert_eq!(flat["d"], Value::Bool(true));

        let lists = parse_overrides(&["x=1, 2.5", "y=ni,ysz"]).unwrap();
        assert_eq!(lists["x"], Value::from(vec![1.0, 2.5]));
        assert_eq!(lists["y"], Value::from(vec!["ni", "ysz"]));
        assert!(parse_overrides(&["novalue"]).is_err());
    }

    #[test]
    fn unknown_override_is_an_error() {
        let codec = SettingsCodec::default();
        let mut flat = FlatSettings::new();
        flat.insert("stack-cells".to_string(), Value::Int(3));
        assert!(matches!(
            apply_overrides(&base(), &codec, &flat),
            Err(AppError::Settings(_))
        ));
    }
}
