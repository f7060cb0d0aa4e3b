//! Variation records and batch expansion.
//!
//! A variation table lists which parameters of the nominal row to vary and
//! how. `Values` records give the candidate values as a literal
//! (`[0.1, 0.2]`, `1, 2, 3`, `('a', 'b')`); `Percent (+/-)` records give one
//! number `p` and vary the nominal value by `-p%` and `+p%`.

use std::fmt;
use std::str::FromStr;

use fc_core::{Value, parse_literal};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{ConfigRow, ExpandedBatch, StudyError, StudyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariationType {
    #[serde(rename = "Values")]
    Values,
    #[serde(rename = "Percent (+/-)")]
    PercentDeviation,
}

impl VariationType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Values => "Values",
            Self::PercentDeviation => "Percent (+/-)",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Values" => Some(Self::Values),
            "Percent (+/-)" | "Percent" => Some(Self::PercentDeviation),
            _ => None,
        }
    }
}

/// One row of the variation table as it arrives from a plan file or form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationRecord {
    #[serde(rename = "Parameter")]
    pub parameter: String,
    /// Records without a type are ignored.
    #[serde(
        rename = "Variation Type",
        default,
        deserialize_with = "deserialize_variation_type"
    )]
    pub variation_type: Option<VariationType>,
    /// Literal text; numbers and lists are stringified on load.
    #[serde(rename = "Values", default, deserialize_with = "deserialize_raw_values")]
    pub values: String,
}

impl VariationRecord {
    pub fn new(
        parameter: impl Into<String>,
        variation_type: Option<VariationType>,
        values: impl Into<String>,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            variation_type,
            values: values.into(),
        }
    }
}

fn deserialize_variation_type<'de, D>(deserializer: D) -> Result<Option<VariationType>, D::Error>
where
    D: Deserializer<'de>,
{
    let label: Option<String> = Option::deserialize(deserializer)?;
    match label.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => VariationType::from_label(text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown variation type '{}'", text))),
    }
}

fn deserialize_raw_values<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    match raw {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => json_literal(&other)
            .map(|v| v.to_string())
            .map_err(serde::de::Error::custom),
    }
}

fn json_literal(json: &serde_json::Value) -> Result<Value, String> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(items) => {
            Value::List(items.iter().map(json_literal).collect::<Result<_, _>>()?)
        }
        serde_json::Value::Object(_) => return Err("mappings are not valid values".to_string()),
    })
}

/// A parsed, typed variation record.
#[derive(Debug, Clone, PartialEq)]
pub struct VariationSpec {
    pub parameter: String,
    pub variation_type: VariationType,
    pub values: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyMode {
    /// One parameter at a time, everything else nominal.
    #[default]
    Single,
    /// Every combination of all varied parameters.
    Full,
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Full => write!(f, "full"),
        }
    }
}

impl FromStr for StudyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown study mode '{}'", other)),
        }
    }
}

/// Parse the records that carry a variation type.
///
/// Any malformed literal fails the whole table before a row is built.
pub fn parse_specs(records: &[VariationRecord]) -> StudyResult<Vec<VariationSpec>> {
    let mut specs: Vec<VariationSpec> = Vec::new();
    for record in records {
        let Some(variation_type) = record.variation_type else {
            continue;
        };
        let parameter = record.parameter.trim();
        if specs.iter().any(|s| s.parameter == parameter) {
            return Err(StudyError::DuplicateParameter(parameter.to_string()));
        }
        let values = parse_literal(&record.values).map_err(|source| StudyError::Parse {
            parameter: parameter.to_string(),
            source,
        })?;
        specs.push(VariationSpec {
            parameter: parameter.to_string(),
            variation_type,
            values,
        });
    }
    Ok(specs)
}

/// Candidate values of `spec` given the parameter's nominal value.
pub fn resolve_values(spec: &VariationSpec, nominal: &Value) -> StudyResult<Vec<Value>> {
    let values = match spec.variation_type {
        VariationType::Values => match &spec.values {
            Value::List(items) => items.clone(),
            scalar => vec![scalar.clone()],
        },
        VariationType::PercentDeviation => {
            let percent = spec.values.as_f64().ok_or_else(|| StudyError::InvalidPercent {
                parameter: spec.parameter.clone(),
                found: spec.values.to_string(),
            })?;
            let deviate = |sign: f64| {
                nominal
                    .map_numbers(|n| n * (100.0 + sign * percent) / 100.0)
                    .map_err(|source| StudyError::NonNumericNominal {
                        parameter: spec.parameter.clone(),
                        source,
                    })
            };
            vec![deviate(-1.0)?, deviate(1.0)?]
        }
    };
    if values.is_empty() {
        return Err(StudyError::EmptyValueSet(spec.parameter.clone()));
    }
    Ok(values)
}

/// Index tuples of the cartesian product, last position varying fastest.
fn odometer(lengths: &[usize]) -> Vec<Vec<usize>> {
    if lengths.is_empty() || lengths.contains(&0) {
        return Vec::new();
    }
    let mut combos = Vec::with_capacity(lengths.iter().product());
    let mut index = vec![0; lengths.len()];
    loop {
        combos.push(index.clone());
        let mut pos = lengths.len();
        loop {
            if pos == 0 {
                return combos;
            }
            pos -= 1;
            index[pos] += 1;
            if index[pos] < lengths[pos] {
                break;
            }
            index[pos] = 0;
        }
    }
}

/// Build the batch for already parsed specs.
pub fn expand_specs(
    nominal: &ConfigRow,
    specs: &[VariationSpec],
    mode: StudyMode,
    keep_nominal: bool,
) -> StudyResult<ExpandedBatch> {
    let mut base = nominal.clone();
    base.variation_parameter = None;

    let mut resolved: Vec<(&str, Vec<Value>)> = Vec::with_capacity(specs.len());
    for spec in specs {
        let nominal_value = base
            .get(&spec.parameter)
            .ok_or_else(|| StudyError::UnknownParameter(spec.parameter.clone()))?;
        resolved.push((spec.parameter.as_str(), resolve_values(spec, nominal_value)?));
    }

    let mut rows = Vec::new();
    match mode {
        StudyMode::Single => {
            for (name, values) in &resolved {
                for value in values {
                    rows.push(base.varied([(*name, value)], name));
                }
            }
        }
        StudyMode::Full => {
            let tag = resolved
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(",");
            let lengths: Vec<usize> = resolved.iter().map(|(_, values)| values.len()).collect();
            for combo in odometer(&lengths) {
                let overrides = resolved
                    .iter()
                    .zip(&combo)
                    .map(|((name, values), &i)| (*name, &values[i]));
                rows.push(base.varied(overrides, &tag));
            }
        }
    }

    if keep_nominal {
        rows.push(base);
    }
    Ok(ExpandedBatch { rows })
}

/// Expand the nominal row according to the variation table.
pub fn expand(
    nominal: &ConfigRow,
    records: &[VariationRecord],
    mode: StudyMode,
    keep_nominal: bool,
) -> StudyResult<ExpandedBatch> {
    let specs = parse_specs(records)?;
    expand_specs(nominal, &specs, mode, keep_nominal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odometer_last_index_fastest() {
        assert_eq!(
            odometer(&[2, 2]),
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );
        assert!(odometer(&[]).is_empty());
        assert!(odometer(&[3, 0]).is_empty());
    }

    #[test]
    fn untyped_records_are_ignored() {
        let records = vec![
            VariationRecord::new("a", None, "not a literal ("),
            VariationRecord::new("b", Some(VariationType::Values), "[1, 2]"),
        ];
        let specs = parse_specs(&records).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].parameter, "b");
    }

    #[test]
    fn malformed_literal_is_a_parse_error() {
        let records = vec![VariationRecord::new("b", Some(VariationType::Values), "[1, 2")];
        assert!(matches!(parse_specs(&records), Err(StudyError::Parse { .. })));
    }

    #[test]
    fn duplicate_parameter_is_rejected() {
        let records = vec![
            VariationRecord::new("b", Some(VariationType::Values), "1"),
            VariationRecord::new("b", Some(VariationType::Values), "2"),
        ];
        assert!(matches!(
            parse_specs(&records),
            Err(StudyError::DuplicateParameter(_))
        ));
    }

    #[test]
    fn percent_needs_numeric_nominal_and_number() {
        let spec = VariationSpec {
            parameter: "name".to_string(),
            variation_type: VariationType::PercentDeviation,
            values: Value::Int(10),
        };
        assert!(matches!(
            resolve_values(&spec, &Value::from("abc")),
            Err(StudyError::NonNumericNominal { .. })
        ));

        let spec = VariationSpec {
            values: Value::from(vec![1, 2]),
            ..spec
        };
        assert!(matches!(
            resolve_values(&spec, &Value::Int(100)),
            Err(StudyError::InvalidPercent { .. })
        ));
    }

    #[test]
    fn scalar_values_are_one_candidate() {
        let spec = VariationSpec {
            parameter: "p".to_string(),
            variation_type: VariationType::Values,
            values: Value::Float(0.3),
        };
        assert_eq!(resolve_values(&spec, &Value::Null).unwrap(), vec![Value::Float(0.3)]);
    }

    #[test]
    fn record_values_accept_numbers_and_lists() {
        let json = r#"[
            {"Parameter": "a", "Variation Type": "Values", "Values": [1, 2.5, "x", true]},
            {"Parameter": "b", "Variation Type": "Percent (+/-)", "Values": 10},
            {"Parameter": "c", "Variation Type": null, "Values": null},
            {"Parameter": "d", "Variation Type": "", "Values": "1"}
        ]"#;
        let records: Vec<VariationRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].values, "[1, 2.5, 'x', True]");
        assert_eq!(records[1].values, "10");
        assert_eq!(records[1].variation_type, Some(VariationType::PercentDeviation));
        assert_eq!(records[2].variation_type, None);
        assert_eq!(records[3].variation_type, None);
        assert_eq!(parse_specs(&records).unwrap().len(), 2);
    }

    #[test]
    fn unknown_variation_type_fails_to_load() {
        let json = r#"{"Parameter": "a", "Variation Type": "Log", "Values": "1"}"#;
        assert!(serde_json::from_str::<VariationRecord>(json).is_err());
    }

    #[test]
    fn study_mode_parses_case_insensitively() {
        assert_eq!("FULL".parse::<StudyMode>(), Ok(StudyMode::Full));
        assert!("mixed".parse::<StudyMode>().is_err());
    }
}
