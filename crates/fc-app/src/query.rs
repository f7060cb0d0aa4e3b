//! Query helpers for extracting data from result tables.

use fc_results::{GlobalData, LocalArray, LocalData, LocalSeries, ResultTable, StudyRow};

use crate::error::{AppError, AppResult};

/// One line of the global results table.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalRow {
    pub quantity: String,
    /// Scientific notation with three decimals.
    pub value: String,
    pub units: String,
}

pub fn global_table(global: &GlobalData) -> Vec<GlobalRow> {
    global
        .iter()
        .map(|(name, q)| GlobalRow {
            quantity: name.clone(),
            value: format!("{:.3e}", q.value),
            units: q.units.clone(),
        })
        .collect()
}

pub fn local_keys(local: &LocalData) -> Vec<&str> {
    local.keys().map(String::as_str).collect()
}

/// Entries that can be drawn over another entry (they carry an `xkey`).
pub fn heatmap_keys(local: &LocalData) -> Vec<&str> {
    local
        .iter()
        .filter(|(_, series)| series.xkey().is_some())
        .map(|(key, _)| key.as_str())
        .collect()
}

pub fn sub_keys<'a>(local: &'a LocalData, key: &str) -> AppResult<Vec<&'a str>> {
    local
        .get(key)
        .map(LocalSeries::sub_keys)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown local result: {}", key)))
}

/// A local quantity ready for plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSeriesView {
    pub name: String,
    pub units: String,
    /// Abscissa, if the entry names one.
    pub x: Option<(String, Vec<f64>)>,
    /// One row per cell/layer; a vector quantity has a single row.
    pub rows: Vec<Vec<f64>>,
}

fn resolve_array<'a>(
    local: &'a LocalData,
    key: &str,
    sub_key: Option<&str>,
) -> AppResult<&'a LocalArray> {
    let series = local
        .get(key)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown local result: {}", key)))?;
    series.array(sub_key).ok_or_else(|| {
        AppError::InvalidInput(match sub_key {
            Some(sub) => format!("Local result '{}' has no entry '{}'", key, sub),
            None => format!("Local result '{}' is grouped; pick one of its entries", key),
        })
    })
}

pub fn extract_local_series(
    local: &LocalData,
    key: &str,
    sub_key: Option<&str>,
) -> AppResult<LocalSeriesView> {
    let array = resolve_array(local, key, sub_key)?;
    let xkey = array.xkey.as_deref().or_else(|| local.get(key)?.xkey());

    let x = match xkey {
        Some(xkey) => {
            let x_array = resolve_array(local, xkey, None)?;
            let values = x_array.value.first_row().unwrap_or_default().to_vec();
            Some((xkey.to_string(), values))
        }
        None => None,
    };

    Ok(LocalSeriesView {
        name: sub_key.map_or_else(|| key.to_string(), |sub| format!("{} {}", key, sub)),
        units: array.units.clone(),
        x,
        rows: array.value.rows().into_iter().map(<[f64]>::to_vec).collect(),
    })
}

/// Global quantity `key` over all successful rows, tagged with the row index.
pub fn extract_global_series(table: &ResultTable, key: &str) -> Vec<(usize, f64)> {
    table
        .iter()
        .filter_map(|row| Some((row.index, row.global_data()?.get(key)?.value)))
        .collect()
}

/// One polarization curve: a base configuration over current density.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarizationCurve {
    /// `parameter=value` pairs distinguishing this base, or "nominal".
    pub label: String,
    pub variation_parameter: Option<String>,
    /// `(current density, response)`, sorted by current density.
    pub points: Vec<(f64, f64)>,
}

fn base_label(row: &StudyRow) -> String {
    match row.variation_parameter() {
        None => "nominal".to_string(),
        Some(tag) => tag
            .split(',')
            .map(|name| match row.config.get(name) {
                Some(value) => format!("{}={}", name, value),
                None => name.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Group curve rows by base configuration and collect `response_key`.
///
/// Rows without an operating current density are ignored.
pub fn polarization_curves(
    table: &ResultTable,
    current_density_path: &str,
    response_key: &str,
) -> Vec<PolarizationCurve> {
    let mut bases: Vec<(fc_settings::FlatSettings, PolarizationCurve)> = Vec::new();
    for row in table.iter() {
        let Some(current_density) = row.config.operating_current_density else {
            continue;
        };
        let Some(response) = row.global_data().and_then(|g| g.get(response_key)) else {
            continue;
        };
        let mut key = row.config.params.clone();
        key.remove(current_density_path);

        let position = match bases.iter().position(|(params, _)| *params == key) {
            Some(position) => position,
            None => {
                bases.push((
                    key,
                    PolarizationCurve {
                        label: base_label(row),
                        variation_parameter: row.config.variation_parameter.clone(),
                        points: Vec::new(),
                    },
                ));
                bases.len() - 1
            }
        };
        bases[position].1.points.push((current_density, response.value));
    }

    bases
        .into_iter()
        .map(|(_, mut curve)| {
            curve.points.sort_by(|a, b| a.0.total_cmp(&b.0));
            curve
        })
        .collect()
}

/// Counts for a quick table overview.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub rows: usize,
    pub successful: usize,
    pub variation_parameters: Vec<String>,
}

pub fn table_summary(table: &ResultTable) -> TableSummary {
    TableSummary {
        rows: table.len(),
        successful: table.successful_count(),
        variation_parameters: table
            .variation_parameters()
            .into_iter()
            .map(|tag| tag.unwrap_or("nominal").to_string())
            .collect(),
    }
}
