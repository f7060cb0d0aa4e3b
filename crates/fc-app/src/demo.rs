//! A small analytic polarization model.
//!
//! Stands in for a real stack solver in demos and tests. It produces the
//! same result shape a full solver does: global scalars with units and
//! channel-resolved local arrays that reference their abscissa via `xkey`.
//! Operating at or above the limiting current density fails.

use std::collections::BTreeMap;

use fc_core::Value;
use fc_results::{ArrayData, GlobalData, GlobalQuantity, LocalArray, LocalData, LocalSeries};
use fc_settings::{SettingsNode, SettingsTree};
use fc_study::linear_points;

use crate::simulation::{SimulationError, SimulationOutput, Simulator};

#[derive(Debug, Clone, PartialEq)]
struct ModelParameters {
    cell_number: usize,
    nodes: usize,
    current_density: f64,
    active_area: f64,
    channel_length: f64,
    open_circuit_voltage: f64,
    tafel_slope: f64,
    exchange_current_density: f64,
    area_specific_resistance: f64,
    limiting_current_density: f64,
    concentration_coefficient: f64,
}

/// Analytic cell voltage model, see module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolarizationModel;

fn group<const N: usize>(leaves: [(&str, Value); N]) -> SettingsNode {
    let mut tree = SettingsTree::new();
    for (key, value) in leaves {
        tree.insert(key, SettingsNode::Leaf(value));
    }
    SettingsNode::Group(tree)
}

/// Settings document the model reads, with sensible SOFC-like values.
pub fn demo_settings() -> SettingsTree {
    let mut tree = SettingsTree::new();
    tree.insert(
        "stack",
        group([
            ("cell_number", Value::Int(10)),
            ("active_area", Value::Float(0.01)),
            ("channel_length", Value::Float(0.1)),
        ]),
    );
    tree.insert(
        "cell",
        group([
            ("open_circuit_voltage", Value::Float(1.05)),
            ("tafel_slope", Value::Float(0.03)),
            ("exchange_current_density", Value::Float(50.0)),
            ("area_specific_resistance", Value::Float(3.0e-5)),
            ("limiting_current_density", Value::Float(9000.0)),
            ("concentration_coefficient", Value::Float(0.05)),
        ]),
    );
    tree.insert(
        "simulation",
        group([
            ("current_density", Value::Float(4000.0)),
            ("nodes", Value::Int(20)),
        ]),
    );
    tree
}

fn number(settings: &SettingsTree, path: &[&str]) -> Result<f64, SimulationError> {
    let joined = path.join("-");
    let value = settings
        .leaf(path)
        .ok_or_else(|| SimulationError::MissingSetting {
            path: joined.clone(),
        })?;
    value.as_f64().ok_or_else(|| SimulationError::InvalidSetting {
        path: joined,
        reason: format!("expected a number, found {}", value.type_name()),
    })
}

fn count(settings: &SettingsTree, path: &[&str]) -> Result<usize, SimulationError> {
    let value = number(settings, path)?;
    if value < 1.0 || value.fract() != 0.0 {
        return Err(SimulationError::InvalidSetting {
            path: path.join("-"),
            reason: format!("expected a positive integer, found {}", value),
        });
    }
    Ok(value as usize)
}

fn positive(settings: &SettingsTree, path: &[&str]) -> Result<f64, SimulationError> {
    let value = number(settings, path)?;
    if !(value > 0.0 && value.is_finite()) {
        return Err(SimulationError::InvalidSetting {
            path: path.join("-"),
            reason: format!("expected a positive number, found {}", value),
        });
    }
    Ok(value)
}

impl ModelParameters {
    fn from_settings(settings: &SettingsTree) -> Result<Self, SimulationError> {
        Ok(Self {
            cell_number: count(settings, &["stack", "cell_number"])?,
            nodes: count(settings, &["simulation", "nodes"])?.max(2),
            current_density: positive(settings, &["simulation", "current_density"])?,
            active_area: positive(settings, &["stack", "active_area"])?,
            channel_length: positive(settings, &["stack", "channel_length"])?,
            open_circuit_voltage: positive(settings, &["cell", "open_circuit_voltage"])?,
            tafel_slope: positive(settings, &["cell", "tafel_slope"])?,
            exchange_current_density: positive(settings, &["cell", "exchange_current_density"])?,
            area_specific_resistance: number(settings, &["cell", "area_specific_resistance"])?,
            limiting_current_density: positive(settings, &["cell", "limiting_current_density"])?,
            concentration_coefficient: number(settings, &["cell", "concentration_coefficient"])?,
        })
    }

    /// Cell voltage at local current density `i`.
    fn voltage(&self, i: f64) -> Result<f64, SimulationError> {
        if i >= self.limiting_current_density {
            return Err(SimulationError::NotConverged(format!(
                "current density {:.1} A/m² exceeds the limiting current density {:.1} A/m²",
                i, self.limiting_current_density
            )));
        }
        let activation = self.tafel_slope * (i / self.exchange_current_density).max(1.0).ln();
        let ohmic = self.area_specific_resistance * i;
        let concentration = self.concentration_coefficient
            * (self.limiting_current_density / (self.limiting_current_density - i)).ln();
        Ok(self.open_circuit_voltage - activation - ohmic - concentration)
    }
}

fn flat(value: ArrayData, units: &str, xkey: Option<&str>) -> LocalSeries {
    LocalSeries::Flat(LocalArray {
        value,
        units: units.to_string(),
        label: None,
        xkey: xkey.map(str::to_string),
    })
}

impl Simulator for PolarizationModel {
    fn run(&self, settings: &SettingsTree) -> Result<SimulationOutput, SimulationError> {
        let p = ModelParameters::from_settings(settings)?;
        let i_mean = p.current_density;
        let cell_voltage = p.voltage(i_mean)?;

        // Reactant depletion shifts current towards the inlet.
        let gradient = 0.4 * i_mean / p.limiting_current_density;
        let location = linear_points(0.0, p.channel_length, p.nodes);
        let profile: Vec<f64> = location
            .iter()
            .map(|x| i_mean * (1.0 + gradient * (0.5 - x / p.channel_length)))
            .collect();

        // End cells run slightly colder and lose a few millivolts.
        let cells: Vec<f64> = (1..=p.cell_number).map(|k| k as f64).collect();
        let mid = (p.cell_number as f64 + 1.0) / 2.0;
        let spread = (p.cell_number as f64 - 1.0).max(1.0) / 2.0;
        let cell_voltages: Vec<f64> = cells
            .iter()
            .map(|k| cell_voltage - 0.005 * ((k - mid) / spread).powi(2))
            .collect();
        let current_density = ArrayData::Matrix(
            cells
                .iter()
                .map(|k| {
                    let scale = 1.0 - 0.002 * ((k - mid) / spread).powi(2);
                    profile.iter().map(|i| i * scale).collect()
                })
                .collect(),
        );

        let utilisation = i_mean / p.limiting_current_density;
        let h2: Vec<f64> = location
            .iter()
            .map(|x| 0.97 - 0.8 * utilisation * x / p.channel_length)
            .collect();
        let h2o: Vec<f64> = h2.iter().map(|y| 1.0 - y).collect();

        let stack_voltage: f64 = cell_voltages.iter().sum();
        let current = i_mean * p.active_area;

        let mut global = GlobalData::new();
        let mut quantity = |name: &str, value: f64, units: &str| {
            global.insert(
                name.to_string(),
                GlobalQuantity {
                    value,
                    units: units.to_string(),
                },
            );
        };
        quantity("Average Cell Voltage", stack_voltage / p.cell_number as f64, "V");
        quantity("Stack Voltage", stack_voltage, "V");
        quantity("Average Current Density", i_mean, "A/m²");
        quantity("Stack Current", current, "A");
        quantity("Stack Power", stack_voltage * current, "W");
        quantity("Fuel Utilization", utilisation, "-");

        let mut local = LocalData::new();
        local.insert(
            "Channel Location".to_string(),
            flat(ArrayData::Vector(location), "m", None),
        );
        local.insert(
            "Cell Number".to_string(),
            flat(ArrayData::Vector(cells), "-", None),
        );
        local.insert(
            "Cell Voltage".to_string(),
            flat(ArrayData::Vector(cell_voltages), "V", Some("Cell Number")),
        );
        local.insert(
            "Current Density".to_string(),
            flat(current_density, "A/m²", Some("Channel Location")),
        );
        let mut fractions = BTreeMap::new();
        for (species, values) in [("H2", h2), ("H2O", h2o)] {
            fractions.insert(
                species.to_string(),
                LocalArray {
                    value: ArrayData::Vector(values),
                    units: "-".to_string(),
                    label: Some(format!("{} Mole Fraction", species)),
                    xkey: Some("Channel Location".to_string()),
                },
            );
        }
        local.insert(
            "Anode Mole Fractions".to_string(),
            LocalSeries::Grouped {
                entries: fractions,
                xkey: Some("Channel Location".to_string()),
            },
        );

        Ok(SimulationOutput::single(global, local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(current_density: f64) -> SettingsTree {
        let mut settings = demo_settings();
        settings
            .set_leaf(&["simulation", "current_density"], Value::Float(current_density))
            .unwrap();
        settings
    }

    fn voltage(output: &SimulationOutput) -> f64 {
        output.global[0]["Average Cell Voltage"].value
    }

    #[test]
    fn demo_settings_lists_every_model_input() {
        let settings = demo_settings();
        let flat = fc_settings::SettingsCodec::default().flatten(&settings);
        assert_eq!(flat.len(), 11);
        assert_eq!(flat["stack-cell_number"], Value::Int(10));
        assert_eq!(flat["simulation-current_density"], Value::Float(4000.0));
        assert_eq!(
            settings.leaf(&["cell", "limiting_current_density"]),
            Some(&Value::Float(9000.0))
        );
    }

    #[test]
    fn voltage_drops_with_current() {
        let low = PolarizationModel.run(&at(500.0)).unwrap();
        let high = PolarizationModel.run(&at(6000.0)).unwrap();
        assert!(voltage(&low) > voltage(&high));
        assert!(voltage(&low) < 1.05);
    }

    #[test]
    fn fails_above_limiting_current() {
        assert!(matches!(
            PolarizationModel.run(&at(9500.0)),
            Err(SimulationError::NotConverged(_))
        ));
    }

    #[test]
    fn local_shapes_follow_settings() {
        let output = PolarizationModel.run(&demo_settings()).unwrap();
        let local = &output.local[0];
        match &local["Current Density"] {
            LocalSeries::Flat(array) => {
                assert_eq!(array.value.len(), 10);
                assert_eq!(array.value.first_row().map(<[f64]>::len), Some(20));
                assert_eq!(array.xkey.as_deref(), Some("Channel Location"));
            }
            other => panic!("unexpected series {:?}", other),
        }
        assert_eq!(local["Anode Mole Fractions"].sub_keys(), vec!["H2", "H2O"]);
    }

    #[test]
    fn missing_setting_is_reported() {
        let mut settings = SettingsTree::new();
        settings
            .set_leaf(&["stack", "cell_number"], Value::Int(2))
            .unwrap();
        assert!(matches!(
            PolarizationModel.run(&settings),
            Err(SimulationError::MissingSetting { .. })
        ));
    }
}
