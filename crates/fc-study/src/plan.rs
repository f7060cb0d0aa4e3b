//! Study plan files.
//!
//! A plan bundles everything a study needs besides the base settings: the
//! expansion mode, the variation table, runner options and curve options.
//! Every field has a default, so a plan file only lists what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BisectionPlanner, StudyError, StudyMode, StudyResult, VariationRecord};

/// When a curve search attempt counts as successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAcceptance {
    /// At least one initial point converged.
    #[default]
    AnyPoint,
    /// Every initial point converged.
    AllPoints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Run the rows of a batch on the rayon pool.
    pub parallel: bool,
    /// Keep failed rows in the result table.
    pub return_unsuccessful: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            return_unsuccessful: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveOptions {
    /// Compute a polarization curve per study row.
    pub enabled: bool,
    /// Flat settings key of the operating current density.
    pub current_density_path: String,
    /// Global result used to weight refinement, if present.
    pub response_key: Option<String>,
    pub min_current_density: f64,
    pub max_current_density: f64,
    pub search_step: f64,
    /// Search stops once the upper bound is no longer above this value.
    pub search_floor: f64,
    pub refinement_passes: usize,
    pub initial_points: usize,
    pub points_per_pass: usize,
    pub probe_beyond_max: bool,
    pub acceptance: SearchAcceptance,
}

impl Default for CurveOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            current_density_path: "simulation-current_density".to_string(),
            response_key: Some("Average Cell Voltage".to_string()),
            min_current_density: 1.0,
            max_current_density: 10000.0,
            search_step: 2000.0,
            search_floor: 5000.0,
            refinement_passes: 15,
            initial_points: 6,
            points_per_pass: 4,
            probe_beyond_max: true,
            acceptance: SearchAcceptance::AnyPoint,
        }
    }
}

impl CurveOptions {
    /// Upper bounds tried by the search, largest first.
    ///
    /// Empty unless the step is positive and both ends are finite.
    pub fn search_bounds(&self) -> Vec<f64> {
        let mut bounds = Vec::new();
        if !(self.search_step > 0.0 && self.search_step.is_finite())
            || !(self.max_current_density.is_finite() && self.search_floor.is_finite())
        {
            return bounds;
        }
        let mut upper = self.max_current_density;
        while upper > self.search_floor {
            bounds.push(upper);
            upper -= self.search_step;
        }
        bounds
    }

    pub fn planner(&self) -> BisectionPlanner {
        BisectionPlanner {
            initial_points: self.initial_points,
            points_per_pass: self.points_per_pass,
            probe_beyond_max: self.probe_beyond_max,
            ..BisectionPlanner::default()
        }
    }

    pub fn validate(&self) -> StudyResult<()> {
        let invalid = |msg: &str| -> StudyResult<()> { Err(StudyError::InvalidPlan(msg.to_string())) };
        if self.current_density_path.trim().is_empty() {
            return invalid("curve.current_density_path is empty");
        }
        if !(self.search_step > 0.0 && self.search_step.is_finite()) {
            return invalid("curve.search_step must be positive");
        }
        if !(self.max_current_density.is_finite() && self.search_floor.is_finite()) {
            return invalid("curve search bounds must be finite");
        }
        if self.min_current_density >= self.search_floor {
            return invalid("curve.min_current_density must be below curve.search_floor");
        }
        if self.initial_points < 2 {
            return invalid("curve.initial_points must be at least 2");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyPlan {
    pub name: String,
    pub mode: StudyMode,
    /// Append the untagged nominal row to the batch.
    pub keep_nominal: bool,
    /// Flat keys forming the nominal row. `None` uses every settings leaf.
    pub input_paths: Option<Vec<String>>,
    pub execution: ExecutionOptions,
    pub curve: CurveOptions,
    pub variations: Vec<VariationRecord>,
}

impl Default for StudyPlan {
    fn default() -> Self {
        Self {
            name: "study".to_string(),
            mode: StudyMode::Single,
            keep_nominal: false,
            input_paths: None,
            execution: ExecutionOptions::default(),
            curve: CurveOptions::default(),
            variations: Vec::new(),
        }
    }
}

impl StudyPlan {
    pub fn validate(&self) -> StudyResult<()> {
        if self.curve.enabled {
            self.curve.validate()?;
        }
        crate::parse_specs(&self.variations).map(|_| ())
    }
}

pub fn load_plan(path: &Path) -> StudyResult<StudyPlan> {
    let content = std::fs::read_to_string(path)?;
    let plan: StudyPlan = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("json") => serde_json::from_str(&content)?,
        other => {
            return Err(StudyError::UnknownFormat(
                other.unwrap_or("<none>").to_string(),
            ));
        }
    };
    plan.validate()?;
    Ok(plan)
}

pub fn save_plan(path: &Path, plan: &StudyPlan) -> StudyResult<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::to_string(plan)?,
        Some("json") => serde_json::to_string_pretty(plan)?,
        other => {
            return Err(StudyError::UnknownFormat(
                other.unwrap_or("<none>").to_string(),
            ));
        }
    };
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariationType;

    #[test]
    fn default_search_bounds() {
        assert_eq!(
            CurveOptions::default().search_bounds(),
            vec![10000.0, 8000.0, 6000.0]
        );
    }

    #[test]
    fn bounds_empty_when_max_at_floor() {
        let options = CurveOptions {
            max_current_density: 5000.0,
            ..CurveOptions::default()
        };
        assert!(options.search_bounds().is_empty());
    }

    #[test]
    fn bounds_empty_for_non_positive_or_non_finite_step() {
        for step in [0.0, -2000.0, f64::NAN, f64::INFINITY] {
            let options = CurveOptions {
                search_step: step,
                ..CurveOptions::default()
            };
            assert!(options.search_bounds().is_empty(), "step {}", step);
        }
        let options = CurveOptions {
            max_current_density: f64::INFINITY,
            ..CurveOptions::default()
        };
        assert!(options.search_bounds().is_empty());
    }

    #[test]
    fn validate_rejects_zero_step() {
        let options = CurveOptions {
            search_step: 0.0,
            ..CurveOptions::default()
        };
        assert!(matches!(options.validate(), Err(StudyError::InvalidPlan(_))));
    }

    #[test]
    fn saved_plan_loads_back() {
        let dir = std::env::temp_dir().join("fc_study_plan_roundtrip");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let plan = StudyPlan {
            name: "sweep".to_string(),
            mode: StudyMode::Full,
            keep_nominal: true,
            variations: vec![VariationRecord::new(
                "stack-cell_number",
                Some(VariationType::Values),
                "[10, 20]",
            )],
            ..StudyPlan::default()
        };
        for name in ["plan.yaml", "plan.json"] {
            let path = dir.join(name);
            save_plan(&path, &plan).unwrap();
            assert_eq!(load_plan(&path).unwrap(), plan, "{}", name);
        }
    }

    #[test]
    fn minimal_yaml_plan_uses_defaults() {
        let yaml = r#"
mode: full
variations:
  - Parameter: stack-cell_number
    Variation Type: Values
    Values: [10, 20]
"#;
        let plan: StudyPlan = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(plan.mode, StudyMode::Full);
        assert!(plan.execution.return_unsuccessful);
        assert_eq!(plan.curve.refinement_passes, 15);
        assert_eq!(plan.variations[0].values, "[10, 20]");
        plan.validate().unwrap();
    }
}
