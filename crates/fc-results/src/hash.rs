//! Content-based hashing for study IDs.

use fc_settings::SettingsTree;
use fc_study::StudyPlan;
use sha2::{Digest, Sha256};

use crate::SerializationError;

/// Hash of everything that defines a study's inputs.
///
/// Settings and plan are hashed in their bincode form, so non-finite
/// settings values still hash by their bit pattern.
pub fn compute_study_id(
    settings: &SettingsTree,
    plan: &StudyPlan,
    engine_version: &str,
) -> Result<String, SerializationError> {
    let mut hasher = Sha256::new();

    let settings_bytes = bincode::serialize(settings).map_err(SerializationError::Encode)?;
    hasher.update(&settings_bytes);

    let plan_bytes = bincode::serialize(plan).map_err(SerializationError::Encode)?;
    hasher.update(&plan_bytes);

    hasher.update(engine_version.as_bytes());

    let result = hasher.finalize();
    Ok(format!("{:x}", result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::Value;

    fn settings(cells: i64) -> SettingsTree {
        let mut tree = SettingsTree::new();
        tree.set_leaf(&["stack", "cell_number"], Value::Int(cells)).unwrap();
        tree
    }

    fn study_id(settings: &SettingsTree, plan: &StudyPlan) -> String {
        compute_study_id(settings, plan, "v1").unwrap()
    }

    #[test]
    fn hash_stability() {
        let plan = StudyPlan::default();
        assert_eq!(study_id(&settings(10), &plan), study_id(&settings(10), &plan));
        assert_eq!(study_id(&settings(10), &plan).len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let plan = StudyPlan::default();
        assert_ne!(study_id(&settings(10), &plan), study_id(&settings(20), &plan));
        let full = StudyPlan {
            mode: fc_study::StudyMode::Full,
            ..StudyPlan::default()
        };
        assert_ne!(study_id(&settings(10), &plan), study_id(&settings(10), &full));
        assert_ne!(
            compute_study_id(&settings(10), &plan, "v1").unwrap(),
            compute_study_id(&settings(10), &plan, "v2").unwrap()
        );
    }

    #[test]
    fn non_finite_settings_hash_distinctly() {
        let plan = StudyPlan::default();
        let with = |v: f64| {
            let mut tree = settings(10);
            tree.set_leaf(&["cell", "resistance"], Value::Float(v)).unwrap();
            study_id(&tree, &plan)
        };
        assert_ne!(with(f64::NAN), with(f64::INFINITY));
        assert_ne!(with(f64::INFINITY), with(f64::NEG_INFINITY));
        assert_eq!(with(f64::INFINITY), with(f64::INFINITY));
        assert_ne!(with(f64::NAN), study_id(&settings(10), &plan));
    }
}
