//! The simulation seam.
//!
//! The physics solver is a black box: a settings tree goes in, lists of
//! global and local result mappings come out (only the first element of each
//! list is used), or the call fails.

use std::panic::{AssertUnwindSafe, catch_unwind};

use fc_results::{GlobalData, LocalData, RunOutcome};
use fc_settings::SettingsTree;
use thiserror::Error;

#[derive(Debug, Clone, Default)]
pub struct SimulationOutput {
    pub global: Vec<GlobalData>,
    pub local: Vec<LocalData>,
    /// Free-form extras some solvers return; not stored in result tables.
    pub additional: Option<serde_json::Value>,
}

impl SimulationOutput {
    pub fn single(global: GlobalData, local: LocalData) -> Self {
        Self {
            global: vec![global],
            local: vec![local],
            additional: None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Missing setting '{path}'")]
    MissingSetting { path: String },

    #[error("Invalid setting '{path}': {reason}")]
    InvalidSetting { path: String, reason: String },

    #[error("Operating point not reachable: {0}")]
    NotConverged(String),

    #[error("{0}")]
    Failed(String),
}

pub trait Simulator: Sync {
    fn run(&self, settings: &SettingsTree) -> Result<SimulationOutput, SimulationError>;
}

impl<F> Simulator for F
where
    F: Fn(&SettingsTree) -> Result<SimulationOutput, SimulationError> + Sync,
{
    fn run(&self, settings: &SettingsTree) -> Result<SimulationOutput, SimulationError> {
        self(settings)
    }
}

/// Run one simulation and reduce whatever happens to a [`RunOutcome`].
///
/// Errors, panics and empty result lists all become failure strings.
pub fn run_guarded<S: Simulator + ?Sized>(simulator: &S, settings: &SettingsTree) -> RunOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| simulator.run(settings)));
    match result {
        Ok(Ok(output)) => {
            let mut global = output.global.into_iter();
            let mut local = output.local.into_iter();
            match (global.next(), local.next()) {
                (Some(global), Some(local)) => RunOutcome::Success { global, local },
                _ => RunOutcome::Failure("simulation returned no results".to_string()),
            }
        }
        Ok(Err(err)) => RunOutcome::Failure(err.to_string()),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            RunOutcome::Failure(format!("simulation panicked: {}", msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_simulators() {
        let sim = |_: &SettingsTree| -> Result<SimulationOutput, SimulationError> {
            Ok(SimulationOutput::single(GlobalData::new(), LocalData::new()))
        };
        assert!(run_guarded(&sim, &SettingsTree::new()).is_success());
    }

    #[test]
    fn errors_become_failure_strings() {
        let sim = |_: &SettingsTree| -> Result<SimulationOutput, SimulationError> {
            Err(SimulationError::Failed("diverged".to_string()))
        };
        assert_eq!(
            run_guarded(&sim, &SettingsTree::new()),
            RunOutcome::Failure("diverged".to_string())
        );
    }

    #[test]
    fn empty_lists_and_panics_are_failures() {
        let empty = |_: &SettingsTree| -> Result<SimulationOutput, SimulationError> {
            Ok(SimulationOutput::default())
        };
        assert!(!run_guarded(&empty, &SettingsTree::new()).is_success());

        let panicking = |_: &SettingsTree| -> Result<SimulationOutput, SimulationError> {
            panic!("index out of bounds")
        };
        match run_guarded(&panicking, &SettingsTree::new()) {
            RunOutcome::Failure(msg) => assert!(msg.contains("index out of bounds")),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
