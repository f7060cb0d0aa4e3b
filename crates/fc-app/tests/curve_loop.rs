//! Curve discovery: search, abort and refinement.

use std::sync::Mutex;

use fc_app::{
    CurveState, PolarizationModel, SimulationError, SimulationOutput, demo_settings,
    polarization_curves, run_curve,
};
use fc_core::Value;
use fc_results::{GlobalData, LocalData};
use fc_settings::{SettingsCodec, SettingsTree};
use fc_study::{ConfigRow, CurveOptions, ExecutionOptions, SearchAcceptance};

const CD_PATH: &str = "simulation-current_density";

fn current_density(settings: &SettingsTree) -> f64 {
    settings
        .leaf(&["simulation", "current_density"])
        .and_then(Value::as_f64)
        .unwrap_or(f64::NAN)
}

fn base_row(settings: &SettingsTree) -> ConfigRow {
    ConfigRow::nominal(SettingsCodec::default().flatten(settings))
}

#[test]
fn always_failing_base_is_aborted_after_three_bounds() {
    let calls = Mutex::new(Vec::new());
    let failing = |settings: &SettingsTree| -> Result<SimulationOutput, SimulationError> {
        calls.lock().unwrap().push(current_density(settings));
        Err(SimulationError::Failed("no convergence".to_string()))
    };
    let settings = demo_settings();
    let mut states = Vec::new();

    let run = run_curve(
        &failing,
        &settings,
        &SettingsCodec::default(),
        &base_row(&settings),
        &CurveOptions::default(),
        &ExecutionOptions::default(),
        Some(&mut |state| states.push(state)),
    );

    assert!(run.is_aborted());
    assert!(run.table.is_empty());
    assert_eq!(run.attempted_bounds, vec![10000.0, 8000.0, 6000.0]);
    assert_eq!(run.accepted_bound, None);
    assert_eq!(states.last(), Some(&CurveState::Aborted));
    assert!(!states.iter().any(|s| matches!(s, CurveState::Refining { .. })));

    let calls = calls.into_inner().unwrap();
    assert_eq!(calls.len(), 3 * CurveOptions::default().initial_points);
    assert_eq!(run.simulation_calls, calls.len());
    assert!(calls.iter().all(|&i| (1.0..=10000.0).contains(&i)));
}

#[test]
fn zero_search_step_aborts_without_simulating() {
    let settings = demo_settings();
    let options = CurveOptions {
        search_step: 0.0,
        ..CurveOptions::default()
    };
    let run = run_curve(
        &PolarizationModel,
        &settings,
        &SettingsCodec::default(),
        &base_row(&settings),
        &options,
        &ExecutionOptions::default(),
        None,
    );

    assert!(run.is_aborted());
    assert!(run.attempted_bounds.is_empty());
    assert!(run.table.is_empty());
    assert_eq!(run.simulation_calls, 0);
}

#[test]
fn all_points_acceptance_shrinks_the_bound() {
    // Converges only below 7000 A/m².
    let capped = |settings: &SettingsTree| -> Result<SimulationOutput, SimulationError> {
        if current_density(settings) >= 7000.0 {
            return Err(SimulationError::NotConverged("too high".to_string()));
        }
        Ok(SimulationOutput::single(GlobalData::new(), LocalData::new()))
    };
    let settings = demo_settings();
    let options = CurveOptions {
        acceptance: SearchAcceptance::AllPoints,
        refinement_passes: 0,
        ..CurveOptions::default()
    };

    let run = run_curve(
        &capped,
        &settings,
        &SettingsCodec::default(),
        &base_row(&settings),
        &options,
        &ExecutionOptions::default(),
        None,
    );

    assert_eq!(run.state, CurveState::Done);
    assert_eq!(run.accepted_bound, Some(6000.0));
    assert_eq!(run.table.len(), options.initial_points);
    assert!(run.table.all_successful());
}

#[test]
fn refinement_adds_converged_points_only() {
    let settings = demo_settings();
    let options = CurveOptions {
        refinement_passes: 5,
        ..CurveOptions::default()
    };
    let run = run_curve(
        &PolarizationModel,
        &settings,
        &SettingsCodec::default(),
        &base_row(&settings),
        &options,
        &ExecutionOptions::default(),
        None,
    );

    assert_eq!(run.state, CurveState::Done);
    assert_eq!(run.accepted_bound, Some(10000.0));
    // The 10000 A/m² point is above the limiting current and was dropped.
    assert!(run.table.len() > options.initial_points);
    assert!(run.table.all_successful());
    let indices: Vec<usize> = run.table.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..run.table.len()).collect::<Vec<_>>());

    let curves = polarization_curves(&run.table, CD_PATH, "Average Cell Voltage");
    assert_eq!(curves.len(), 1);
    let points = &curves[0].points;
    assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
    // Voltage falls along the curve.
    assert!(points.windows(2).all(|w| w[0].1 > w[1].1));
}

#[test]
fn refinement_is_a_fixed_number_of_passes() {
    let mut passes = 0;
    let settings = demo_settings();
    let options = CurveOptions {
        refinement_passes: 4,
        ..CurveOptions::default()
    };
    run_curve(
        &PolarizationModel,
        &settings,
        &SettingsCodec::default(),
        &base_row(&settings),
        &options,
        &ExecutionOptions::default(),
        Some(&mut |state| {
            if matches!(state, CurveState::Refining { .. }) {
                passes += 1;
            }
        }),
    );
    assert_eq!(passes, 4);
}
