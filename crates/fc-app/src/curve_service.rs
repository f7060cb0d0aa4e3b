//! Polarization curve discovery and refinement for one base row.
//!
//! SEARCHING runs the initial points under a shrinking upper bound until an
//! attempt is accepted. REFINING then runs a fixed number of planner passes,
//! keeping only converged points. A base whose search never succeeds ends
//! ABORTED with an empty accumulator; that is logged, never an error.

use fc_results::ResultTable;
use fc_settings::{SettingsCodec, SettingsTree};
use fc_study::{
    ConfigRow, CurveOptions, CurveSample, ExecutionOptions, PointPlanner, SearchAcceptance,
};
use tracing::{debug, info, warn};

use crate::runner::run_rows;
use crate::simulation::Simulator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveState {
    Searching { upper: f64 },
    Refining { pass: usize },
    Done,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct CurveRun {
    /// Converged points of this base, in the order they were computed.
    pub table: ResultTable,
    pub state: CurveState,
    pub attempted_bounds: Vec<f64>,
    pub accepted_bound: Option<f64>,
    pub simulation_calls: usize,
}

impl CurveRun {
    pub fn is_aborted(&self) -> bool {
        self.state == CurveState::Aborted
    }
}

fn samples(table: &ResultTable, response_key: Option<&str>) -> Vec<CurveSample> {
    table
        .iter()
        .filter_map(|row| {
            let current_density = row.config.operating_current_density?;
            let response = response_key
                .and_then(|key| row.global_data()?.get(key))
                .map(|q| q.value);
            Some(CurveSample {
                current_density,
                response,
            })
        })
        .collect()
}

fn points_to_rows(base_row: &ConfigRow, path: &str, points: &[f64]) -> Vec<ConfigRow> {
    points
        .iter()
        .map(|&i| base_row.at_current_density(path, i))
        .collect()
}

/// Discover and refine the curve of `base_row`.
pub fn run_curve<S: Simulator + ?Sized>(
    simulator: &S,
    base: &SettingsTree,
    codec: &SettingsCodec,
    base_row: &ConfigRow,
    options: &CurveOptions,
    execution: &ExecutionOptions,
    mut on_state: Option<&mut dyn FnMut(CurveState)>,
) -> CurveRun {
    let planner = options.planner();
    let path = options.current_density_path.as_str();
    let mut notify = |state: CurveState| {
        if let Some(cb) = on_state.as_deref_mut() {
            cb(state);
        }
    };

    let mut run = CurveRun {
        table: ResultTable::new(),
        state: CurveState::Aborted,
        attempted_bounds: Vec::new(),
        accepted_bound: None,
        simulation_calls: 0,
    };

    let keep_all = ExecutionOptions {
        return_unsuccessful: true,
        ..execution.clone()
    };
    for upper in options.search_bounds() {
        notify(CurveState::Searching { upper });
        run.attempted_bounds.push(upper);

        let points = planner.initial_points(options.min_current_density, upper);
        run.simulation_calls += points.len();
        let batch = run_rows(
            simulator,
            base,
            codec,
            points_to_rows(base_row, path, &points),
            &keep_all,
            None,
        );
        let accepted = match options.acceptance {
            SearchAcceptance::AnyPoint => batch.table.successful_count() > 0,
            SearchAcceptance::AllPoints => batch.all_successful,
        };
        if accepted {
            info!(
                upper,
                converged = batch.table.successful_count(),
                "curve search accepted"
            );
            let mut table = batch.table;
            table.retain_successful();
            table.reindex();
            run.table = table;
            run.accepted_bound = Some(upper);
            break;
        }
        info!(upper, step = options.search_step, "curve search failed, lowering bound");
    }

    if run.accepted_bound.is_none() {
        warn!(
            variation = base_row.variation_parameter.as_deref().unwrap_or("nominal"),
            attempts = run.attempted_bounds.len(),
            "no current density bound converged, skipping base"
        );
        notify(CurveState::Aborted);
        return run;
    }

    let drop_failed = ExecutionOptions {
        return_unsuccessful: false,
        ..execution.clone()
    };
    for pass in 0..options.refinement_passes {
        notify(CurveState::Refining { pass });
        let points =
            planner.refinement_points(&samples(&run.table, options.response_key.as_deref()));
        if points.is_empty() {
            debug!(pass, "no refinement points");
            continue;
        }
        run.simulation_calls += points.len();
        let batch = run_rows(
            simulator,
            base,
            codec,
            points_to_rows(base_row, path, &points),
            &drop_failed,
            None,
        );
        debug!(pass, added = batch.table.len(), "refinement pass");
        run.table.extend(batch.table);
    }

    run.state = CurveState::Done;
    notify(CurveState::Done);
    run
}
