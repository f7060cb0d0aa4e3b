//! Batch execution: one simulation per configuration row.

use fc_results::{ResultTable, RunOutcome};
use fc_settings::{SettingsCodec, SettingsTree};
use fc_study::{ConfigRow, ExecutionOptions};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::settings_service::row_settings;
use crate::simulation::{Simulator, run_guarded};

/// Rows of one batch with their outcomes.
#[derive(Debug, Clone)]
pub struct RowBatch {
    pub table: ResultTable,
    /// Every row converged. Computed before failed rows are dropped.
    pub all_successful: bool,
}

fn log_outcome(row: usize, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Success { .. } => debug!(row, "simulation converged"),
        RunOutcome::Failure(msg) => warn!(row, error = %msg, "simulation failed"),
    }
}

/// Run every row against `base`.
///
/// A failing row never stops the batch. `on_row(done, total)` is called
/// after each row, or once at the end when rows run in parallel.
pub fn run_rows<S: Simulator + ?Sized>(
    simulator: &S,
    base: &SettingsTree,
    codec: &SettingsCodec,
    rows: Vec<ConfigRow>,
    options: &ExecutionOptions,
    mut on_row: Option<&mut dyn FnMut(usize, usize)>,
) -> RowBatch {
    let total = rows.len();
    let outcomes: Vec<RunOutcome> = if options.parallel {
        let outcomes: Vec<RunOutcome> = rows
            .par_iter()
            .map(|row| run_guarded(simulator, &row_settings(base, codec, row)))
            .collect();
        if let Some(cb) = on_row.as_deref_mut() {
            cb(total, total);
        }
        outcomes
    } else {
        let mut outcomes = Vec::with_capacity(total);
        for (i, row) in rows.iter().enumerate() {
            outcomes.push(run_guarded(simulator, &row_settings(base, codec, row)));
            if let Some(cb) = on_row.as_deref_mut() {
                cb(i + 1, total);
            }
        }
        outcomes
    };

    let mut table = ResultTable::new();
    for (i, (row, outcome)) in rows.into_iter().zip(outcomes).enumerate() {
        log_outcome(i, &outcome);
        table.push(row, outcome);
    }

    let all_successful = table.all_successful();
    if !options.return_unsuccessful {
        table.retain_successful();
        table.reindex();
    }
    RowBatch {
        table,
        all_successful,
    }
}
