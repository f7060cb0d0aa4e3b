//! Study execution service.

use std::time::Instant;

use fc_results::{ResultTable, StudyManifest, StudyStore, compute_study_id};
use fc_settings::{LookupError, SettingsCodec, SettingsTree, extract};
use fc_study::{StudyPlan, expand};
use tracing::{info, warn};

use crate::curve_service::{CurveState, run_curve};
use crate::error::{AppError, AppResult};
use crate::progress::{StudyProgressEvent, StudyStage};
use crate::runner::run_rows;
use crate::settings_service::nominal_row;
use crate::simulation::Simulator;

/// Version tag mixed into study IDs.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request to execute a study.
pub struct StudyRequest<'a> {
    pub settings: &'a SettingsTree,
    pub plan: &'a StudyPlan,
    pub codec: SettingsCodec,
}

#[derive(Debug, Clone, Default)]
pub struct StudyTimingSummary {
    pub expand_time_s: f64,
    pub run_time_s: f64,
    pub total_time_s: f64,
    pub simulation_calls: usize,
}

#[derive(Debug, Clone)]
pub struct StudyResponse {
    pub study_id: String,
    pub table: ResultTable,
    /// No row failed and no curve base was skipped.
    pub all_successful: bool,
    /// Batch positions of curve bases whose search never converged.
    pub unreachable_bases: Vec<usize>,
    /// Input paths that did not resolve in the base settings.
    pub lookup_misses: Vec<LookupError>,
    pub timing: StudyTimingSummary,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(StudyProgressEvent)>,
    stage: StudyStage,
    started: Instant,
    completed: usize,
    total: usize,
    message: Option<String>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(StudyProgressEvent {
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            completed,
            total,
            message,
        });
    }
}

/// Execute a study.
pub fn run_study<S: Simulator + ?Sized>(
    simulator: &S,
    request: &StudyRequest,
) -> AppResult<StudyResponse> {
    run_study_with_progress(simulator, request, None)
}

/// Execute a study and stream progress events.
pub fn run_study_with_progress<S: Simulator + ?Sized>(
    simulator: &S,
    request: &StudyRequest,
    mut progress_cb: Option<&mut dyn FnMut(StudyProgressEvent)>,
) -> AppResult<StudyResponse> {
    let started = Instant::now();
    let mut timing = StudyTimingSummary::default();
    let plan = request.plan;
    let codec = &request.codec;

    emit_progress(
        &mut progress_cb,
        StudyStage::Expanding,
        started,
        0,
        0,
        Some("Expanding parameter sets".to_string()),
    );
    plan.validate()?;
    if plan.curve.enabled {
        let lookup = extract(request.settings, codec, &[&plan.curve.current_density_path]);
        if !lookup.missing.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "current density path '{}' is not a setting",
                plan.curve.current_density_path
            )));
        }
    }

    let study_id = compute_study_id(request.settings, plan, ENGINE_VERSION)?;
    let (nominal, lookup_misses) = nominal_row(request.settings, codec, plan.input_paths.as_deref());
    let batch = expand(&nominal, &plan.variations, plan.mode, plan.keep_nominal)?;
    timing.expand_time_s = started.elapsed().as_secs_f64();
    info!(
        study = %plan.name,
        mode = %plan.mode,
        rows = batch.len(),
        curve = plan.curve.enabled,
        "study expanded"
    );

    let run_started = Instant::now();
    let total = batch.len();
    let mut unreachable_bases = Vec::new();
    let (table, rows_successful) = if plan.curve.enabled {
        let mut curves = Vec::with_capacity(total);
        for (i, base_row) in batch.iter().enumerate() {
            let mut on_state = |state: CurveState| {
                let (stage, message) = match state {
                    CurveState::Searching { upper } => (
                        StudyStage::SearchingCurve,
                        format!("Base {}: searching up to {} A/m²", i + 1, upper),
                    ),
                    CurveState::Refining { pass } => (
                        StudyStage::RefiningCurve,
                        format!("Base {}: refinement pass {}", i + 1, pass + 1),
                    ),
                    CurveState::Done => (StudyStage::RefiningCurve, format!("Base {}: done", i + 1)),
                    CurveState::Aborted => (
                        StudyStage::SearchingCurve,
                        format!("Base {}: no converging bound", i + 1),
                    ),
                };
                let completed = i + usize::from(matches!(state, CurveState::Done | CurveState::Aborted));
                emit_progress(&mut progress_cb, stage, started, completed, total, Some(message));
            };
            let curve = run_curve(
                simulator,
                request.settings,
                codec,
                base_row,
                &plan.curve,
                &plan.execution,
                Some(&mut on_state),
            );
            timing.simulation_calls += curve.simulation_calls;
            if curve.is_aborted() {
                warn!(base = i, "curve base unreachable");
                unreachable_bases.push(i);
            }
            curves.push(curve.table);
        }
        (ResultTable::concat(curves), true)
    } else {
        timing.simulation_calls = total;
        let mut on_row = |done: usize, total: usize| {
            emit_progress(
                &mut progress_cb,
                StudyStage::RunningRows,
                started,
                done,
                total,
                None,
            );
        };
        let rows = run_rows(
            simulator,
            request.settings,
            codec,
            batch.rows,
            &plan.execution,
            Some(&mut on_row),
        );
        (rows.table, rows.all_successful)
    };
    timing.run_time_s = run_started.elapsed().as_secs_f64();
    timing.total_time_s = started.elapsed().as_secs_f64();

    emit_progress(
        &mut progress_cb,
        StudyStage::Completed,
        started,
        total,
        total,
        Some("Study complete".to_string()),
    );

    let all_successful = rows_successful && unreachable_bases.is_empty();
    info!(
        rows = table.len(),
        successful = table.successful_count(),
        unreachable = unreachable_bases.len(),
        total_s = timing.total_time_s,
        "study finished"
    );

    Ok(StudyResponse {
        study_id,
        table,
        all_successful,
        unreachable_bases,
        lookup_misses,
        timing,
    })
}

/// Run the nominal configuration alone.
pub fn run_single<S: Simulator + ?Sized>(
    simulator: &S,
    settings: &SettingsTree,
    codec: &SettingsCodec,
    input_paths: Option<&[String]>,
) -> AppResult<ResultTable> {
    let (nominal, _) = nominal_row(settings, codec, input_paths);
    let batch = run_rows(
        simulator,
        settings,
        codec,
        vec![nominal],
        &fc_study::ExecutionOptions::default(),
        None,
    );
    if let Some(msg) = batch.table.rows.first().and_then(|r| r.failure()) {
        warn!(error = %msg, "single calculation failed");
    }
    Ok(batch.table)
}

/// Persist a finished study and return its manifest.
pub fn save_study(
    store: &StudyStore,
    plan: &StudyPlan,
    response: &StudyResponse,
) -> AppResult<StudyManifest> {
    let mut manifest = StudyManifest::new(
        response.study_id.clone(),
        plan.name.clone(),
        plan.mode,
        plan.curve.enabled,
        &response.table,
    );
    manifest.unreachable_bases = response.unreachable_bases.clone();
    store.save_study(&manifest, &response.table)?;
    Ok(manifest)
}

pub fn load_study(store: &StudyStore, study_id: &str) -> AppResult<(StudyManifest, ResultTable)> {
    let manifest = store.load_manifest(study_id)?;
    let table = store.load_table(study_id)?;
    Ok((manifest, table))
}

pub fn list_studies(store: &StudyStore) -> AppResult<Vec<StudyManifest>> {
    Ok(store.list_studies()?)
}
