//! Shared application service layer for fcstudy.
//!
//! Wires the settings codec, the parameter expander and the result store to
//! a [`Simulator`], and gives the CLI one place for study execution, curve
//! discovery, progress reporting and result queries.

pub mod curve_service;
pub mod demo;
pub mod error;
pub mod progress;
pub mod query;
pub mod runner;
pub mod settings_service;
pub mod simulation;
pub mod study_service;

// Re-export key types for convenience
pub use curve_service::{CurveRun, CurveState, run_curve};
pub use demo::{PolarizationModel, demo_settings};
pub use error::{AppError, AppResult};
pub use progress::{ProgressFile, StudyProgressEvent, StudyStage, read_progress_percent};
pub use query::{
    GlobalRow, LocalSeriesView, PolarizationCurve, TableSummary, extract_global_series,
    extract_local_series, global_table, heatmap_keys, local_keys, polarization_curves, sub_keys,
    table_summary,
};
pub use runner::{RowBatch, run_rows};
pub use settings_service::{
    apply_overrides, load_base_settings, nominal_row, parse_overrides, row_settings,
};
pub use simulation::{SimulationError, SimulationOutput, Simulator, run_guarded};
pub use study_service::{
    ENGINE_VERSION, StudyRequest, StudyResponse, StudyTimingSummary, list_studies, load_study,
    run_single, run_study, run_study_with_progress, save_study,
};
