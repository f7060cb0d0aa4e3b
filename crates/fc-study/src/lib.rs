//! fc-study: turning one nominal configuration into a batch of study rows.
//!
//! - variation: variation records, literal parsing, single/full expansion
//! - curve: operating point planning for polarization curves
//! - plan: study plan files (mode, runner and curve options, variations)

pub mod curve;
pub mod plan;
pub mod row;
pub mod variation;

pub use curve::{BisectionPlanner, CurveSample, PointPlanner, interpolate_1d, linear_points};
pub use plan::{CurveOptions, ExecutionOptions, SearchAcceptance, StudyPlan, load_plan, save_plan};
pub use row::{ConfigRow, ExpandedBatch};
pub use variation::{
    StudyMode, VariationRecord, VariationSpec, VariationType, expand, expand_specs, parse_specs,
    resolve_values,
};

pub type StudyResult<T> = Result<T, StudyError>;

#[derive(thiserror::Error, Debug)]
pub enum StudyError {
    #[error("Invalid values for parameter '{parameter}': {source}")]
    Parse {
        parameter: String,
        #[source]
        source: fc_core::ParseError,
    },

    #[error("Parameter '{0}' is not part of the nominal configuration")]
    UnknownParameter(String),

    #[error("Parameter '{0}' is varied more than once")]
    DuplicateParameter(String),

    #[error("Parameter '{0}' has no values to vary over")]
    EmptyValueSet(String),

    #[error("Percent variation of '{parameter}' needs a single number, got {found}")]
    InvalidPercent { parameter: String, found: String },

    #[error("Cannot apply percent variation to '{parameter}': {source}")]
    NonNumericNominal {
        parameter: String,
        #[source]
        source: fc_core::CoreError,
    },

    #[error("Invalid study plan: {0}")]
    InvalidPlan(String),

    #[error("Unsupported plan file format: {0}")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
