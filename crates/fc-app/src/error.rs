//! Error types for the fc-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates and
/// gives the CLI one error surface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Failed to read settings file: {path}")]
    SettingsFileRead {
        path: PathBuf,
        #[source]
        source: fc_settings::SettingsError,
    },

    #[error("Study definition error: {0}")]
    Study(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Study not found: {0}")]
    StudyNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fc-app operations.
pub type AppResult<T> = Result<T, AppError>;

// Conversions from backend error types
impl From<fc_settings::SettingsError> for AppError {
    fn from(err: fc_settings::SettingsError) -> Self {
        AppError::Settings(err.to_string())
    }
}

impl From<fc_study::StudyError> for AppError {
    fn from(err: fc_study::StudyError) -> Self {
        AppError::Study(err.to_string())
    }
}

impl From<fc_results::ResultsError> for AppError {
    fn from(err: fc_results::ResultsError) -> Self {
        match err {
            fc_results::ResultsError::StudyNotFound { study_id } => {
                AppError::StudyNotFound(study_id)
            }
            fc_results::ResultsError::Serialization(e) => AppError::Serialization(e.to_string()),
            other => AppError::Results(other.to_string()),
        }
    }
}

impl From<fc_results::SerializationError> for AppError {
    fn from(err: fc_results::SerializationError) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<crate::simulation::SimulationError> for AppError {
    fn from(err: crate::simulation::SimulationError) -> Self {
        AppError::Simulation(err.to_string())
    }
}
