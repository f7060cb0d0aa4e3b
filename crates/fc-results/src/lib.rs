//! fc-results: study result tables, transport encoding and on-disk storage.

pub mod hash;
pub mod store;
pub mod table;
pub mod transport;
pub mod types;

pub use hash::compute_study_id;
pub use store::{StudyStore, export_table, import_table};
pub use table::{ResultTable, StudyRow};
pub use transport::{
    SerializationError, from_transport, from_transport_opt, to_transport, to_transport_opt,
};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Study not found: {study_id}")]
    StudyNotFound { study_id: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },
}
