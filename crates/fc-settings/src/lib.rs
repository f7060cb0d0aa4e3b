//! fc-settings: hierarchical simulation settings and their flat key space.
//!
//! A settings document is a nested mapping (`stack -> cathode -> channel ->
//! length`). Study tables and input forms address the same leaves through
//! flat, dash-joined keys (`stack-cathode-channel-length`). This crate owns
//! both representations and the conversions between them.

pub mod codec;
pub mod transfer;
pub mod tree;

use std::path::Path;

pub use codec::{FlatSettings, MultiValueEncoding, SettingsCodec};
pub use transfer::{Extraction, LookupError, Transfer, UpdateMode, extract, merge_flat, update_settings};
pub use tree::{SettingsNode, SettingsTree};

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("Path conflict at '{path}': {reason}")]
    PathConflict { path: String, reason: &'static str },

    #[error("Multi-value group '{key}' is missing element {index}")]
    SparseGroup { key: String, index: usize },

    #[error("Unsupported settings value at '{path}': {reason}")]
    Unsupported { path: String, reason: String },

    #[error("Unsupported settings file format: {0}")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings file flavours, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Yaml,
    Json,
}

impl SettingsFormat {
    pub fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            other => Err(SettingsError::UnknownFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

pub fn load_yaml(path: &Path) -> SettingsResult<SettingsTree> {
    let content = std::fs::read_to_string(path)?;
    let document: serde_json::Value = serde_yaml::from_str(&content)?;
    SettingsTree::from_json(&document)
}

pub fn save_yaml(path: &Path, settings: &SettingsTree) -> SettingsResult<()> {
    let content = serde_yaml::to_string(&settings.to_json()?)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> SettingsResult<SettingsTree> {
    let content = std::fs::read_to_string(path)?;
    let document: serde_json::Value = serde_json::from_str(&content)?;
    SettingsTree::from_json(&document)
}

pub fn save_json(path: &Path, settings: &SettingsTree) -> SettingsResult<()> {
    let content = serde_json::to_string_pretty(&settings.to_json()?)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a settings file, choosing the parser from the extension.
pub fn load_settings(path: &Path) -> SettingsResult<SettingsTree> {
    match SettingsFormat::from_path(path)? {
        SettingsFormat::Yaml => load_yaml(path),
        SettingsFormat::Json => load_json(path),
    }
}

pub fn save_settings(path: &Path, settings: &SettingsTree) -> SettingsResult<()> {
    match SettingsFormat::from_path(path)? {
        SettingsFormat::Yaml => save_yaml(path, settings),
        SettingsFormat::Json => save_json(path, settings),
    }
}
