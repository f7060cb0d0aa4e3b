//! Result data types.
//!
//! A simulation returns scalar "global" quantities and array valued "local"
//! quantities. Local entries may name another local entry (`xkey`) that
//! supplies their abscissa, e.g. a current density profile over the channel
//! location.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalQuantity {
    pub value: f64,
    pub units: String,
}

pub type GlobalData = BTreeMap<String, GlobalQuantity>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Vector(Vec<f64>),
    /// Row-major, one inner vector per cell/layer.
    Matrix(Vec<Vec<f64>>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            Self::Vector(v) => v.len(),
            Self::Matrix(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First row of a matrix, or the vector itself.
    pub fn first_row(&self) -> Option<&[f64]> {
        match self {
            Self::Vector(v) => Some(v),
            Self::Matrix(m) => m.first().map(Vec::as_slice),
        }
    }

    pub fn rows(&self) -> Vec<&[f64]> {
        match self {
            Self::Vector(v) => vec![v.as_slice()],
            Self::Matrix(m) => m.iter().map(Vec::as_slice).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalArray {
    pub value: ArrayData,
    pub units: String,
    pub label: Option<String>,
    /// Local entry holding the abscissa of this one.
    pub xkey: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocalSeries {
    Flat(LocalArray),
    /// Several arrays sharing one abscissa, e.g. per-species fractions.
    Grouped {
        entries: BTreeMap<String, LocalArray>,
        xkey: Option<String>,
    },
}

impl LocalSeries {
    pub fn xkey(&self) -> Option<&str> {
        match self {
            Self::Flat(array) => array.xkey.as_deref(),
            Self::Grouped { xkey, .. } => xkey.as_deref(),
        }
    }

    pub fn sub_keys(&self) -> Vec<&str> {
        match self {
            Self::Flat(_) => Vec::new(),
            Self::Grouped { entries, .. } => entries.keys().map(String::as_str).collect(),
        }
    }

    /// The array itself, or one member of a group.
    pub fn array(&self, sub_key: Option<&str>) -> Option<&LocalArray> {
        match (self, sub_key) {
            (Self::Flat(array), None) => Some(array),
            (Self::Grouped { entries, .. }, Some(key)) => entries.get(key),
            _ => None,
        }
    }
}

pub type LocalData = BTreeMap<String, LocalSeries>;

/// What came back from one simulation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunOutcome {
    Success { global: GlobalData, local: LocalData },
    Failure(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyManifest {
    pub study_id: String,
    pub name: String,
    pub timestamp: String,
    pub mode: fc_study::StudyMode,
    pub curve: bool,
    pub row_count: usize,
    pub successful_rows: usize,
    /// Bases whose curve search never converged.
    #[serde(default)]
    pub unreachable_bases: Vec<usize>,
}

impl StudyManifest {
    /// Manifest for `table`, stamped with the current UTC time.
    pub fn new(
        study_id: String,
        name: String,
        mode: fc_study::StudyMode,
        curve: bool,
        table: &crate::ResultTable,
    ) -> Self {
        Self {
            study_id,
            name,
            timestamp: chrono::Utc::now().to_rfc3339(),
            mode,
            curve,
            row_count: table.len(),
            successful_rows: table.successful_count(),
            unreachable_bases: Vec::new(),
        }
    }
}
