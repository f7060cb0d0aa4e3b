//! Study storage API.
//!
//! Layout: `<root>/<study_id>/manifest.json` plus `table.fcst` holding the
//! transport-encoded result table.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{ResultTable, ResultsError, ResultsResult, StudyManifest, from_transport, to_transport};

const MANIFEST_FILE: &str = "manifest.json";
const TABLE_FILE: &str = "table.fcst";

#[derive(Clone)]
pub struct StudyStore {
    root_dir: PathBuf,
}

impl StudyStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    /// Store next to a settings file, under `.fcstudy/studies`.
    pub fn for_settings(settings_path: &Path) -> ResultsResult<Self> {
        let dir = settings_path
            .parent()
            .ok_or_else(|| ResultsError::InvalidPath {
                message: "settings path has no parent directory".to_string(),
            })?;
        Self::new(dir.join(".fcstudy").join("studies"))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn study_dir(&self, study_id: &str) -> PathBuf {
        self.root_dir.join(study_id)
    }

    pub fn has_study(&self, study_id: &str) -> bool {
        self.study_dir(study_id).join(MANIFEST_FILE).exists()
    }

    pub fn save_study(&self, manifest: &StudyManifest, table: &ResultTable) -> ResultsResult<()> {
        let study_dir = self.study_dir(&manifest.study_id);
        fs::create_dir_all(&study_dir)?;

        let manifest_json = serde_json::to_string_pretty(manifest)?;
        fs::write(study_dir.join(MANIFEST_FILE), manifest_json)?;
        fs::write(study_dir.join(TABLE_FILE), to_transport(table)?)?;
        Ok(())
    }

    pub fn load_manifest(&self, study_id: &str) -> ResultsResult<StudyManifest> {
        let manifest_path = self.study_dir(study_id).join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(ResultsError::StudyNotFound {
                study_id: study_id.to_string(),
            });
        }
        let content = fs::read_to_string(manifest_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_table(&self, study_id: &str) -> ResultsResult<ResultTable> {
        let table_path = self.study_dir(study_id).join(TABLE_FILE);
        if !table_path.exists() {
            return Err(ResultsError::StudyNotFound {
                study_id: study_id.to_string(),
            });
        }
        import_table(&table_path)
    }

    /// Every readable manifest, newest first.
    pub fn list_studies(&self) -> ResultsResult<Vec<StudyManifest>> {
        let mut studies = Vec::new();
        if !self.root_dir.exists() {
            return Ok(studies);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let study_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&study_id) {
                    studies.push(manifest);
                }
            }
        }
        studies.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(studies)
    }

    pub fn delete_study(&self, study_id: &str) -> ResultsResult<()> {
        let study_dir = self.study_dir(study_id);
        if study_dir.exists() {
            fs::remove_dir_all(study_dir)?;
        }
        Ok(())
    }
}

/// Write a table as a standalone transport file.
pub fn export_table(path: &Path, table: &ResultTable) -> ResultsResult<()> {
    fs::write(path, to_transport(table)?)?;
    Ok(())
}

pub fn import_table(path: &Path) -> ResultsResult<ResultTable> {
    let content = fs::read_to_string(path)?;
    Ok(from_transport(&content)?)
}
