//! Study progress events and the progress file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyStage {
    Expanding,
    RunningRows,
    SearchingCurve,
    RefiningCurve,
    Completed,
}

impl StudyStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Expanding => "Expanding",
            Self::RunningRows => "Running",
            Self::SearchingCurve => "Searching curve",
            Self::RefiningCurve => "Refining curve",
            Self::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StudyProgressEvent {
    pub stage: StudyStage,
    pub elapsed_wall_s: f64,
    /// Work units finished so far (rows, or bases in curve mode).
    pub completed: usize,
    pub total: usize,
    pub message: Option<String>,
}

impl StudyProgressEvent {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return if self.stage == StudyStage::Completed { 1.0 } else { 0.0 };
        }
        (self.completed as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor() as u8
    }
}

/// Append-only progress log, one `NN%|done/total` line per update.
///
/// Another process (a UI polling for progress) reads the last line with
/// [`read_progress_percent`].
pub struct ProgressFile {
    path: PathBuf,
    file: File,
    last_percent: Option<u8>,
}

impl ProgressFile {
    /// Create or truncate the file at `path`.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            last_percent: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `event`; repeated percentages are written once.
    pub fn record(&mut self, event: &StudyProgressEvent) -> std::io::Result<()> {
        let percent = event.percent();
        if self.last_percent == Some(percent) {
            return Ok(());
        }
        self.last_percent = Some(percent);
        writeln!(
            self.file,
            "{:>3}%|{}/{}",
            percent, event.completed, event.total
        )?;
        self.file.flush()
    }
}

/// Percentage on the last line of a progress file; 0 on any failure.
pub fn read_progress_percent(path: &Path) -> u8 {
    let Ok(content) = std::fs::read_to_string(path) else {
        return 0;
    };
    content
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.split_once('%'))
        .and_then(|(number, _)| number.trim().parse::<u8>().ok())
        .map(|p| p.min(100))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(completed: usize, total: usize) -> StudyProgressEvent {
        StudyProgressEvent {
            stage: StudyStage::RunningRows,
            elapsed_wall_s: 0.0,
            completed,
            total,
            message: None,
        }
    }

    #[test]
    fn fraction_handles_empty_total() {
        assert_eq!(event(0, 0).fraction(), 0.0);
        assert_eq!(event(1, 4).percent(), 25);
        let done = StudyProgressEvent {
            stage: StudyStage::Completed,
            ..event(0, 0)
        };
        assert_eq!(done.percent(), 100);
    }

    #[test]
    fn missing_or_garbage_file_reads_zero() {
        let dir = std::env::temp_dir().join("fc_app_progress_garbage");
        std::fs::create_dir_all(&dir).unwrap();
        assert_eq!(read_progress_percent(&dir.join("absent.txt")), 0);

        let path = dir.join("garbage.txt");
        std::fs::write(&path, "starting\n").unwrap();
        assert_eq!(read_progress_percent(&path), 0);
    }
}
