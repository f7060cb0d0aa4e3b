//! Row-oriented result table.

use fc_study::ConfigRow;
use serde::{Deserialize, Serialize};

use crate::{GlobalData, LocalData, RunOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRow {
    pub index: usize,
    pub config: ConfigRow,
    pub outcome: RunOutcome,
}

impl StudyRow {
    pub fn global_data(&self) -> Option<&GlobalData> {
        match &self.outcome {
            RunOutcome::Success { global, .. } => Some(global),
            RunOutcome::Failure(_) => None,
        }
    }

    pub fn local_data(&self) -> Option<&LocalData> {
        match &self.outcome {
            RunOutcome::Success { local, .. } => Some(local),
            RunOutcome::Failure(_) => None,
        }
    }

    pub fn successful_run(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Failure(msg) => Some(msg),
            RunOutcome::Success { .. } => None,
        }
    }

    pub fn variation_parameter(&self) -> Option<&str> {
        self.config.variation_parameter.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultTable {
    pub rows: Vec<StudyRow>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StudyRow> {
        self.rows.iter()
    }

    /// Append a row, giving it the next index.
    pub fn push(&mut self, config: ConfigRow, outcome: RunOutcome) {
        let index = self.rows.len();
        self.rows.push(StudyRow {
            index,
            config,
            outcome,
        });
    }

    pub fn all_successful(&self) -> bool {
        self.rows.iter().all(StudyRow::successful_run)
    }

    pub fn successful_count(&self) -> usize {
        self.rows.iter().filter(|r| r.successful_run()).count()
    }

    /// Drop failed rows. Indices are not touched.
    pub fn retain_successful(&mut self) {
        self.rows.retain(StudyRow::successful_run);
    }

    /// Number rows `0..len` in their current order.
    pub fn reindex(&mut self) {
        for (index, row) in self.rows.iter_mut().enumerate() {
            row.index = index;
        }
    }

    /// Append `other` and renumber.
    pub fn extend(&mut self, other: ResultTable) {
        self.rows.extend(other.rows);
        self.reindex();
    }

    /// Concatenate tables in order with contiguous indices.
    pub fn concat<I: IntoIterator<Item = ResultTable>>(tables: I) -> Self {
        let mut table = Self {
            rows: tables.into_iter().flat_map(|t| t.rows).collect(),
        };
        table.reindex();
        table
    }

    /// Distinct variation tags in order of first appearance.
    pub fn variation_parameters(&self) -> Vec<Option<&str>> {
        let mut seen: Vec<Option<&str>> = Vec::new();
        for row in &self.rows {
            let tag = row.variation_parameter();
            if !seen.contains(&tag) {
                seen.push(tag);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(n: usize, fail_at: Option<usize>) -> ResultTable {
        let mut table = ResultTable::new();
        for i in 0..n {
            let outcome = if Some(i) == fail_at {
                RunOutcome::Failure("diverged".to_string())
            } else {
                RunOutcome::Success {
                    global: GlobalData::new(),
                    local: LocalData::new(),
                }
            };
            table.push(ConfigRow::default(), outcome);
        }
        table
    }

    #[test]
    fn concat_reindexes() {
        let merged = ResultTable::concat([table(2, None), table(3, Some(1))]);
        let indices: Vec<_> = merged.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(!merged.all_successful());
        assert_eq!(merged.successful_count(), 4);
    }

    #[test]
    fn failed_rows_expose_no_data() {
        let t = table(1, Some(0));
        assert!(t.rows[0].global_data().is_none());
        assert_eq!(t.rows[0].failure(), Some("diverged"));
    }

    #[test]
    fn empty_table_is_all_successful() {
        assert!(ResultTable::new().all_successful());
    }
}
