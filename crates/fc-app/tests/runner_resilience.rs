//! Batch runner behaviour with failing rows.

use fc_app::{SimulationError, SimulationOutput, run_rows};
use fc_core::Value;
use fc_results::{GlobalData, GlobalQuantity, LocalData};
use fc_settings::{FlatSettings, SettingsCodec, SettingsTree};
use fc_study::{ConfigRow, ExecutionOptions};
use proptest::prelude::*;

fn base() -> SettingsTree {
    let mut tree = SettingsTree::new();
    tree.set_leaf(&["case", "id"], Value::Int(0)).unwrap();
    tree
}

fn rows(ids: &[i64]) -> Vec<ConfigRow> {
    ids.iter()
        .map(|&id| {
            let mut params = FlatSettings::new();
            params.insert("case-id".to_string(), Value::Int(id));
            ConfigRow::nominal(params)
        })
        .collect()
}

/// Echoes the case id; odd ids in `fail_odd` mode, and id 2 always, fail.
fn echo(fail_odd: bool) -> impl Fn(&SettingsTree) -> Result<SimulationOutput, SimulationError> + Sync {
    move |settings: &SettingsTree| {
        let id = settings
            .leaf(&["case", "id"])
            .and_then(Value::as_f64)
            .unwrap_or(-1.0);
        if id == 2.0 || (fail_odd && id as i64 % 2 != 0) {
            return Err(SimulationError::Failed(format!("case {} diverged", id)));
        }
        let mut global = GlobalData::new();
        global.insert(
            "id".to_string(),
            GlobalQuantity {
                value: id,
                units: "-".to_string(),
            },
        );
        Ok(SimulationOutput::single(global, LocalData::new()))
    }
}

#[test]
fn failing_row_does_not_stop_the_batch() {
    let codec = SettingsCodec::default();
    let batch = run_rows(
        &echo(false),
        &base(),
        &codec,
        rows(&[1, 2, 3]),
        &ExecutionOptions::default(),
        None,
    );

    assert_eq!(batch.table.len(), 3);
    let flags: Vec<bool> = batch.table.iter().map(|r| r.successful_run()).collect();
    assert_eq!(flags, vec![true, false, true]);
    assert!(!batch.all_successful);
    assert_eq!(batch.table.rows[1].failure(), Some("case 2 diverged"));
    assert!(batch.table.rows[1].global_data().is_none());
    assert_eq!(batch.table.rows[2].global_data().unwrap()["id"].value, 3.0);
}

#[test]
fn failed_rows_can_be_dropped() {
    let codec = SettingsCodec::default();
    let options = ExecutionOptions {
        return_unsuccessful: false,
        ..ExecutionOptions::default()
    };
    let batch = run_rows(&echo(false), &base(), &codec, rows(&[1, 2, 3]), &options, None);

    assert_eq!(batch.table.len(), 2);
    assert!(!batch.all_successful);
    let indices: Vec<usize> = batch.table.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1]);
}

#[test]
fn progress_callback_sees_every_row() {
    let codec = SettingsCodec::default();
    let mut seen = Vec::new();
    run_rows(
        &echo(false),
        &base(),
        &codec,
        rows(&[1, 3, 4]),
        &ExecutionOptions::default(),
        Some(&mut |done, total| seen.push((done, total))),
    );
    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
}

proptest! {
    #[test]
    fn parallel_run_preserves_row_order(ids in prop::collection::vec(0i64..50, 0..24)) {
        let codec = SettingsCodec::default();
        let sequential = run_rows(
            &echo(true), &base(), &codec, rows(&ids), &ExecutionOptions::default(), None,
        );
        let parallel = run_rows(
            &echo(true),
            &base(),
            &codec,
            rows(&ids),
            &ExecutionOptions { parallel: true, ..ExecutionOptions::default() },
            None,
        );
        prop_assert_eq!(&parallel.table, &sequential.table);
        prop_assert_eq!(parallel.all_successful, sequential.all_successful);
    }
}
