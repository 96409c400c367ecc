//! Store round trips, input errors and the per-run event log.

use chrono::NaiveDate;
use churnrisk_core::{
    config::PipelineConfig,
    error::PipelineError,
    event::PipelineEvent,
    generator::SyntheticSnapshot,
    pipeline::PipelineRunner,
    segmenter::RiskSegment,
    snapshot::{Card, Channel, Customer, Snapshot, Transaction},
    store::ChurnStore,
};
use rusqlite::{Connection, OpenFlags};

fn shared_memory(name: &str) -> String {
    format!("file:{name}?mode=memory&cache=shared")
}

/// A migrated store plus a raw connection onto the same database, for
/// writing rows the typed API refuses to produce.
fn store_with_raw(name: &str) -> (ChurnStore, Connection) {
    let uri = shared_memory(name);
    let store = ChurnStore::open(&uri).expect("open store");
    store.migrate().expect("migration");
    let raw = Connection::open_with_flags(
        &uri,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI,
    )
    .expect("raw connection");
    (store, raw)
}

fn migrated() -> ChurnStore {
    let store = ChurnStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn small_snapshot() -> Snapshot {
    Snapshot::new(
        vec![
            Customer {
                customer_id: "c1".into(),
                gender:      "F".into(),
                city:        "Bristol".into(),
                age:         29,
                income:      38_500.0,
                signup_date: date(2022, 3, 14),
            },
            Customer {
                customer_id: "c2".into(),
                gender:      "M".into(),
                city:        "Leeds".into(),
                age:         61,
                income:      72_000.0,
                signup_date: date(2019, 8, 2),
            },
        ],
        vec![Card {
            customer_id:     "c1".into(),
            credit_limit:    Some(2_500.0),
            current_balance: None,
            credit_score:    Some(702),
        }],
        vec![Transaction {
            transaction_id:    "t1".into(),
            customer_id:       "c1".into(),
            transaction_date:  date(2024, 12, 2),
            amount:            19.99,
            merchant_category: "dining".into(),
            channel:           Channel::Online,
        }],
    )
}

#[test]
fn migrate_is_idempotent() {
    let store = migrated();
    store.migrate().unwrap();
    assert_eq!(store.customer_count().unwrap(), 0);
}

#[test]
fn snapshot_round_trips_through_the_store() {
    let store = migrated();
    let snapshot = small_snapshot();
    store.replace_snapshot(&snapshot).unwrap();
    assert_eq!(store.load_snapshot().unwrap(), snapshot);

    // Replacing again swaps rather than appends.
    store.replace_snapshot(&snapshot).unwrap();
    assert_eq!(store.customer_count().unwrap(), 2);
}

#[test]
fn malformed_date_aborts_the_load() {
    let (store, raw) = store_with_raw("store_malformed_date");
    raw.execute(
        "INSERT INTO customer VALUES ('c1', 'F', 'York', 30, 1000.0, '14/03/2022')",
        [],
    )
    .unwrap();

    let err = store.load_snapshot().unwrap_err();
    assert!(
        matches!(err, PipelineError::InvalidInput { entity: "customer", .. }),
        "got: {err}"
    );
}

#[test]
fn non_numeric_amount_aborts_the_load() {
    let (store, raw) = store_with_raw("store_non_numeric_amount");
    raw.execute_batch(
        "INSERT INTO customer VALUES ('c1', 'F', 'York', 30, 1000.0, '2022-03-14');
         INSERT INTO transactions VALUES ('t1', 'c1', '2024-12-01', 'twelve', 'fuel', 'Online');",
    )
    .unwrap();

    let err = store.load_snapshot().unwrap_err();
    match err {
        PipelineError::InvalidInput { entity, id, reason } => {
            assert_eq!(entity, "transaction");
            assert_eq!(id, "t1");
            assert!(reason.contains("amount"), "reason: {reason}");
        }
        other => panic!("expected InvalidInput, got {other}"),
    }
}

#[test]
fn unknown_channel_aborts_the_load() {
    let (store, raw) = store_with_raw("store_unknown_channel");
    raw.execute_batch(
        "INSERT INTO customer VALUES ('c1', 'F', 'York', 30, 1000.0, '2022-03-14');
         INSERT INTO transactions VALUES ('t1', 'c1', '2024-12-01', 12.5, 'fuel', 'Phone');",
    )
    .unwrap();
    assert!(matches!(
        store.load_snapshot(),
        Err(PipelineError::InvalidInput { entity: "transaction", .. })
    ));
}

#[test]
fn run_writes_every_derived_table() {
    let config = PipelineConfig::default_test();
    let store = migrated();
    store
        .replace_snapshot(&SyntheticSnapshot::new(250, config.as_of).generate(99))
        .unwrap();

    let runner = PipelineRunner::new("run-derived".into(), config, store);
    let output = runner.execute().unwrap();
    let store = runner.store();

    assert_eq!(store.load_labeled_summaries().unwrap().len(), 250);
    assert_eq!(store.load_percentile_scores().unwrap().len(), 250);
    assert_eq!(store.load_risk_assignments().unwrap().len(), 250);
    assert_eq!(store.load_calibration_report().unwrap(), output.report);

    let high = store.segment_count(RiskSegment::High).unwrap();
    assert_eq!(high as usize, output.segment_count(RiskSegment::High));
    assert_eq!(store.run_completed("run-derived").unwrap(), Some(true));
}

#[test]
fn derived_rows_read_back_as_written() {
    let config = PipelineConfig::default_test();
    let store = migrated();
    store.replace_snapshot(&small_snapshot()).unwrap();

    let runner = PipelineRunner::new("run-readback".into(), config, store);
    let output = runner.execute().unwrap();
    let store = runner.store();

    assert_eq!(store.load_labeled_summaries().unwrap(), output.labeled);
    assert_eq!(store.load_percentile_scores().unwrap(), output.percentiles);
    assert_eq!(store.load_risk_assignments().unwrap(), output.assignments);
}

#[test]
fn event_log_records_stages_in_order() {
    let config = PipelineConfig::default_test();
    let store = migrated();
    let mut snapshot = small_snapshot();
    snapshot.transactions.push(Transaction {
        transaction_id:    "t-orphan".into(),
        customer_id:       "ghost".into(),
        transaction_date:  date(2024, 11, 30),
        amount:            5.0,
        merchant_category: "fuel".into(),
        channel:           Channel::Offline,
    });
    store.replace_snapshot(&snapshot).unwrap();

    let runner = PipelineRunner::new("run-events".into(), config, store);
    runner.execute().unwrap();

    let events = runner.store().events_for_run("run-events").unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types.first(), Some(&"run_initialized"));
    assert_eq!(types.last(), Some(&"run_completed"));
    assert_eq!(types.iter().filter(|t| **t == "stage_completed").count(), 6);
    assert!(types.contains(&"orphan_rows_dropped"));

    let seqs: Vec<u32> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, (0..events.len() as u32).collect::<Vec<_>>());

    let orphan = events
        .iter()
        .find(|e| e.event_type == "orphan_rows_dropped")
        .unwrap();
    let payload: PipelineEvent = serde_json::from_str(&orphan.payload).unwrap();
    assert_eq!(
        payload,
        PipelineEvent::OrphanRowsDropped { entity: "transaction".into(), count: 1 }
    );
}

#[test]
fn failed_run_still_keeps_its_events() {
    let (store, raw) = store_with_raw("store_failed_run");
    raw.execute(
        "INSERT INTO customer VALUES ('c1', 'F', 'York', 'thirty', 1000.0, '2022-03-14')",
        [],
    )
    .unwrap();

    let runner = PipelineRunner::new("run-failed".into(), PipelineConfig::default_test(), store);
    assert!(runner.execute().is_err());

    let store = runner.store();
    assert_eq!(store.run_completed("run-failed").unwrap(), Some(false));
    let events = store.events_for_run("run-failed").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "run_initialized");
}

#[test]
fn empty_snapshot_runs_to_an_empty_report() {
    let store = migrated();
    assert!(store.load_snapshot().unwrap().is_empty());
    let runner = PipelineRunner::new("run-empty".into(), PipelineConfig::default_test(), store);
    let output = runner.execute().unwrap();
    assert_eq!(output.customer_count(), 0);
    assert!(output.report.rows.is_empty());
    assert!(runner.store().load_calibration_report().unwrap().rows.is_empty());
}
