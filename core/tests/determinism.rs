//! Re-running the pipeline over an unchanged snapshot must reproduce every
//! derived row exactly. Any divergence is a blocker.

use churnrisk_core::{
    config::PipelineConfig,
    generator::SyntheticSnapshot,
    pipeline::{run_snapshot, PipelineRunner},
    store::ChurnStore,
};

const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;

fn seeded_store(customers: usize) -> ChurnStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = PipelineConfig::default_test();
    let store = ChurnStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
        .replace_snapshot(&SyntheticSnapshot::new(customers, config.as_of).generate(SEED))
        .expect("load snapshot");
    store
}

#[test]
fn same_snapshot_produces_identical_derived_tables() {
    let config = PipelineConfig::default_test();
    let first = PipelineRunner::new("det-a".into(), config.clone(), seeded_store(600));
    let out_a = first.execute().expect("first run");
    let summaries_a = first.store().load_labeled_summaries().unwrap();
    let percentiles_a = first.store().load_percentile_scores().unwrap();
    let risk_a = first.store().load_risk_assignments().unwrap();
    let report_a = first.store().load_calibration_report().unwrap();

    // Second run on the same store replaces the derived tables wholesale.
    let second = PipelineRunner::new("det-b".into(), config, first.into_store());
    let out_b = second.execute().expect("second run");
    let store = second.store();

    assert_eq!(out_a, out_b);
    assert_eq!(summaries_a, store.load_labeled_summaries().unwrap());
    assert_eq!(percentiles_a, store.load_percentile_scores().unwrap());
    assert_eq!(risk_a, store.load_risk_assignments().unwrap());
    assert_eq!(report_a, store.load_calibration_report().unwrap());
}

#[test]
fn event_payloads_match_apart_from_the_run_id() {
    let config = PipelineConfig::default_test();
    let a = PipelineRunner::new("det-events".into(), config.clone(), seeded_store(300));
    let b = PipelineRunner::new("det-events".into(), config, seeded_store(300));
    a.execute().unwrap();
    b.execute().unwrap();

    let log_a: Vec<String> = a
        .store()
        .events_for_run("det-events")
        .unwrap()
        .into_iter()
        .map(|e| e.payload)
        .collect();
    let log_b: Vec<String> = b
        .store()
        .events_for_run("det-events")
        .unwrap()
        .into_iter()
        .map(|e| e.payload)
        .collect();

    assert_eq!(log_a.len(), log_b.len());
    for (i, (x, y)) in log_a.iter().zip(&log_b).enumerate() {
        assert_eq!(x, y, "event log diverged at entry {i}");
    }
}

#[test]
fn in_memory_run_matches_stored_run() {
    let config = PipelineConfig::default_test();
    let snapshot = SyntheticSnapshot::new(200, config.as_of).generate(SEED);
    let in_memory = run_snapshot(&snapshot, &config).unwrap();

    let store = ChurnStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.replace_snapshot(&snapshot).unwrap();
    let stored = PipelineRunner::new("det-mem".into(), config, store).execute().unwrap();

    assert_eq!(in_memory.assignments, stored.assignments);
    assert_eq!(in_memory.report, stored.report);
}
