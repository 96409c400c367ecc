//! The scoring pipeline runner.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Feature aggregator     snapshot           -> customer summaries
//!   2. Churn labeler          summaries          -> labeled summaries
//!   3. Percentile ranker      labeled summaries  -> percentile scores
//!   4. Risk scorer            percentile scores  -> risk scores
//!   5. Segmenter              risk scores        -> risk segments
//!   6. Calibration validator  segments + labels  -> calibration report
//!
//! RULES:
//!   - Each stage reads only the full output of the stage before it. The
//!     validator alone also reads the labeler's churn flags.
//!   - Stages are pure. Only the runner touches the store.
//!   - A run replaces every derived table wholesale; re-running over the
//!     same snapshot produces identical rows.

use crate::{
    aggregator::{FeatureAggregator, OrphanCounts},
    config::PipelineConfig,
    error::PipelineResult,
    event::{EventLogEntry, PipelineEvent},
    labeler::{ChurnLabeler, LabeledSummary},
    ranker::{PercentileRanker, PercentileScore},
    scorer::RiskScorer,
    segmenter::{RiskAssignment, RiskSegment, Segmenter},
    snapshot::Snapshot,
    stage::PipelineStage,
    store::ChurnStore,
    types::RunId,
    validator::{join_labels, CalibrationReport, CalibrationValidator},
};

/// Every stage's output from one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub orphans:     OrphanCounts,
    pub labeled:     Vec<LabeledSummary>,
    pub percentiles: Vec<PercentileScore>,
    pub assignments: Vec<RiskAssignment>,
    pub report:      CalibrationReport,
}

impl PipelineOutput {
    pub fn customer_count(&self) -> usize {
        self.labeled.len()
    }

    pub fn segment_count(&self, segment: RiskSegment) -> usize {
        self.assignments.iter().filter(|a| a.segment == segment).count()
    }
}

/// Events raised during a run, tagged with the stage that raised them.
#[derive(Default)]
struct StageLog {
    events: Vec<(&'static str, PipelineEvent)>,
}

impl StageLog {
    fn record(&mut self, stage: &'static str, event: PipelineEvent) {
        self.events.push((stage, event));
    }

    fn run<S: PipelineStage>(&mut self, stage: &S, input: &S::Input) -> PipelineResult<S::Output> {
        let output = stage.run(input)?;
        let rows = stage.output_rows(&output);
        log::info!("pipeline: {} completed ({rows} rows)", stage.name());
        self.record(
            stage.name(),
            PipelineEvent::StageCompleted {
                stage: stage.name().to_string(),
                rows,
            },
        );
        Ok(output)
    }
}

fn execute_stages(
    snapshot: &Snapshot,
    config: &PipelineConfig,
    stages: &mut StageLog,
) -> PipelineResult<PipelineOutput> {
    let aggregator = FeatureAggregator;
    let aggregation = stages.run(&aggregator, snapshot)?;
    let orphans = aggregation.orphans;
    for (entity, count) in [("card", orphans.cards), ("transaction", orphans.transactions)] {
        if count > 0 {
            stages.record(
                aggregator.name(),
                PipelineEvent::OrphanRowsDropped { entity: entity.to_string(), count },
            );
        }
    }

    let labeled = stages.run(&ChurnLabeler::from_config(config), aggregation.summaries.as_slice())?;
    let percentiles = stages.run(&PercentileRanker, labeled.as_slice())?;
    let scored = stages.run(&RiskScorer, percentiles.as_slice())?;
    let assignments = stages.run(&Segmenter, scored.as_slice())?;

    let validator = CalibrationValidator;
    let records = join_labels(&assignments, &labeled)?;
    let report = stages.run(&validator, records.as_slice())?;
    for (lower, higher) in report.inversions() {
        stages.record(
            validator.name(),
            PipelineEvent::CalibrationInverted {
                lower_segment:  lower.segment.as_str().to_string(),
                lower_rate:     lower.churn_rate.unwrap_or_default(),
                higher_segment: higher.segment.as_str().to_string(),
                higher_rate:    higher.churn_rate.unwrap_or_default(),
            },
        );
    }

    Ok(PipelineOutput {
        orphans,
        labeled,
        percentiles,
        assignments,
        report,
    })
}

/// Run all six stages in memory over `snapshot`. No store, no event log.
pub fn run_snapshot(snapshot: &Snapshot, config: &PipelineConfig) -> PipelineResult<PipelineOutput> {
    execute_stages(snapshot, config, &mut StageLog::default())
}

/// Runs the pipeline against a store: reads the raw snapshot, writes every
/// derived table, and keeps a per-run event log.
pub struct PipelineRunner {
    pub run_id: RunId,
    pub config: PipelineConfig,
    store:      ChurnStore,
}

impl PipelineRunner {
    pub fn new(run_id: RunId, config: PipelineConfig, store: ChurnStore) -> Self {
        Self { run_id, config, store }
    }

    pub fn store(&self) -> &ChurnStore {
        &self.store
    }

    pub fn into_store(self) -> ChurnStore {
        self.store
    }

    /// One full run. Events raised before a failure are still persisted.
    pub fn execute(&self) -> PipelineResult<PipelineOutput> {
        self.store
            .insert_run(&self.run_id, self.config.as_of, self.config.never_transacted)?;

        let mut stages = StageLog::default();
        stages.record(
            "pipeline",
            PipelineEvent::RunInitialized {
                run_id: self.run_id.clone(),
                as_of:  self.config.as_of,
            },
        );

        let result = self.execute_logged(&mut stages);
        self.flush_events(&stages)?;
        let output = result?;

        self.store.complete_run(
            &self.run_id,
            output.customer_count(),
            output.orphans.cards,
            output.orphans.transactions,
        )?;
        log::info!(
            "pipeline: run {} complete as of {} ({} customers, {} high risk)",
            self.run_id,
            self.config.as_of,
            output.customer_count(),
            output.segment_count(RiskSegment::High),
        );
        Ok(output)
    }

    fn execute_logged(&self, stages: &mut StageLog) -> PipelineResult<PipelineOutput> {
        let snapshot = self.store.load_snapshot()?;
        if snapshot.is_empty() {
            log::warn!("pipeline: run {} has no customers; derived tables will be empty", self.run_id);
        }
        let output = execute_stages(&snapshot, &self.config, stages)?;
        self.store.replace_derived(&output)?;
        stages.record(
            "pipeline",
            PipelineEvent::RunCompleted {
                customers: output.customer_count(),
                high_risk: output.segment_count(RiskSegment::High),
            },
        );
        Ok(output)
    }

    fn flush_events(&self, stages: &StageLog) -> PipelineResult<()> {
        for (seq, (stage, event)) in stages.events.iter().enumerate() {
            let entry = EventLogEntry {
                id:         None,
                run_id:     self.run_id.clone(),
                seq:        seq as u32,
                stage:      stage.to_string(),
                event_type: event.type_name().to_string(),
                payload:    serde_json::to_string(event)?,
            };
            self.store.append_event(&entry)?;
        }
        Ok(())
    }
}
