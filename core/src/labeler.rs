//! Churn labeler: ground-truth churn flag from transaction recency.

use crate::{
    aggregator::CustomerSummary,
    config::{NeverTransactedPolicy, PipelineConfig},
    error::PipelineResult,
    stage::PipelineStage,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Days without a transaction after which a customer counts as churned.
pub const CHURN_INACTIVITY_DAYS: i64 = 90;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabeledSummary {
    pub summary:    CustomerSummary,
    /// None only under NeverTransactedPolicy::Excluded.
    pub churn_flag: Option<bool>,
}

/// Churn flag for one customer. Strictly more than the window churns.
pub fn churn_flag(
    last_txn_date: Option<NaiveDate>,
    as_of: NaiveDate,
    policy: NeverTransactedPolicy,
) -> Option<bool> {
    match last_txn_date {
        Some(last) => Some((as_of - last).num_days() > CHURN_INACTIVITY_DAYS),
        None => match policy {
            NeverTransactedPolicy::Churned  => Some(true),
            NeverTransactedPolicy::Excluded => None,
        },
    }
}

pub struct ChurnLabeler {
    as_of:  NaiveDate,
    policy: NeverTransactedPolicy,
}

impl ChurnLabeler {
    pub fn new(as_of: NaiveDate, policy: NeverTransactedPolicy) -> Self {
        Self { as_of, policy }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.as_of, config.never_transacted)
    }
}

impl PipelineStage for ChurnLabeler {
    type Input = [CustomerSummary];
    type Output = Vec<LabeledSummary>;

    fn name(&self) -> &'static str { "churn_labeler" }

    fn run(&self, input: &[CustomerSummary]) -> PipelineResult<Vec<LabeledSummary>> {
        Ok(input
            .iter()
            .map(|s| LabeledSummary {
                churn_flag: churn_flag(s.last_txn_date, self.as_of, self.policy),
                summary:    s.clone(),
            })
            .collect())
    }

    fn output_rows(&self, output: &Vec<LabeledSummary>) -> usize {
        output.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let as_of = date(2024, 12, 31);
        let policy = NeverTransactedPolicy::Churned;
        // 90 days before as_of: still active.
        assert_eq!(churn_flag(Some(date(2024, 10, 2)), as_of, policy), Some(false));
        // 91 days before as_of: churned.
        assert_eq!(churn_flag(Some(date(2024, 10, 1)), as_of, policy), Some(true));
    }

    #[test]
    fn future_dated_activity_is_not_churn() {
        let as_of = date(2024, 12, 31);
        let flag = churn_flag(Some(date(2025, 1, 15)), as_of, NeverTransactedPolicy::Churned);
        assert_eq!(flag, Some(false));
    }

    #[test]
    fn never_transacted_follows_policy() {
        let as_of = date(2024, 12, 31);
        assert_eq!(churn_flag(None, as_of, NeverTransactedPolicy::Churned), Some(true));
        assert_eq!(churn_flag(None, as_of, NeverTransactedPolicy::Excluded), None);
    }
}
