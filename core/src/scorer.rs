//! Risk scorer: fixed additive rules over the six percentile ranks.
//!
//! Rules are evaluated independently and summed. A rank in the unknown
//! bucket never fires its rule. The score depends on nothing but the ranks.

use crate::{
    error::PipelineResult,
    ranker::{Metric, MetricRanks, PercentileScore},
    stage::PipelineStage,
    types::{CustomerId, Percentile},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// Fires when rank < n.
    Below(Percentile),
    /// Fires when rank > n.
    Above(Percentile),
}

impl Threshold {
    pub fn fires(&self, rank: Percentile) -> bool {
        match *self {
            Self::Below(n) => rank < n,
            Self::Above(n) => rank > n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRule {
    pub metric:    Metric,
    pub threshold: Threshold,
    pub points:    u8,
}

/// The rule table. Hand-specified; never learned.
pub const RISK_RULES: [RiskRule; 6] = [
    RiskRule { metric: Metric::ActiveMonths,      threshold: Threshold::Below(25), points: 2 },
    RiskRule { metric: Metric::CategoryCount,     threshold: Threshold::Below(25), points: 2 },
    RiskRule { metric: Metric::CreditUtilization, threshold: Threshold::Above(75), points: 2 },
    RiskRule { metric: Metric::TotalSpend,        threshold: Threshold::Below(25), points: 1 },
    RiskRule { metric: Metric::CreditScore,       threshold: Threshold::Below(25), points: 1 },
    RiskRule { metric: Metric::AvgSpend,          threshold: Threshold::Below(25), points: 1 },
];

/// Upper bound of any score: the sum of all rule weights.
pub fn max_score() -> u8 {
    RISK_RULES.iter().map(|r| r.points).sum()
}

/// Points awarded per rule, in RISK_RULES order.
pub fn rule_points(ranks: &MetricRanks) -> [u8; 6] {
    let mut points = [0u8; 6];
    for (slot, rule) in points.iter_mut().zip(RISK_RULES.iter()) {
        if ranks.get(rule.metric).is_some_and(|r| rule.threshold.fires(r)) {
            *slot = rule.points;
        }
    }
    points
}

pub fn risk_score(ranks: &MetricRanks) -> u8 {
    rule_points(ranks).iter().sum()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredCustomer {
    pub customer_id: CustomerId,
    pub risk_score:  u8,
    /// Points each rule contributed, in RISK_RULES order.
    pub rule_points: [u8; 6],
}

impl ScoredCustomer {
    /// Metrics whose rule fired, for explaining a segment.
    pub fn fired_metrics(&self) -> Vec<Metric> {
        RISK_RULES
            .iter()
            .zip(self.rule_points.iter())
            .filter(|(_, &p)| p > 0)
            .map(|(rule, _)| rule.metric)
            .collect()
    }
}

pub struct RiskScorer;

impl PipelineStage for RiskScorer {
    type Input = [PercentileScore];
    type Output = Vec<ScoredCustomer>;

    fn name(&self) -> &'static str { "risk_scorer" }

    fn run(&self, input: &[PercentileScore]) -> PipelineResult<Vec<ScoredCustomer>> {
        Ok(input
            .iter()
            .map(|p| {
                let rule_points = rule_points(&p.ranks);
                ScoredCustomer {
                    customer_id: p.customer_id.clone(),
                    risk_score:  rule_points.iter().sum(),
                    rule_points,
                }
            })
            .collect())
    }

    fn output_rows(&self, output: &Vec<ScoredCustomer>) -> usize {
        output.len()
    }
}
