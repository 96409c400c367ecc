//! Calibration validator: observed churn rate per risk segment.
//!
//! This is the pipeline's feedback loop. A well-calibrated rule shows churn
//! rising from Low to High; the report says whether it does, it never
//! adjusts the rule.

use crate::{
    error::{PipelineError, PipelineResult},
    labeler::LabeledSummary,
    segmenter::{RiskAssignment, RiskSegment},
    stage::PipelineStage,
    types::CustomerId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One customer's predicted segment next to the observed label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub customer_id: CustomerId,
    pub segment:     RiskSegment,
    pub churn_flag:  Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRow {
    pub segment:         RiskSegment,
    /// Customers with a defined churn flag.
    pub customer_count:  u64,
    pub churned_count:   u64,
    /// Customers left unlabeled by the never-transacted policy.
    pub unlabeled_count: u64,
    /// None for a segment with no labeled customers.
    pub churn_rate:      Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Low, Medium, High; empty when the population is empty.
    pub rows: Vec<CalibrationRow>,
}

impl CalibrationReport {
    pub fn row(&self, segment: RiskSegment) -> Option<&CalibrationRow> {
        self.rows.iter().find(|r| r.segment == segment)
    }

    /// Adjacent (lower, higher) risk segment pairs, skipping empty segments,
    /// where the lower segment churns more than the higher one.
    pub fn inversions(&self) -> Vec<(&CalibrationRow, &CalibrationRow)> {
        let rated: Vec<(&CalibrationRow, f64)> = self
            .rows
            .iter()
            .filter_map(|r| r.churn_rate.map(|rate| (r, rate)))
            .collect();
        rated
            .windows(2)
            .filter(|w| w[0].1 > w[1].1)
            .map(|w| (w[0].0, w[1].0))
            .collect()
    }

    pub fn is_monotone(&self) -> bool {
        self.inversions().is_empty()
    }
}

/// 100 × churned / count, rounded half-up to 2 decimals. None when count is 0.
///
/// Rounds in integer basis points; f64 rounding misses exact .xx5 midpoints.
pub fn churn_rate(churned: u64, count: u64) -> Option<f64> {
    if count == 0 {
        return None;
    }
    let basis_points = (churned * 20_000 + count) / (2 * count);
    Some(basis_points as f64 / 100.0)
}

/// Pair each segmented customer with their churn label by customer_id.
pub fn join_labels(
    assignments: &[RiskAssignment],
    labeled: &[LabeledSummary],
) -> PipelineResult<Vec<CalibrationRecord>> {
    if assignments.len() != labeled.len() {
        return Err(PipelineError::StageMismatch {
            stage:  "calibration_validator",
            detail: format!(
                "{} segmented customers vs {} labeled customers",
                assignments.len(),
                labeled.len()
            ),
        });
    }

    let labels: HashMap<&str, Option<bool>> = labeled
        .iter()
        .map(|l| (l.summary.customer_id.as_str(), l.churn_flag))
        .collect();

    assignments
        .iter()
        .map(|a| {
            let churn_flag = *labels.get(a.customer_id.as_str()).ok_or_else(|| {
                PipelineError::StageMismatch {
                    stage:  "calibration_validator",
                    detail: format!("customer '{}' has a segment but no label", a.customer_id),
                }
            })?;
            Ok(CalibrationRecord {
                customer_id: a.customer_id.clone(),
                segment: a.segment,
                churn_flag,
            })
        })
        .collect()
}

pub fn calibrate(records: &[CalibrationRecord]) -> CalibrationReport {
    if records.is_empty() {
        return CalibrationReport::default();
    }

    let rows = RiskSegment::ALL
        .iter()
        .map(|&segment| {
            let members = records.iter().filter(|r| r.segment == segment);
            let (mut labeled, mut churned, mut unlabeled) = (0u64, 0u64, 0u64);
            for r in members {
                match r.churn_flag {
                    Some(true)  => { labeled += 1; churned += 1; }
                    Some(false) => labeled += 1,
                    None        => unlabeled += 1,
                }
            }
            CalibrationRow {
                segment,
                customer_count:  labeled,
                churned_count:   churned,
                unlabeled_count: unlabeled,
                churn_rate:      churn_rate(churned, labeled),
            }
        })
        .collect();

    CalibrationReport { rows }
}

pub struct CalibrationValidator;

impl PipelineStage for CalibrationValidator {
    type Input = [CalibrationRecord];
    type Output = CalibrationReport;

    fn name(&self) -> &'static str { "calibration_validator" }

    fn run(&self, input: &[CalibrationRecord]) -> PipelineResult<CalibrationReport> {
        let report = calibrate(input);
        for (lower, higher) in report.inversions() {
            log::warn!(
                "validator: {} churns at {:.2}% but {} only at {:.2}%",
                lower.segment,
                lower.churn_rate.unwrap_or_default(),
                higher.segment,
                higher.churn_rate.unwrap_or_default(),
            );
        }
        Ok(report)
    }

    fn output_rows(&self, output: &CalibrationReport) -> usize {
        output.rows.len()
    }
}
