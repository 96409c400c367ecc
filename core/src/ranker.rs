//! Percentile ranker: population-relative ranks for the six scored metrics.
//!
//! Ranking is the only stage that needs the whole population at once. Each
//! metric gets its own global sort, partitioned into 100 contiguous buckets
//! with NTILE semantics:
//!   - N rows over 100 buckets: every bucket holds N / 100 rows and the
//!     first N % 100 buckets hold one more.
//!   - N < 100 therefore yields ranks 1..=N.
//!   - Rank 1 holds the lowest raw value, rank 100 the highest.
//!   - Equal values keep their input order (stable sort).
//!
//! NULL POLICY: a customer whose metric is null sits in the reserved unknown
//! bucket (None) for that metric and is left out of that metric's sort. The
//! customer still gets a PercentileScore row, and every other customer's
//! rank is independent of how many nulls the population holds.

use crate::{
    aggregator::CustomerSummary,
    error::PipelineResult,
    labeler::LabeledSummary,
    stage::PipelineStage,
    types::{CustomerId, Percentile},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const PERCENTILE_BUCKETS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ActiveMonths,
    CategoryCount,
    CreditUtilization,
    TotalSpend,
    CreditScore,
    AvgSpend,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::ActiveMonths,
        Metric::CategoryCount,
        Metric::CreditUtilization,
        Metric::TotalSpend,
        Metric::CreditScore,
        Metric::AvgSpend,
    ];

    /// Column name in the percentile_score table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::ActiveMonths      => "pct_active_months",
            Self::CategoryCount     => "pct_category_count",
            Self::CreditUtilization => "pct_utilization",
            Self::TotalSpend        => "pct_total_spend",
            Self::CreditScore       => "pct_credit_score",
            Self::AvgSpend          => "pct_avg_spend",
        }
    }

    /// The raw value this metric ranks on.
    pub fn value(&self, s: &CustomerSummary) -> Option<f64> {
        match self {
            Self::ActiveMonths      => Some(s.active_months as f64),
            Self::CategoryCount     => Some(s.category_count as f64),
            Self::CreditUtilization => s.credit_util_ratio,
            Self::TotalSpend        => Some(s.total_spend),
            Self::CreditScore       => s.credit_score.map(f64::from),
            Self::AvgSpend          => s.avg_spend_per_txn,
        }
    }
}

/// The six ranks for one customer. None is the reserved unknown bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRanks {
    pub pct_active_months:  Option<Percentile>,
    pub pct_category_count: Option<Percentile>,
    pub pct_utilization:    Option<Percentile>,
    pub pct_total_spend:    Option<Percentile>,
    pub pct_credit_score:   Option<Percentile>,
    pub pct_avg_spend:      Option<Percentile>,
}

impl MetricRanks {
    pub fn get(&self, metric: Metric) -> Option<Percentile> {
        match metric {
            Metric::ActiveMonths      => self.pct_active_months,
            Metric::CategoryCount     => self.pct_category_count,
            Metric::CreditUtilization => self.pct_utilization,
            Metric::TotalSpend        => self.pct_total_spend,
            Metric::CreditScore       => self.pct_credit_score,
            Metric::AvgSpend          => self.pct_avg_spend,
        }
    }

    pub fn set(&mut self, metric: Metric, rank: Option<Percentile>) {
        let slot = match metric {
            Metric::ActiveMonths      => &mut self.pct_active_months,
            Metric::CategoryCount     => &mut self.pct_category_count,
            Metric::CreditUtilization => &mut self.pct_utilization,
            Metric::TotalSpend        => &mut self.pct_total_spend,
            Metric::CreditScore       => &mut self.pct_credit_score,
            Metric::AvgSpend          => &mut self.pct_avg_spend,
        };
        *slot = rank;
    }

    /// All six ranks known and equal to `rank`.
    pub fn uniform(rank: Percentile) -> Self {
        let mut ranks = Self::default();
        for m in Metric::ALL {
            ranks.set(m, Some(rank));
        }
        ranks
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileScore {
    pub customer_id: CustomerId,
    pub ranks:       MetricRanks,
}

/// 1-based NTILE bucket for the row at `position` of `n` sorted rows.
/// Requires position < n.
pub fn ntile(position: usize, n: usize, buckets: usize) -> Percentile {
    debug_assert!(position < n, "position {position} out of range for {n} rows");
    let base = n / buckets;
    let extra = n % buckets;
    // Rows held by the first `extra` buckets, each one row larger.
    let large_rows = extra * (base + 1);
    let bucket = if position < large_rows {
        position / (base + 1)
    } else {
        extra + (position - large_rows) / base
    };
    (bucket + 1) as Percentile
}

/// Rank one metric column. Output is aligned with `values`.
pub fn rank_values(values: &[Option<f64>]) -> Vec<Option<Percentile>> {
    let mut known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    known.sort_by(|a, b| a.1.total_cmp(&b.1));

    let n = known.len();
    let mut ranks = vec![None; values.len()];
    for (position, (index, _)) in known.iter().enumerate() {
        ranks[*index] = Some(ntile(position, n, PERCENTILE_BUCKETS));
    }
    ranks
}

/// Rank the whole population on all six metrics. One atomic operation:
/// the per-metric sorts run in parallel, then merge per customer.
pub fn rank_population(population: &[LabeledSummary]) -> Vec<PercentileScore> {
    if population.is_empty() {
        return Vec::new();
    }

    let columns: Vec<(Metric, Vec<Option<Percentile>>)> = Metric::ALL
        .par_iter()
        .map(|&metric| {
            let values: Vec<Option<f64>> = population
                .iter()
                .map(|l| metric.value(&l.summary))
                .collect();
            let unknown = values.iter().filter(|v| v.is_none()).count();
            log::debug!(
                "ranker: {} ranked={} unknown={unknown}",
                metric.column(),
                values.len() - unknown,
            );
            (metric, rank_values(&values))
        })
        .collect();

    population
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let mut ranks = MetricRanks::default();
            for (metric, column) in &columns {
                ranks.set(*metric, column[i]);
            }
            PercentileScore {
                customer_id: l.summary.customer_id.clone(),
                ranks,
            }
        })
        .collect()
}

pub struct PercentileRanker;

impl PipelineStage for PercentileRanker {
    type Input = [LabeledSummary];
    type Output = Vec<PercentileScore>;

    fn name(&self) -> &'static str { "percentile_ranker" }

    fn run(&self, input: &[LabeledSummary]) -> PipelineResult<Vec<PercentileScore>> {
        Ok(rank_population(input))
    }

    fn output_rows(&self, output: &Vec<PercentileScore>) -> usize {
        output.len()
    }
}
