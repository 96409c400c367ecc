//! Population-relative percentile ranking.

use chrono::NaiveDate;
use churnrisk_core::{
    aggregator::CustomerSummary,
    labeler::LabeledSummary,
    ranker::{rank_population, Metric},
};

fn summary(id: usize, spend: f64, util: Option<f64>) -> LabeledSummary {
    LabeledSummary {
        summary: CustomerSummary {
            customer_id:       format!("c-{id:06}"),
            active_months:     (id % 12) as u32 + 1,
            txn_count:         (id % 30) as u32 + 1,
            total_spend:       spend,
            avg_spend_per_txn: Some(spend / ((id % 30) as f64 + 1.0)),
            category_count:    (id % 7) as u32 + 1,
            last_txn_date:     NaiveDate::from_ymd_opt(2024, 12, 1),
            credit_score:      Some(550 + (id % 250) as i32),
            credit_util_ratio: util,
        },
        churn_flag: Some(false),
    }
}

fn population(n: usize) -> Vec<LabeledSummary> {
    (0..n)
        .map(|i| summary(i, ((i * 7919) % 1000) as f64 * 3.5, Some((i % 97) as f64 / 100.0)))
        .collect()
}

#[test]
fn empty_population_ranks_to_nothing() {
    assert!(rank_population(&[]).is_empty());
}

#[test]
fn every_customer_gets_exactly_one_score_row() {
    let pop = population(321);
    let scores = rank_population(&pop);
    assert_eq!(scores.len(), pop.len());
    for (l, p) in pop.iter().zip(&scores) {
        assert_eq!(l.summary.customer_id, p.customer_id);
    }
}

#[test]
fn ranks_are_monotone_in_raw_value_for_every_metric() {
    let pop = population(500);
    let scores = rank_population(&pop);

    for metric in Metric::ALL {
        for (a_sum, a) in pop.iter().zip(&scores) {
            for (b_sum, b) in pop.iter().zip(&scores).step_by(17) {
                let (Some(va), Some(vb)) = (metric.value(&a_sum.summary), metric.value(&b_sum.summary)) else {
                    continue;
                };
                if va < vb {
                    assert!(
                        a.ranks.get(metric) <= b.ranks.get(metric),
                        "{}: {va} ranked above {vb}",
                        metric.column()
                    );
                }
            }
        }
    }
}

#[test]
fn ranks_span_one_to_hundred_for_large_populations() {
    let scores = rank_population(&population(1000));
    let spend: Vec<u8> = scores.iter().filter_map(|s| s.ranks.pct_total_spend).collect();
    assert_eq!(spend.iter().min(), Some(&1));
    assert_eq!(spend.iter().max(), Some(&100));
    for bucket in 1..=100u8 {
        assert_eq!(spend.iter().filter(|&&r| r == bucket).count(), 10);
    }
}

#[test]
fn small_population_ranks_one_through_n() {
    let pop: Vec<LabeledSummary> = (0..5).map(|i| summary(i, 100.0 * i as f64, None)).collect();
    let scores = rank_population(&pop);
    let spend: Vec<Option<u8>> = scores.iter().map(|s| s.ranks.pct_total_spend).collect();
    assert_eq!(spend, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
}

#[test]
fn null_metric_lands_in_unknown_bucket_without_shifting_others() {
    let with_values = population(150);
    let baseline = rank_population(&with_values);

    let mut with_nulls = with_values.clone();
    for extra in 0..40 {
        with_nulls.push(summary(10_000 + extra, 50.0, None));
    }
    let ranked = rank_population(&with_nulls);

    for (before, after) in baseline.iter().zip(&ranked) {
        assert_eq!(before.ranks.pct_utilization, after.ranks.pct_utilization);
    }
    assert!(ranked[150..].iter().all(|s| s.ranks.pct_utilization.is_none()));
}
