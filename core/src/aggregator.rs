//! Feature aggregator: rolls raw rows up into one summary per customer.
//!
//! Left-join semantics: every customer in the snapshot gets exactly one
//! summary, whether or not they have transactions or cards. Rows pointing at
//! unknown customers are dropped and counted, never fatal.
//!
//! Card policy: with several cards the summary keeps the maximum credit
//! score and the maximum utilization ratio, so the score leans toward the
//! customer's worst-case card.

use crate::{
    error::PipelineResult,
    snapshot::{Card, Snapshot, Transaction},
    stage::PipelineStage,
    types::CustomerId,
};
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerSummary {
    pub customer_id:       CustomerId,
    /// Distinct (year, month) pairs with at least one transaction.
    pub active_months:     u32,
    pub txn_count:         u32,
    pub total_spend:       f64,
    /// None when the customer has no transactions.
    pub avg_spend_per_txn: Option<f64>,
    pub category_count:    u32,
    pub last_txn_date:     Option<NaiveDate>,
    pub credit_score:      Option<i32>,
    /// None when no card has a positive limit and a balance.
    pub credit_util_ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrphanCounts {
    pub cards:        usize,
    pub transactions: usize,
}

impl OrphanCounts {
    pub fn total(&self) -> usize {
        self.cards + self.transactions
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// In snapshot customer order.
    pub summaries: Vec<CustomerSummary>,
    pub orphans:   OrphanCounts,
}

pub struct FeatureAggregator;

impl PipelineStage for FeatureAggregator {
    type Input = Snapshot;
    type Output = Aggregation;

    fn name(&self) -> &'static str { "feature_aggregator" }

    fn run(&self, input: &Snapshot) -> PipelineResult<Aggregation> {
        aggregate(input)
    }

    fn output_rows(&self, output: &Aggregation) -> usize {
        output.summaries.len()
    }
}

/// Validate the snapshot, then build one summary per customer.
pub fn aggregate(snapshot: &Snapshot) -> PipelineResult<Aggregation> {
    snapshot.validate()?;

    let known: HashSet<&str> = snapshot
        .customers
        .iter()
        .map(|c| c.customer_id.as_str())
        .collect();

    let mut orphans = OrphanCounts::default();

    let mut txns_by_customer: HashMap<&str, Vec<&Transaction>> = HashMap::new();
    for t in &snapshot.transactions {
        if known.contains(t.customer_id.as_str()) {
            txns_by_customer.entry(t.customer_id.as_str()).or_default().push(t);
        } else {
            orphans.transactions += 1;
        }
    }

    let mut cards_by_customer: HashMap<&str, Vec<&Card>> = HashMap::new();
    for card in &snapshot.cards {
        if known.contains(card.customer_id.as_str()) {
            cards_by_customer.entry(card.customer_id.as_str()).or_default().push(card);
        } else {
            orphans.cards += 1;
        }
    }

    if orphans.total() > 0 {
        log::warn!(
            "aggregator: dropped {} orphan card(s) and {} orphan transaction(s)",
            orphans.cards, orphans.transactions,
        );
    }

    let summaries = snapshot
        .customers
        .par_iter()
        .map(|c| {
            let id = c.customer_id.as_str();
            summarize(
                id,
                txns_by_customer.get(id).map(Vec::as_slice).unwrap_or(&[]),
                cards_by_customer.get(id).map(Vec::as_slice).unwrap_or(&[]),
            )
        })
        .collect();

    Ok(Aggregation { summaries, orphans })
}

fn summarize(customer_id: &str, txns: &[&Transaction], cards: &[&Card]) -> CustomerSummary {
    let months: BTreeSet<(i32, u32)> = txns
        .iter()
        .map(|t| (t.transaction_date.year(), t.transaction_date.month()))
        .collect();
    let categories: HashSet<&str> = txns.iter().map(|t| t.merchant_category.as_str()).collect();

    let txn_count = txns.len() as u32;
    let total_spend = txns.iter().fold(0.0, |acc, t| acc + t.amount);
    let avg_spend_per_txn = (txn_count > 0).then(|| total_spend / txn_count as f64);

    let credit_score = cards.iter().filter_map(|c| c.credit_score).max();
    let credit_util_ratio = cards
        .iter()
        .filter_map(|c| c.utilization())
        .fold(None, |worst: Option<f64>, u| Some(worst.map_or(u, |w| w.max(u))));

    CustomerSummary {
        customer_id: customer_id.to_string(),
        active_months: months.len() as u32,
        txn_count,
        total_spend,
        avg_spend_per_txn,
        category_count: categories.len() as u32,
        last_txn_date: txns.iter().map(|t| t.transaction_date).max(),
        credit_score,
        credit_util_ratio,
    }
}
