//! Raw snapshot entities: the pipeline's only input.
//!
//! A snapshot is the full state of customers, cards and transactions as of
//! one reference date. The pipeline never mutates it.

use crate::{
    error::{PipelineError, PipelineResult},
    types::CustomerId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub gender:      String,
    pub city:        String,
    pub age:         u32,
    pub income:      f64,
    pub signup_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub customer_id:     CustomerId,
    pub credit_limit:    Option<f64>,
    pub current_balance: Option<f64>,
    pub credit_score:    Option<i32>,
}

impl Card {
    /// current_balance / credit_limit, or None when the limit is zero or
    /// either figure is absent.
    pub fn utilization(&self) -> Option<f64> {
        match (self.current_balance, self.credit_limit) {
            (Some(balance), Some(limit)) if limit > 0.0 => Some(balance / limit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Channel {
    Online,
    Offline,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online  => "Online",
            Self::Offline => "Offline",
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Online"  => Ok(Self::Online),
            "Offline" => Ok(Self::Offline),
            other     => Err(format!("unknown channel '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub transaction_id:    String,
    pub customer_id:       CustomerId,
    pub transaction_date:  NaiveDate,
    pub amount:            f64,
    pub merchant_category: String,
    pub channel:           Channel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub customers:    Vec<Customer>,
    pub cards:        Vec<Card>,
    pub transactions: Vec<Transaction>,
}

impl Snapshot {
    pub fn new(customers: Vec<Customer>, cards: Vec<Card>, transactions: Vec<Transaction>) -> Self {
        Self { customers, cards, transactions }
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    /// Reject snapshots no downstream stage can work with.
    /// Orphan rows are not an error here; the aggregator drops them.
    pub fn validate(&self) -> PipelineResult<()> {
        let mut customer_ids = HashSet::with_capacity(self.customers.len());
        for c in &self.customers {
            if !customer_ids.insert(c.customer_id.as_str()) {
                return Err(PipelineError::DuplicateKey {
                    entity: "customer",
                    id:     c.customer_id.clone(),
                });
            }
            if !c.income.is_finite() {
                return Err(PipelineError::invalid("customer", &c.customer_id, "income is not finite"));
            }
        }

        for card in &self.cards {
            let figures = [card.credit_limit, card.current_balance];
            if figures.iter().flatten().any(|v| !v.is_finite()) {
                return Err(PipelineError::invalid("card", &card.customer_id, "card figure is not finite"));
            }
            if card.credit_limit.is_some_and(|l| l < 0.0) {
                return Err(PipelineError::invalid("card", &card.customer_id, "negative credit_limit"));
            }
        }

        let mut txn_ids = HashSet::with_capacity(self.transactions.len());
        for t in &self.transactions {
            if !txn_ids.insert(t.transaction_id.as_str()) {
                return Err(PipelineError::DuplicateKey {
                    entity: "transaction",
                    id:     t.transaction_id.clone(),
                });
            }
            if !t.amount.is_finite() {
                return Err(PipelineError::invalid("transaction", &t.transaction_id, "amount is not finite"));
            }
        }
        Ok(())
    }
}
