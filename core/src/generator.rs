//! Seeded synthetic snapshot generator.
//!
//! Produces a plausible customer/card/transaction snapshot for demos and
//! determinism tests. The pipeline never depends on it. The same seed and
//! parameters always produce the same snapshot.
//!
//! Each customer draws an activity profile that shapes their history:
//!   engaged   steady monthly activity up to the as-of date
//!   drifting  sparse activity, tailing off 1..6 months before as-of
//!   dormant   activity that stopped more than 90 days before as-of
//!   never     signed up, never transacted

use crate::{
    rng::{EntityRng, StreamSlot},
    snapshot::{Card, Channel, Customer, Snapshot, Transaction},
};
use chrono::{Duration, NaiveDate};

const CATEGORIES: &[&str] = &[
    "grocery", "fuel", "dining", "travel", "electronics",
    "apparel", "utilities", "health", "entertainment", "home",
];

const CITIES: &[&str] = &[
    "Manchester", "Leeds", "Bristol", "Glasgow", "Cardiff", "Belfast", "Norwich", "York",
];

const CREDIT_LIMITS: &[f64] = &[1_000.0, 2_500.0, 5_000.0, 10_000.0, 20_000.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActivityProfile {
    Engaged,
    Drifting,
    Dormant,
    Never,
}

impl ActivityProfile {
    fn roll(rng: &mut EntityRng) -> Self {
        let roll = rng.unit();
        if roll < 0.60 {
            Self::Engaged
        } else if roll < 0.80 {
            Self::Drifting
        } else if roll < 0.93 {
            Self::Dormant
        } else {
            Self::Never
        }
    }

    /// Days-before-as-of window the customer's transactions fall in.
    fn window(&self, history_days: i64) -> Option<(i64, i64)> {
        match self {
            Self::Engaged  => Some((0, history_days)),
            Self::Drifting => Some((30, history_days.max(180))),
            Self::Dormant  => Some((91, history_days.max(91 + 120))),
            Self::Never    => None,
        }
    }

    fn monthly_txns(&self) -> f64 {
        match self {
            Self::Engaged  => 14.0,
            Self::Drifting => 3.0,
            Self::Dormant  => 5.0,
            Self::Never    => 0.0,
        }
    }

    fn category_breadth(&self, rng: &mut EntityRng) -> usize {
        let (lo, span) = match self {
            Self::Engaged => (4, 6),
            _             => (1, 3),
        };
        (lo + rng.pick(span)).min(CATEGORIES.len())
    }

    /// Extra utilization pressure for customers drifting away.
    fn utilization_bias(&self) -> f64 {
        match self {
            Self::Engaged  => 0.0,
            Self::Drifting => 0.25,
            Self::Dormant  => 0.35,
            Self::Never    => 0.10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticSnapshot {
    pub customers:    usize,
    pub as_of:        NaiveDate,
    /// How far back transaction history reaches.
    pub history_days: i64,
}

impl SyntheticSnapshot {
    pub fn new(customers: usize, as_of: NaiveDate) -> Self {
        Self {
            customers,
            as_of,
            history_days: 365,
        }
    }

    pub fn generate(&self, seed: u64) -> Snapshot {
        let mut customer_rng = EntityRng::for_stream(seed, StreamSlot::Customer);
        let mut card_rng = EntityRng::for_stream(seed, StreamSlot::Card);
        let mut txn_rng = EntityRng::for_stream(seed, StreamSlot::Transaction);

        let mut customers = Vec::with_capacity(self.customers);
        let mut cards = Vec::new();
        let mut transactions = Vec::new();

        for i in 0..self.customers {
            let customer_id = format!("c-{i:06}");
            let profile = ActivityProfile::roll(&mut customer_rng);

            customers.push(self.customer(&customer_id, &mut customer_rng));
            cards.extend(self.cards(&customer_id, profile, &mut card_rng));
            self.push_transactions(&customer_id, profile, &mut txn_rng, &mut transactions);
        }

        log::debug!(
            "generator: seed={seed} customers={} cards={} transactions={}",
            customers.len(),
            cards.len(),
            transactions.len(),
        );

        Snapshot::new(customers, cards, transactions)
    }

    fn customer(&self, customer_id: &str, rng: &mut EntityRng) -> Customer {
        let age = 18 + rng.below(62) as u32;
        let income = (rng.pareto(18_000.0, 2.2).min(400_000.0) / 100.0).round() * 100.0;
        let tenure_days = self.history_days + rng.below(6 * 365) as i64;
        Customer {
            customer_id: customer_id.to_string(),
            gender:      if rng.chance(0.5) { "F".into() } else { "M".into() },
            city:        CITIES[rng.pick(CITIES.len())].to_string(),
            age,
            income,
            signup_date: self.as_of - Duration::days(tenure_days),
        }
    }

    fn cards(&self, customer_id: &str, profile: ActivityProfile, rng: &mut EntityRng) -> Vec<Card> {
        let count = match rng.unit() {
            r if r < 0.12 => 0,
            r if r < 0.90 => 1,
            _             => 2,
        };

        (0..count)
            .map(|_| {
                let credit_limit = if rng.chance(0.03) {
                    0.0
                } else {
                    CREDIT_LIMITS[rng.pick(CREDIT_LIMITS.len())]
                };
                let utilization =
                    (rng.unit().powf(1.6) + profile.utilization_bias()).min(1.15);
                let reference_limit = if credit_limit > 0.0 { credit_limit } else { 1_000.0 };
                let current_balance = (reference_limit * utilization * 100.0).round() / 100.0;

                let credit_score = if rng.chance(0.02) {
                    None
                } else {
                    let base = 560 + rng.below(290) as i32;
                    Some((base - (utilization * 120.0) as i32).clamp(300, 850))
                };

                Card {
                    customer_id:     customer_id.to_string(),
                    credit_limit:    Some(credit_limit),
                    current_balance: Some(current_balance),
                    credit_score,
                }
            })
            .collect()
    }

    fn push_transactions(
        &self,
        customer_id: &str,
        profile: ActivityProfile,
        rng: &mut EntityRng,
        out: &mut Vec<Transaction>,
    ) {
        let Some((newest, oldest)) = profile.window(self.history_days) else {
            return;
        };

        let span_days = oldest - newest + 1;
        let expected = profile.monthly_txns() * span_days as f64 / 30.0;
        let count = (expected * (0.4 + rng.unit())).round().max(1.0) as usize;

        let breadth = profile.category_breadth(rng);
        let category_offset = rng.pick(CATEGORIES.len());
        let spend_floor = 5.0 + rng.unit() * 30.0;
        let online_share = rng.unit();

        for _ in 0..count {
            let days_ago = newest + rng.below(span_days as u64) as i64;
            let category = CATEGORIES[(category_offset + rng.pick(breadth)) % CATEGORIES.len()];
            let amount = (rng.pareto(spend_floor, 1.7).min(5_000.0) * 100.0).round() / 100.0;
            let channel = if rng.chance(online_share) {
                Channel::Online
            } else {
                Channel::Offline
            };

            out.push(Transaction {
                transaction_id:    format!("t-{:08}", out.len()),
                customer_id:       customer_id.to_string(),
                transaction_date:  self.as_of - Duration::days(days_ago),
                amount,
                merchant_category: category.to_string(),
                channel,
            });
        }
    }
}
