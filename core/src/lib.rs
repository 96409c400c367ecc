//! Churn-risk scoring pipeline over a customer/card/transaction snapshot.
//!
//! Six pure stages (see pipeline.rs for the fixed order) turn a raw snapshot
//! into per-customer risk segments and a calibration report. The store is the
//! only module that touches SQLite.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod event;
pub mod generator;
pub mod labeler;
pub mod pipeline;
pub mod ranker;
pub mod rng;
pub mod scorer;
pub mod segmenter;
pub mod snapshot;
pub mod stage;
pub mod store;
pub mod types;
pub mod validator;
