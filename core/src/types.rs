//! Shared primitive types used across the whole pipeline.

/// A stable, unique customer identifier (the Customer entity's key).
pub type CustomerId = String;

/// The canonical pipeline run identifier.
pub type RunId = String;

/// A population-relative percentile rank in [1, 100].
pub type Percentile = u8;
