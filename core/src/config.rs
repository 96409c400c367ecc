use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How customers who have never transacted are labeled.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NeverTransactedPolicy {
    /// No transaction ever counts as inactive beyond the window.
    #[default]
    Churned,
    /// Leave the churn flag undefined; validation reports these separately.
    Excluded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Snapshot reference date driving recency and churn.
    pub as_of: NaiveDate,
    #[serde(default)]
    pub never_transacted: NeverTransactedPolicy,
}

impl PipelineConfig {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            never_transacted: NeverTransactedPolicy::default(),
        }
    }

    /// Load from a JSON config file.
    /// In tests, use PipelineConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self::new(NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid date"))
    }

    pub fn with_never_transacted(mut self, policy: NeverTransactedPolicy) -> Self {
        self.never_transacted = policy;
        self
    }
}
