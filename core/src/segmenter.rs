//! Segmenter: risk score to ordinal risk segment.

use crate::{
    error::PipelineResult,
    scorer::ScoredCustomer,
    stage::PipelineStage,
    types::CustomerId,
};
use serde::{Deserialize, Serialize};

pub const HIGH_RISK_MIN_SCORE: u8 = 6;
pub const MEDIUM_RISK_MIN_SCORE: u8 = 3;

/// Declaration order is risk order: Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskSegment {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskSegment {
    pub const ALL: [RiskSegment; 3] = [RiskSegment::Low, RiskSegment::Medium, RiskSegment::High];

    pub fn from_score(score: u8) -> Self {
        if score >= HIGH_RISK_MIN_SCORE {
            Self::High
        } else if score >= MEDIUM_RISK_MIN_SCORE {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low    => "Low Risk",
            Self::Medium => "Medium Risk",
            Self::High   => "High Risk",
        }
    }
}

impl std::str::FromStr for RiskSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low Risk"    => Ok(Self::Low),
            "Medium Risk" => Ok(Self::Medium),
            "High Risk"   => Ok(Self::High),
            other         => Err(format!("unknown risk segment '{other}'")),
        }
    }
}

impl std::fmt::Display for RiskSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssignment {
    pub customer_id: CustomerId,
    pub risk_score:  u8,
    pub rule_points: [u8; 6],
    pub segment:     RiskSegment,
}

pub struct Segmenter;

impl PipelineStage for Segmenter {
    type Input = [ScoredCustomer];
    type Output = Vec<RiskAssignment>;

    fn name(&self) -> &'static str { "segmenter" }

    fn run(&self, input: &[ScoredCustomer]) -> PipelineResult<Vec<RiskAssignment>> {
        Ok(input
            .iter()
            .map(|s| RiskAssignment {
                customer_id: s.customer_id.clone(),
                risk_score:  s.risk_score,
                rule_points: s.rule_points,
                segment:     RiskSegment::from_score(s.risk_score),
            })
            .collect())
    }

    fn output_rows(&self, output: &Vec<RiskAssignment>) -> usize {
        output.len()
    }
}
