use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid {entity} row '{id}': {reason}")]
    InvalidInput {
        entity: &'static str,
        id:     String,
        reason: String,
    },

    #[error("Duplicate {entity} key '{id}'")]
    DuplicateKey { entity: &'static str, id: String },

    #[error("Stage '{stage}' input mismatch: {detail}")]
    StageMismatch { stage: &'static str, detail: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn invalid(entity: &'static str, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            entity,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
