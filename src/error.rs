use thiserror::Error;

use crate::state_machine::JobStatus;

#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already exists: {0}")]
    JobExists(String),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A failure that aborts the chain: retries exhausted or a structural failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stage {stage} failed: {message}")]
pub struct FatalStageError {
    pub stage: String,
    pub message: String,
}
