use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado do ciclo de vida de um job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Success,
    Failure,
}

impl JobStatus {
    /// SUCCESS e FAILURE não aceitam novas transições.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Processing => write!(f, "PROCESSING"),
            JobStatus::Success => write!(f, "SUCCESS"),
            JobStatus::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Deliverable recorded on SUCCESS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub final_track_url: Option<String>,
}

/// Which stage failed and why. Only present on FAILURE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub stage: String,
    pub message: String,
}

/// Um pedido ponta a ponta acompanhado pelo store de status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub result: Option<JobResult>,
    pub current_step: Option<String>,
    pub error: Option<ErrorRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A fresh opaque job id (random v4 UUID).
pub fn generate_job_id() -> String {
    Uuid::new_v4().to_string()
}

impl Job {
    /// A PENDING record for `id`.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            result: None,
            current_step: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields merged into an existing record by `JobStore::update`.
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub result: Option<JobResult>,
    pub current_step: Option<String>,
    pub error: Option<ErrorRecord>,
}

impl JobUpdate {
    pub fn processing(step: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Processing,
            result: None,
            current_step: Some(step.into()),
            error: None,
        }
    }

    pub fn success(final_track_url: String) -> Self {
        Self {
            status: JobStatus::Success,
            result: Some(JobResult {
                final_track_url: Some(final_track_url),
            }),
            current_step: None,
            error: None,
        }
    }

    pub fn failure(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failure,
            result: None,
            current_step: None,
            error: Some(ErrorRecord {
                stage: stage.into(),
                message: message.into(),
            }),
        }
    }
}
