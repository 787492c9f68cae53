use chrono::Utc;

use super::job::{Job, JobStatus, JobUpdate};
use crate::error::ConductorError;

/// Guards every write to a job record.
///
/// Jobs flow: PENDING → PROCESSING(step₁) → … → PROCESSING(stepₙ) → SUCCESS | FAILURE
pub struct StateMachine;

impl StateMachine {
    /// Whether a record in `from` may be moved to `to`.
    ///
    /// - Terminal states accept nothing.
    /// - Nothing moves back to PENDING; that status is only assigned on creation.
    /// - PROCESSING → PROCESSING is how the runner advances `current_step`.
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        if from.is_terminal() {
            return false;
        }
        !matches!(to, JobStatus::Pending)
    }

    /// Merge `update` into `job`, rejecting illegal transitions without touching the record.
    pub fn apply(job: &mut Job, update: JobUpdate) -> Result<(), ConductorError> {
        if !Self::can_transition(job.status, update.status) {
            return Err(ConductorError::InvalidTransition {
                job_id: job.id.clone(),
                from: job.status,
                to: update.status,
            });
        }

        job.status = update.status;
        if let Some(result) = update.result {
            job.result = Some(result);
        }
        if let Some(step) = update.current_step {
            job.current_step = Some(step);
        }
        if let Some(error) = update.error {
            job.error = Some(error);
        }
        job.updated_at = Utc::now();
        Ok(())
    }
}
