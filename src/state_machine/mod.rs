mod job;
mod state;

pub use job::{ErrorRecord, Job, JobResult, JobStatus, JobUpdate, generate_job_id};
pub use state::StateMachine;
