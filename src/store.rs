//! Job status storage trait and the in-memory backend.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::ConductorError;
use crate::state_machine::{Job, JobUpdate, StateMachine};

/// Keyed record of job id → status. The runner writes, the status API reads.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new PENDING record. Fails if `id` already exists.
    async fn create(&self, id: &str) -> Result<Job, ConductorError>;

    /// Merge `update` into the record for `id`, returning the new snapshot.
    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, ConductorError>;

    /// Snapshot copy of the record for `id`.
    async fn get(&self, id: &str) -> Result<Job, ConductorError>;
}

/// Process-wide table. Records are kept for the life of the process.
///
/// Sharded, so writers and readers of different ids never contend for the same
/// lock; a write to one id excludes readers of that id until it lands.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, Job>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, id: &str) -> Result<Job, ConductorError> {
        match self.jobs.entry(id.to_string()) {
            Entry::Occupied(_) => Err(ConductorError::JobExists(id.to_string())),
            Entry::Vacant(slot) => {
                let job = Job::new(id);
                slot.insert(job.clone());
                Ok(job)
            }
        }
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, ConductorError> {
        let mut job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| ConductorError::JobNotFound(id.to_string()))?;
        StateMachine::apply(&mut job, update)?;
        Ok(job.clone())
    }

    async fn get(&self, id: &str) -> Result<Job, ConductorError> {
        self.jobs
            .get(id)
            .map(|job| job.clone())
            .ok_or_else(|| ConductorError::JobNotFound(id.to_string()))
    }
}
