//! Worker pool that runs chains off the submitting request's path.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::orchestrator::ChainRunner;
use crate::planner::WorkflowPlan;
use crate::stage::ChainContext;

/// Schedules chain runs on a bounded pool.
///
/// At most `workers` chains run at once. Jobs submitted while the pool is
/// saturated wait for a permit; they are never rejected.
pub struct Dispatcher {
    runner: Arc<ChainRunner>,
    permits: Arc<Semaphore>,
    workers: usize,
    queued: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub fn new(runner: Arc<ChainRunner>, workers: usize) -> Self {
        Self {
            runner,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a chain and return immediately.
    ///
    /// The handle resolves once the chain reaches a terminal status; callers on
    /// the request path drop it.
    pub fn dispatch(&self, plan: WorkflowPlan, ctx: ChainContext) -> JoinHandle<()> {
        let runner = self.runner.clone();
        let permits = self.permits.clone();
        let queued = self.queued.clone();
        let waiting = queued.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(job_id = %ctx.job_id, waiting, "job queued");

        tokio::spawn(async move {
            let job_id = ctx.job_id.clone();
            let permit = permits.acquire_owned().await;
            queued.fetch_sub(1, Ordering::SeqCst);
            // Hold the permit for the duration of the chain.
            let _permit = match permit {
                Ok(permit) => permit,
                Err(_) => {
                    error!(job_id = %job_id, "worker pool closed; job dropped");
                    return;
                }
            };

            match runner.run(&plan, ctx).await {
                Ok(status) => info!(job_id = %job_id, %status, "job finished"),
                Err(e) => error!(job_id = %job_id, error = %e, "job could not be recorded"),
            }
        })
    }

    /// Jobs aguardando um worker livre.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Chains em execução no momento.
    pub fn active(&self) -> usize {
        self.workers - self.permits.available_permits()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}
