use std::sync::Arc;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{ConductorError, FatalStageError};
use crate::planner::{StageDescriptor, WorkflowPlan};
use crate::stage::{ChainContext, StageError, StageInput, StageInvoker, StageOutput};
use crate::state_machine::{JobStatus, JobUpdate};
use crate::store::JobStore;

/// Drives one job's planned stages in order, recording progress in the store.
pub struct ChainRunner {
    store: Arc<dyn JobStore>,
    invoker: Arc<dyn StageInvoker>,
}

impl ChainRunner {
    pub fn new(store: Arc<dyn JobStore>, invoker: Arc<dyn StageInvoker>) -> Self {
        Self { store, invoker }
    }

    /// Run every stage of `plan`, returning the terminal status that was recorded.
    ///
    /// Stages run strictly one after another. The first fatal failure stops the
    /// chain; nothing after it is invoked. An `Err` means the store itself
    /// rejected a write, so no terminal status could be recorded.
    pub async fn run(
        &self,
        plan: &WorkflowPlan,
        mut ctx: ChainContext,
    ) -> Result<JobStatus, ConductorError> {
        let job_id = ctx.job_id.clone();
        info!(job_id = %job_id, stages = ?plan.kinds(), "chain started");

        for stage in plan.stages() {
            self.store
                .update(&job_id, JobUpdate::processing(stage.name()))
                .await?;
            info!(job_id = %job_id, stage = stage.name(), "stage started");

            if let Err(fatal) = self.run_stage(stage, &mut ctx).await {
                warn!(
                    job_id = %job_id,
                    stage = %fatal.stage,
                    error = %fatal.message,
                    "chain aborted"
                );
                self.store
                    .update(&job_id, JobUpdate::failure(fatal.stage, fatal.message))
                    .await?;
                return Ok(JobStatus::Failure);
            }
        }

        match ctx.deliverable() {
            Some(url) => {
                info!(job_id = %job_id, final_track_url = url, "chain succeeded");
                self.store
                    .update(&job_id, JobUpdate::success(url.to_string()))
                    .await?;
                Ok(JobStatus::Success)
            }
            None => {
                let stage = plan.stages().last().map_or("Finalize", |s| s.name());
                warn!(job_id = %job_id, stage, "chain finished without a deliverable");
                self.store
                    .update(
                        &job_id,
                        JobUpdate::failure(stage, "chain finished without a deliverable"),
                    )
                    .await?;
                Ok(JobStatus::Failure)
            }
        }
    }

    async fn run_stage(
        &self,
        stage: &StageDescriptor,
        ctx: &mut ChainContext,
    ) -> Result<(), FatalStageError> {
        let fatal = |err: StageError| FatalStageError {
            stage: stage.name().to_string(),
            message: err.to_string(),
        };

        let input = ctx.input_for(stage.kind).map_err(fatal)?;
        debug_assert_eq!(input.kind(), stage.kind);
        let output = self.invoke_with_retry(&ctx.job_id, stage, &input).await?;
        ctx.absorb(stage.kind, output).map_err(fatal)
    }

    /// Call `stage`, retrying transient failures per its policy.
    async fn invoke_with_retry(
        &self,
        job_id: &str,
        stage: &StageDescriptor,
        input: &StageInput,
    ) -> Result<StageOutput, FatalStageError> {
        let mut retry = 0;
        loop {
            let err = match self.invoker.invoke(stage, input).await {
                Ok(output) => return Ok(output),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(FatalStageError {
                    stage: stage.name().to_string(),
                    message: err.to_string(),
                });
            }

            retry += 1;
            match stage.retry.delay_for_retry(retry) {
                Some(delay) => {
                    warn!(
                        job_id = %job_id,
                        stage = stage.name(),
                        retry,
                        max_retries = stage.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying stage"
                    );
                    sleep(delay).await;
                }
                None => {
                    return Err(FatalStageError {
                        stage: stage.name().to_string(),
                        message: format!("{err} (gave up after {retry} attempts)"),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::StagesConfig;
    use crate::planner::{RetryPolicy, StageKind, TrackRequest, WorkflowPlanner};
    use crate::stage::types::{FinalizeOutput, MixingResponse};
    use crate::store::InMemoryJobStore;
    use crate::testing::{MASTERED_PATH, ScriptedInvoker};

    /// Plan with real stage order but zero delays so retries don't slow tests down.
    fn fast_plan(reference: Option<&str>, max_retries: u32) -> WorkflowPlan {
        let stages = StagesConfig::default();
        let request = TrackRequest::new(
            "128bpm house music with piano chords",
            reference.map(String::from),
        );
        let plan = WorkflowPlanner::new(&stages).plan(&request);
        WorkflowPlan::new(
            plan.stages()
                .iter()
                .cloned()
                .map(|mut stage| {
                    if stage.endpoint.is_some() {
                        stage.retry = RetryPolicy::fixed(max_retries, Duration::ZERO);
                    }
                    stage
                })
                .collect(),
        )
    }

    async fn run_with(
        invoker: Arc<ScriptedInvoker>,
        plan: &WorkflowPlan,
    ) -> (Arc<InMemoryJobStore>, JobStatus) {
        let store = Arc::new(InMemoryJobStore::new());
        store.create("job-1").await.unwrap();
        let runner = ChainRunner::new(store.clone(), invoker);
        let ctx = ChainContext::new("job-1", "128bpm house music with piano chords", None);
        let status = runner.run(plan, ctx).await.unwrap();
        (store, status)
    }

    #[tokio::test]
    async fn happy_path_records_deliverable() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let (store, status) = run_with(invoker.clone(), &fast_plan(None, 3)).await;

        assert_eq!(status, JobStatus::Success);
        let job = store.get("job-1").await.unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(
            job.result.unwrap().final_track_url.as_deref(),
            Some(MASTERED_PATH)
        );
        assert_eq!(
            invoker.call_order(),
            vec![
                StageKind::Parse,
                StageKind::Generate,
                StageKind::Master,
                StageKind::Finalize
            ]
        );
    }

    #[tokio::test]
    async fn analyze_runs_between_parse_and_generate() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let store = Arc::new(InMemoryJobStore::new());
        store.create("job-1").await.unwrap();
        let runner = ChainRunner::new(store.clone(), invoker.clone());
        let ctx = ChainContext::new("job-1", "techno", Some("http://x/ref.wav".into()));

        let status = runner
            .run(&fast_plan(Some("http://x/ref.wav"), 0), ctx)
            .await
            .unwrap();

        assert_eq!(status, JobStatus::Success);
        assert_eq!(
            invoker.call_order()[..3],
            [StageKind::Parse, StageKind::Analyze, StageKind::Generate]
        );
    }

    #[tokio::test]
    async fn transient_failures_within_budget_still_succeed() {
        let invoker = Arc::new(ScriptedInvoker::new().fail_transient(StageKind::Generate, 3));
        let (store, status) = run_with(invoker.clone(), &fast_plan(None, 3)).await;

        assert_eq!(status, JobStatus::Success);
        assert_eq!(invoker.calls(StageKind::Generate), 4);
        assert_eq!(store.get("job-1").await.unwrap().status, JobStatus::Success);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_with_stage_name() {
        let invoker = Arc::new(ScriptedInvoker::new().fail_transient(StageKind::Generate, 4));
        let (store, status) = run_with(invoker.clone(), &fast_plan(None, 3)).await;

        assert_eq!(status, JobStatus::Failure);
        assert_eq!(invoker.calls(StageKind::Generate), 4);
        let job = store.get("job-1").await.unwrap();
        assert_eq!(job.status, JobStatus::Failure);
        let error = job.error.unwrap();
        assert_eq!(error.stage, "Generate");
        assert!(error.message.contains("Generate unreachable"));
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn fatal_failure_short_circuits_the_chain() {
        let invoker = Arc::new(ScriptedInvoker::new().fail_structural(StageKind::Generate));
        let (store, status) = run_with(invoker.clone(), &fast_plan(None, 3)).await;

        assert_eq!(status, JobStatus::Failure);
        assert_eq!(invoker.calls(StageKind::Parse), 1);
        // Structural failures are never retried.
        assert_eq!(invoker.calls(StageKind::Generate), 1);
        assert_eq!(invoker.calls(StageKind::Master), 0);
        assert_eq!(invoker.calls(StageKind::Finalize), 0);
        assert_eq!(store.get("job-1").await.unwrap().error.unwrap().stage, "Generate");
    }

    #[tokio::test]
    async fn missing_deliverable_fails_finalize() {
        let invoker = Arc::new(ScriptedInvoker::new().respond_with(
            StageKind::Master,
            StageOutput::Mastered(MixingResponse {
                output_path: None,
                message: None,
            }),
        ));
        let (store, status) = run_with(invoker.clone(), &fast_plan(None, 0)).await;

        assert_eq!(status, JobStatus::Failure);
        assert_eq!(invoker.calls(StageKind::Finalize), 1);
        assert_eq!(store.get("job-1").await.unwrap().error.unwrap().stage, "Finalize");
    }

    #[tokio::test]
    async fn wrong_payload_kind_is_fatal() {
        let invoker = Arc::new(ScriptedInvoker::new().respond_with(
            StageKind::Parse,
            StageOutput::Finalized(FinalizeOutput {
                final_track_url: Some("/bogus.wav".into()),
            }),
        ));
        let (store, status) = run_with(invoker.clone(), &fast_plan(None, 3)).await;

        assert_eq!(status, JobStatus::Failure);
        assert_eq!(invoker.calls(StageKind::Parse), 1);
        assert_eq!(invoker.calls(StageKind::Generate), 0);
        assert_eq!(store.get("job-1").await.unwrap().error.unwrap().stage, "Parse");
    }

    #[tokio::test]
    async fn missing_job_record_surfaces_store_error() {
        let store = Arc::new(InMemoryJobStore::new());
        let runner = ChainRunner::new(store, Arc::new(ScriptedInvoker::new()));
        let ctx = ChainContext::new("ghost", "prompt", None);
        let err = runner.run(&fast_plan(None, 0), ctx).await.unwrap_err();
        assert!(matches!(err, ConductorError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn step_is_recorded_before_each_call() {
        let store = Arc::new(InMemoryJobStore::new());
        store.create("job-1").await.unwrap();
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .fail_transient(StageKind::Generate, 1)
                .latency(Duration::from_millis(5))
                .watch_record(store.clone(), "job-1"),
        );
        let runner = ChainRunner::new(store.clone(), invoker.clone());
        let ctx = ChainContext::new("job-1", "techno", Some("http://x/ref.wav".into()));

        let status = runner
            .run(&fast_plan(Some("http://x/ref.wav"), 1), ctx)
            .await
            .unwrap();

        assert_eq!(status, JobStatus::Success);
        let processing = |step: &str| (JobStatus::Processing, Some(step.to_string()));
        assert_eq!(
            invoker.seen_records(),
            vec![
                processing("Parse"),
                processing("Analyze"),
                processing("Generate"),
                processing("Generate"),
                processing("Master"),
                processing("Finalize"),
            ]
        );
        // One job never has two stages in flight.
        assert_eq!(invoker.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn retries_wait_the_fixed_delay() {
        let delay = Duration::from_millis(40);
        let plan = WorkflowPlan::new(
            fast_plan(None, 0)
                .stages()
                .iter()
                .cloned()
                .map(|mut stage| {
                    if stage.kind == StageKind::Generate {
                        stage.retry = RetryPolicy::fixed(3, delay);
                    }
                    stage
                })
                .collect(),
        );
        let invoker = Arc::new(ScriptedInvoker::new().fail_transient(StageKind::Generate, 3));

        let started = tokio::time::Instant::now();
        let (_, status) = run_with(invoker.clone(), &plan).await;

        assert_eq!(status, JobStatus::Success);
        assert_eq!(invoker.calls(StageKind::Generate), 4);
        assert!(started.elapsed() >= delay * 3);
    }
}
