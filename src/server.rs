//! HTTP surface: job submission and the read-only status API.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::StagesConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ConductorError;
use crate::planner::{TrackRequest, WorkflowPlanner};
use crate::stage::ChainContext;
use crate::state_machine::{ErrorRecord, Job, JobResult, JobStatus, generate_job_id};
use crate::store::JobStore;

/// 202 body returned on submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub details: String,
}

/// Snapshot returned by `GET /jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        let current_step = match job.status {
            JobStatus::Processing => job.current_step,
            _ => None,
        };
        Self {
            job_id: job.id,
            status: job.status,
            current_step,
            result: job.result,
            error: job.error,
        }
    }
}

/// Submission and status lookups shared by the HTTP handlers.
pub struct AppState {
    store: Arc<dyn JobStore>,
    dispatcher: Dispatcher,
    stages: StagesConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, dispatcher: Dispatcher, stages: StagesConfig) -> Self {
        Self {
            store,
            dispatcher,
            stages,
        }
    }

    /// Validate, plan, record PENDING and hand the chain to the dispatcher.
    ///
    /// Returns as soon as the job is queued. A validation failure creates no job.
    pub async fn submit(&self, request: &TrackRequest) -> Result<String, ConductorError> {
        let prompt = request.validate()?;
        let plan = WorkflowPlanner::new(&self.stages).plan(request);
        let job = self.store.create(&generate_job_id()).await?;

        info!(
            job_id = %job.id,
            stages = ?plan.kinds(),
            queued = self.dispatcher.queued(),
            active = self.dispatcher.active(),
            workers = self.dispatcher.workers(),
            "job submitted"
        );
        let ctx = ChainContext::new(
            job.id.clone(),
            prompt,
            request.reference().map(String::from),
        );
        self.dispatcher.dispatch(plan, ctx);
        Ok(job.id)
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatusResponse, ConductorError> {
        self.store.get(job_id).await.map(JobStatusResponse::from)
    }
}

impl IntoResponse for ConductorError {
    fn into_response(self) -> Response {
        let status = match &self {
            ConductorError::Validation(_) => StatusCode::BAD_REQUEST,
            ConductorError::JobNotFound(_) => StatusCode::NOT_FOUND,
            ConductorError::JobExists(_) | ConductorError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &self {
            ConductorError::JobNotFound(_) => "Job not found".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/jobs", post(create_job))
        .route("/create-track", post(create_job))
        .route("/jobs/{job_id}", get(get_job_status))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Job Orchestrator Service is running." }))
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrackRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ConductorError> {
    match state.submit(&request).await {
        Ok(job_id) => Ok((
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                job_id,
                status: JobStatus::Pending,
                details: "Job has been queued.".to_string(),
            }),
        )),
        Err(e) => {
            warn!(error = %e, "submission rejected");
            Err(e)
        }
    }
}

async fn get_job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ConductorError> {
    state.status(&job_id).await.map(Json)
}

/// Serve the API on `bind` until Ctrl-C.
pub async fn run_server(state: Arc<AppState>, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "job orchestrator listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down; running chains are abandoned");
}
