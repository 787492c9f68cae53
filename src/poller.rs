//! Client side of the status API: submit a track request and poll until the job settles.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::planner::TrackRequest;
use crate::server::JobStatusResponse;
use crate::state_machine::JobStatus;

pub const NO_ERROR_DETAILS: &str = "No specific error details provided.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("could not reach the orchestrator: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("orchestrator returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("orchestrator did not return a job id")]
    MissingJobId,
}

/// How a watched job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Success { final_track_url: Option<String> },
    Failure { stage: Option<String>, message: String },
}

/// Receives each distinct snapshot observed while polling.
pub trait ProgressReporter {
    fn status_changed(&self, snapshot: &JobStatusResponse);
}

pub struct OrchestratorClient {
    http: Client,
    base_url: String,
}

impl OrchestratorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submit a request and return the id the orchestrator assigned.
    pub async fn create_job(&self, request: &TrackRequest) -> Result<String, ClientError> {
        let response = self
            .http
            .post(format!("{}/jobs", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response.text().await.unwrap_or_default()));
        }

        let body: Value = decode(response).await?;
        body.get("job_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .ok_or(ClientError::MissingJobId)
    }

    pub async fn get_status(&self, job_id: &str) -> Result<JobStatusResponse, ClientError> {
        let response = self
            .http
            .get(format!("{}/jobs/{job_id}", self.base_url))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(job_id.to_string())),
            status if !status.is_success() => {
                Err(api_error(status, response.text().await.unwrap_or_default()))
            }
            _ => decode(response).await,
        }
    }
}

/// Read a 2xx body; a body that does not decode is the orchestrator's fault, not the network's.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Api {
        status: status.as_u16(),
        message: format!("undecodable response body: {e}"),
    })
}

/// Pull the `detail` field out of an error body when there is one.
fn api_error(status: StatusCode, body: String) -> ClientError {
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(String::from))
        .unwrap_or(body);
    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Process exit status for a watched job: 0 only when it ended in SUCCESS.
pub fn exit_status(result: &Result<PollOutcome, ClientError>) -> u8 {
    match result {
        Ok(PollOutcome::Success { .. }) => 0,
        Ok(PollOutcome::Failure { .. }) | Err(_) => 1,
    }
}

/// Poll `job_id` every `interval` until it reaches SUCCESS or FAILURE.
///
/// The reporter sees a snapshot only when the status or the current step changes.
/// An unknown id or an unreachable orchestrator ends polling immediately.
pub async fn poll_until_terminal(
    client: &OrchestratorClient,
    job_id: &str,
    interval: Duration,
    reporter: &dyn ProgressReporter,
) -> Result<PollOutcome, ClientError> {
    let mut last_seen: Option<(JobStatus, Option<String>)> = None;

    loop {
        let snapshot = client.get_status(job_id).await?;
        let key = (snapshot.status, snapshot.current_step.clone());
        if last_seen.as_ref() != Some(&key) {
            reporter.status_changed(&snapshot);
            last_seen = Some(key);
        }

        match snapshot.status {
            JobStatus::Success => {
                return Ok(PollOutcome::Success {
                    final_track_url: snapshot.result.and_then(|r| r.final_track_url),
                });
            }
            JobStatus::Failure => {
                let (stage, message) = match snapshot.error {
                    Some(err) if !err.message.is_empty() => (Some(err.stage), err.message),
                    Some(err) => (Some(err.stage), NO_ERROR_DETAILS.to_string()),
                    None => (None, NO_ERROR_DETAILS.to_string()),
                };
                return Ok(PollOutcome::Failure { stage, message });
            }
            JobStatus::Pending | JobStatus::Processing => {
                debug!(job_id, status = %snapshot.status, "job still running");
                tokio::time::sleep(interval).await;
            }
        }
    }
}
