use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::StageError;
use super::types::{FinalizeOutput, StageInput, StageOutput};
use crate::error::ConductorError;
use crate::planner::StageDescriptor;

/// Calls one stage once. Retrying is the caller's job.
#[async_trait]
pub trait StageInvoker: Send + Sync {
    async fn invoke(
        &self,
        stage: &StageDescriptor,
        input: &StageInput,
    ) -> Result<StageOutput, StageError>;
}

/// Invokes remote stages over HTTP with JSON bodies; Finalize runs in-process.
pub struct HttpStageInvoker {
    client: Client,
}

impl HttpStageInvoker {
    pub fn new() -> Result<Self, ConductorError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }

    async fn post<Req, Resp>(&self, stage: &StageDescriptor, body: &Req) -> Result<Resp, StageError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let url = stage.endpoint.as_deref().ok_or_else(|| {
            StageError::Structural(format!("{} has no endpoint configured", stage.name()))
        })?;
        debug!(stage = stage.name(), url, "calling stage");

        let response = self
            .client
            .post(url)
            .timeout(stage.timeout)
            .json(body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(classify_status(status, message));
        }

        let bytes = response.bytes().await.map_err(classify_transport)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StageError::Structural(format!("unexpected response from {}: {e}", stage.name()))
        })
    }
}

#[async_trait]
impl StageInvoker for HttpStageInvoker {
    async fn invoke(
        &self,
        stage: &StageDescriptor,
        input: &StageInput,
    ) -> Result<StageOutput, StageError> {
        match input {
            StageInput::Parse(req) => self.post(stage, req).await.map(StageOutput::Parsed),
            StageInput::Analyze(req) => self.post(stage, req).await.map(StageOutput::Analyzed),
            StageInput::Generate(req) => self.post(stage, req).await.map(StageOutput::Generated),
            StageInput::Master(req) => self.post(stage, req).await.map(StageOutput::Mastered),
            StageInput::Finalize(req) => Ok(StageOutput::Finalized(FinalizeOutput {
                final_track_url: req.output_path.clone(),
            })),
        }
    }
}

// Transport-level failures (connect, timeout, body read) are retryable; a request
// that could not even be built is not.
fn classify_transport(err: reqwest::Error) -> StageError {
    if err.is_builder() {
        StageError::Structural(err.to_string())
    } else {
        StageError::Transient(err.to_string())
    }
}

fn classify_status(status: StatusCode, message: String) -> StageError {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            StageError::Transient(format!("status {}: {message}", status.as_u16()))
        }
        _ => StageError::Structural(format!("status {}: {message}", status.as_u16())),
    }
}
