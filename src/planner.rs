use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::StagesConfig;
use crate::error::ConductorError;

/// The stages a chain can be composed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Parse,
    Analyze,
    Generate,
    Master,
    Finalize,
}

impl StageKind {
    pub fn name(self) -> &'static str {
        match self {
            StageKind::Parse => "Parse",
            StageKind::Analyze => "Analyze",
            StageKind::Generate => "Generate",
            StageKind::Master => "Master",
            StageKind::Finalize => "Finalize",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-delay retry policy for transient stage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a stage is called at most `max_retries + 1` times.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        delay: Duration::ZERO,
    };

    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Delay before retry number `retry` (1-indexed), or `None` once retries are spent.
    pub fn delay_for_retry(&self, retry: u32) -> Option<Duration> {
        if retry >= 1 && retry <= self.max_retries {
            Some(self.delay)
        } else {
            None
        }
    }
}

/// Everything the runner needs to call one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    pub kind: StageKind,
    /// Remote endpoint; `None` for stages that run in-process.
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl StageDescriptor {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn from_config(kind: StageKind, stages: &StagesConfig) -> Self {
        match stages.get(kind) {
            Some(cfg) => Self {
                kind,
                endpoint: Some(cfg.url.clone()),
                timeout: cfg.timeout,
                retry: RetryPolicy::fixed(cfg.max_retries, cfg.retry_delay),
            },
            None => Self {
                kind,
                endpoint: None,
                timeout: Duration::ZERO,
                retry: RetryPolicy::NONE,
            },
        }
    }
}

/// Ordered, immutable list of stages for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowPlan {
    stages: Vec<StageDescriptor>,
}

impl WorkflowPlan {
    pub fn new(stages: Vec<StageDescriptor>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind).collect()
    }
}

/// A track request as submitted by a caller.
///
/// Also accepts the legacy field names `prompt` and `reference_track_url` as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRequest {
    #[serde(default, alias = "prompt")]
    pub primary_input: Option<String>,
    #[serde(
        default,
        alias = "reference_track_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub optional_reference: Option<String>,
}

impl TrackRequest {
    pub fn new(primary_input: impl Into<String>, optional_reference: Option<String>) -> Self {
        Self {
            primary_input: Some(primary_input.into()),
            optional_reference,
        }
    }

    /// The primary input must be present and non-blank.
    pub fn validate(&self) -> Result<&str, ConductorError> {
        match self.primary_input.as_deref().map(str::trim) {
            Some(input) if !input.is_empty() => Ok(input),
            _ => Err(ConductorError::Validation(
                "primary_input must not be empty".to_string(),
            )),
        }
    }

    /// A blank reference counts as absent.
    pub fn reference(&self) -> Option<&str> {
        self.optional_reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// Maps a request to the stages it needs. Pure: no I/O, no validation.
pub struct WorkflowPlanner<'a> {
    stages: &'a StagesConfig,
}

impl<'a> WorkflowPlanner<'a> {
    pub fn new(stages: &'a StagesConfig) -> Self {
        Self { stages }
    }

    /// Always [Parse, Generate, Master, Finalize]; Analyze goes after Parse
    /// when a reference asset is present.
    pub fn plan(&self, request: &TrackRequest) -> WorkflowPlan {
        let mut kinds = vec![StageKind::Parse];
        if request.reference().is_some() {
            kinds.push(StageKind::Analyze);
        }
        kinds.extend([StageKind::Generate, StageKind::Master, StageKind::Finalize]);

        WorkflowPlan::new(
            kinds
                .into_iter()
                .map(|kind| StageDescriptor::from_config(kind, self.stages))
                .collect(),
        )
    }
}
