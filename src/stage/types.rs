//! Wire schemas for the remote stages and the typed payloads the runner threads
//! between them.
//!
//! Each hand-off has its own request/response pair. [`StageInput`] and
//! [`StageOutput`] tag those pairs with the stage they belong to so a payload
//! produced for one stage can never be fed to another by accident.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::planner::StageKind;

/// Body sent to the prompt parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseRequest {
    pub prompt: String,
}

/// Structured reading of a natural-language prompt. Every field is optional
/// because a prompt may mention any subset of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredPrompt {
    pub tempo: Option<u32>,
    pub key: Option<String>,
    pub genre: Option<String>,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default)]
    pub style_references: Vec<String>,
    pub mood: Option<String>,
}

/// Body sent to the style analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub reference_track_url: String,
}

/// A structural section of the reference track, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    pub label: String,
}

/// Features extracted from a reference track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleFeatures {
    pub tempo: f64,
    pub key: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// Body sent to the sound generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt_spec: StructuredPrompt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_features: Option<StyleFeatures>,
}

/// Generated stems keyed by instrument name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub job_id: String,
    pub stems: BTreeMap<String, String>,
}

/// Body sent to the mixing & mastering service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixingRequest {
    pub stem_paths: Vec<String>,
}

/// Result of mixing & mastering. `output_path` is checked by Finalize, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixingResponse {
    pub output_path: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Input to the in-process finalize stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeRequest {
    pub output_path: Option<String>,
}

/// The deliverable reference extracted by finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutput {
    pub final_track_url: Option<String>,
}

/// What a stage is called with.
#[derive(Debug, Clone, PartialEq)]
pub enum StageInput {
    Parse(ParseRequest),
    Analyze(AnalyzeRequest),
    Generate(GenerationRequest),
    Master(MixingRequest),
    Finalize(FinalizeRequest),
}

impl StageInput {
    pub fn kind(&self) -> StageKind {
        match self {
            StageInput::Parse(_) => StageKind::Parse,
            StageInput::Analyze(_) => StageKind::Analyze,
            StageInput::Generate(_) => StageKind::Generate,
            StageInput::Master(_) => StageKind::Master,
            StageInput::Finalize(_) => StageKind::Finalize,
        }
    }
}

/// What a stage hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Parsed(StructuredPrompt),
    Analyzed(StyleFeatures),
    Generated(GenerationResponse),
    Mastered(MixingResponse),
    Finalized(FinalizeOutput),
}

impl StageOutput {
    pub fn kind(&self) -> StageKind {
        match self {
            StageOutput::Parsed(_) => StageKind::Parse,
            StageOutput::Analyzed(_) => StageKind::Analyze,
            StageOutput::Generated(_) => StageKind::Generate,
            StageOutput::Mastered(_) => StageKind::Master,
            StageOutput::Finalized(_) => StageKind::Finalize,
        }
    }
}
