use std::collections::BTreeMap;

use super::error::StageError;
use super::types::{
    AnalyzeRequest, FinalizeRequest, GenerationRequest, MixingRequest, ParseRequest,
    StageInput, StageOutput, StructuredPrompt, StyleFeatures,
};
use crate::planner::StageKind;

/// Job-level state accumulated as a chain advances.
///
/// Each stage's output is merged in rather than replacing what came before, so
/// Generate can see both the parsed prompt and the optional style features.
#[derive(Debug, Clone, Default)]
pub struct ChainContext {
    pub job_id: String,
    pub prompt: String,
    pub reference: Option<String>,
    pub prompt_spec: Option<StructuredPrompt>,
    pub style_features: Option<StyleFeatures>,
    pub stems: Option<BTreeMap<String, String>>,
    pub output_path: Option<String>,
    pub final_track_url: Option<String>,
}

impl ChainContext {
    pub fn new(
        job_id: impl Into<String>,
        prompt: impl Into<String>,
        reference: Option<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            prompt: prompt.into(),
            reference,
            ..Default::default()
        }
    }

    /// Build the request for `kind` from what earlier stages produced.
    pub fn input_for(&self, kind: StageKind) -> Result<StageInput, StageError> {
        let input = match kind {
            StageKind::Parse => StageInput::Parse(ParseRequest {
                prompt: self.prompt.clone(),
            }),
            StageKind::Analyze => {
                let reference = self.reference.clone().ok_or_else(|| {
                    StageError::Structural("no reference track to analyze".to_string())
                })?;
                StageInput::Analyze(AnalyzeRequest {
                    reference_track_url: reference,
                })
            }
            StageKind::Generate => {
                let prompt_spec = self.prompt_spec.clone().ok_or_else(|| {
                    StageError::Structural("generation requires a parsed prompt".to_string())
                })?;
                StageInput::Generate(GenerationRequest {
                    prompt_spec,
                    style_features: self.style_features.clone(),
                })
            }
            StageKind::Master => {
                let stem_paths: Vec<String> = self
                    .stems
                    .as_ref()
                    .map(|stems| stems.values().cloned().collect())
                    .unwrap_or_default();
                if stem_paths.is_empty() {
                    return Err(StageError::Structural(
                        "No stems found from sound generation step.".to_string(),
                    ));
                }
                StageInput::Master(MixingRequest { stem_paths })
            }
            StageKind::Finalize => StageInput::Finalize(FinalizeRequest {
                output_path: self.output_path.clone(),
            }),
        };
        Ok(input)
    }

    /// Merge the output of `kind` into the context.
    ///
    /// An output tagged for a different stage, or a finalize without a
    /// deliverable, is a structural failure of `kind`.
    pub fn absorb(&mut self, kind: StageKind, output: StageOutput) -> Result<(), StageError> {
        if output.kind() != kind {
            return Err(StageError::Structural(format!(
                "{kind} returned a {} payload",
                output.kind()
            )));
        }

        match output {
            StageOutput::Parsed(spec) => self.prompt_spec = Some(spec),
            StageOutput::Analyzed(features) => self.style_features = Some(features),
            StageOutput::Generated(generated) => self.stems = Some(generated.stems),
            StageOutput::Mastered(mixed) => self.output_path = mixed.output_path,
            StageOutput::Finalized(finalized) => {
                let url = finalized.final_track_url.ok_or_else(|| {
                    StageError::Structural("no output_path to deliver".to_string())
                })?;
                self.final_track_url = Some(url);
            }
        }
        Ok(())
    }

    /// The deliverable reference, once Finalize has run.
    pub fn deliverable(&self) -> Option<&str> {
        self.final_track_url.as_deref()
    }
}
