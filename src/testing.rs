//! In-process stage invoker for tests.
//!
//! Returns canned payloads for every stage, counts calls, and can be told to fail a
//! stage transiently a fixed number of times or structurally on every call.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::planner::{StageDescriptor, StageKind};
use crate::stage::types::{
    FinalizeOutput, GenerationResponse, MixingResponse, StructuredPrompt, StyleFeatures,
};
use crate::stage::{StageError, StageInput, StageInvoker, StageOutput};
use crate::state_machine::JobStatus;
use crate::store::JobStore;

pub const MASTERED_PATH: &str = "/app/audio_files/mastered_mix.wav";

#[derive(Default)]
pub struct ScriptedInvoker {
    transient: Mutex<HashMap<StageKind, u32>>,
    structural: HashSet<StageKind>,
    overrides: HashMap<StageKind, StageOutput>,
    latency: Duration,
    calls: Mutex<Vec<StageKind>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    watched: Option<(Arc<dyn JobStore>, String)>,
    seen_records: Mutex<Vec<(JobStatus, Option<String>)>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `kind` with a transient error on its next `times` calls.
    pub fn fail_transient(mut self, kind: StageKind, times: u32) -> Self {
        self.transient
            .get_mut()
            .expect("scripted invoker lock poisoned")
            .insert(kind, times);
        self
    }

    /// Fail `kind` structurally on every call.
    pub fn fail_structural(mut self, kind: StageKind) -> Self {
        self.structural.insert(kind);
        self
    }

    /// Answer `kind` with `output` instead of the canned payload.
    pub fn respond_with(mut self, kind: StageKind, output: StageOutput) -> Self {
        self.overrides.insert(kind, output);
        self
    }

    /// Sleep this long inside every call.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// On every call, snapshot `job_id` from `store` before doing anything else.
    pub fn watch_record(mut self, store: Arc<dyn JobStore>, job_id: &str) -> Self {
        self.watched = Some((store, job_id.to_string()));
        self
    }

    /// Status and step of the watched record as seen at the start of each call.
    pub fn seen_records(&self) -> Vec<(JobStatus, Option<String>)> {
        self.seen_records
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self, kind: StageKind) -> usize {
        self.call_order().iter().filter(|k| **k == kind).count()
    }

    pub fn call_order(&self) -> Vec<StageKind> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn canned(input: &StageInput) -> StageOutput {
        match input {
            StageInput::Parse(_) => StageOutput::Parsed(StructuredPrompt {
                tempo: Some(128),
                genre: Some("house".into()),
                instruments: vec!["piano".into()],
                ..Default::default()
            }),
            StageInput::Analyze(_) => StageOutput::Analyzed(StyleFeatures {
                tempo: 120.5,
                key: "C# Minor".into(),
                segments: vec![],
            }),
            StageInput::Generate(_) => StageOutput::Generated(GenerationResponse {
                job_id: "gen-1".into(),
                stems: BTreeMap::from([
                    ("drums".into(), "/stems/drums.wav".into()),
                    ("bass".into(), "/stems/bass.wav".into()),
                ]),
            }),
            StageInput::Master(_) => StageOutput::Mastered(MixingResponse {
                output_path: Some(MASTERED_PATH.into()),
                message: Some("Mixing and mastering complete. Output saved.".into()),
            }),
            StageInput::Finalize(req) => StageOutput::Finalized(FinalizeOutput {
                final_track_url: req.output_path.clone(),
            }),
        }
    }
}

#[async_trait]
impl StageInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        stage: &StageDescriptor,
        input: &StageInput,
    ) -> Result<StageOutput, StageError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(stage.kind);
        }
        if let Some((store, job_id)) = &self.watched {
            if let Ok(job) = store.get(job_id).await {
                if let Ok(mut seen) = self.seen_records.lock() {
                    seen.push((job.status, job.current_step));
                }
            }
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.structural.contains(&stage.kind) {
            return Err(StageError::Structural(format!("{} sent garbage", stage.kind)));
        }
        let should_fail = self
            .transient
            .lock()
            .map(|mut transient| match transient.get_mut(&stage.kind) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            })
            .unwrap_or(false);
        if should_fail {
            return Err(StageError::Transient(format!("{} unreachable", stage.kind)));
        }

        Ok(self
            .overrides
            .get(&stage.kind)
            .cloned()
            .unwrap_or_else(|| Self::canned(input)))
    }
}
