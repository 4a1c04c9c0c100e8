//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Cognition. One call
//! takes a submission (up to five raw payloads) through normalization, the
//! independent calculators and scorers, and record assembly.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::assembler::{assemble, AssembledMetrics};
use crate::cognitive::{
    score_graph_test, score_span_test, score_sustained_attention, GraphTestResult,
    SpanTestResult, SustainedAttentionResult,
};
use crate::config::EngineConfig;
use crate::error::ComputeError;
use crate::keyboard::KeyboardCalculator;
use crate::payload::{
    parse_payload, GraphTestRaw, KeyTelemetry, PayloadKind, PointerTelemetry, RawPayload,
    SpanTestRaw, SustainedAttentionRaw,
};
use crate::pointer::PointerCalculator;
use crate::types::MetricEntry;

/// Raw byte payloads of one assessment submission. Payloads may be gzip or
/// zlib compressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub pointer: Option<Vec<u8>>,
    pub keyboard: Option<Vec<u8>>,
    pub sustained_attention: Option<Vec<u8>>,
    pub graph_test: Option<Vec<u8>>,
    pub span_test: Option<Vec<u8>>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for one section.
    pub fn with(mut self, kind: PayloadKind, bytes: impl Into<Vec<u8>>) -> Self {
        self.set(kind, bytes);
        self
    }

    pub fn set(&mut self, kind: PayloadKind, bytes: impl Into<Vec<u8>>) {
        *self.slot_mut(kind) = Some(bytes.into());
    }

    pub fn get(&self, kind: PayloadKind) -> Option<&[u8]> {
        match kind {
            PayloadKind::Pointer => self.pointer.as_deref(),
            PayloadKind::Keyboard => self.keyboard.as_deref(),
            PayloadKind::SustainedAttention => self.sustained_attention.as_deref(),
            PayloadKind::GraphTest => self.graph_test.as_deref(),
            PayloadKind::SpanTest => self.span_test.as_deref(),
        }
    }

    /// Kinds present in this submission.
    pub fn kinds(&self) -> Vec<PayloadKind> {
        PayloadKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).is_some())
            .collect()
    }

    /// Build from a JSON document with inline sections.
    pub fn from_document(document: &SubmissionDocument) -> Result<Self, ComputeError> {
        let mut submission = Submission::new();
        for kind in PayloadKind::ALL {
            if let Some(section) = document.section(kind) {
                submission.set(kind, serde_json::to_vec(section)?);
            }
        }
        Ok(submission)
    }

    fn slot_mut(&mut self, kind: PayloadKind) -> &mut Option<Vec<u8>> {
        match kind {
            PayloadKind::Pointer => &mut self.pointer,
            PayloadKind::Keyboard => &mut self.keyboard,
            PayloadKind::SustainedAttention => &mut self.sustained_attention,
            PayloadKind::GraphTest => &mut self.graph_test,
            PayloadKind::SpanTest => &mut self.span_test,
        }
    }
}

/// JSON form of a submission: each section is the payload itself, inline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sustained_attention: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_test: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_test: Option<serde_json::Value>,
}

impl SubmissionDocument {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        serde_json::from_str(json)
            .map_err(|e| ComputeError::ParseError(format!("Failed to parse submission: {e}")))
    }

    pub fn section(&self, kind: PayloadKind) -> Option<&serde_json::Value> {
        let section = match kind {
            PayloadKind::Pointer => self.pointer.as_ref(),
            PayloadKind::Keyboard => self.keyboard.as_ref(),
            PayloadKind::SustainedAttention => self.sustained_attention.as_ref(),
            PayloadKind::GraphTest => self.graph_test.as_ref(),
            PayloadKind::SpanTest => self.span_test.as_ref(),
        };
        section.filter(|v| !v.is_null())
    }
}

/// Everything computed for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub global: Vec<MetricEntry>,
    pub per_question: Vec<MetricEntry>,
    /// `None` when the test was not submitted or not attempted
    pub sustained_attention: Option<SustainedAttentionResult>,
    pub graph_test: Option<GraphTestResult>,
    pub span_test: Option<SpanTestResult>,
}

impl SubmissionReport {
    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string(self).map_err(ComputeError::JsonError)
    }

    pub fn to_json_pretty(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// The metric records as an [`AssembledMetrics`] view.
    pub fn metrics(&self) -> AssembledMetrics {
        AssembledMetrics {
            global: self.global.clone(),
            per_question: self.per_question.clone(),
        }
    }
}

/// Typed sections after normalization.
#[derive(Debug, Default)]
struct DecodedSections {
    pointer: PointerTelemetry,
    keyboard: KeyTelemetry,
    sustained_attention: Option<SustainedAttentionRaw>,
    graph_test: Option<GraphTestRaw>,
    span_test: Option<SpanTestRaw>,
}

impl DecodedSections {
    fn insert(&mut self, payload: RawPayload) {
        match payload {
            RawPayload::Pointer(p) => self.pointer = p,
            RawPayload::Keyboard(k) => self.keyboard = k,
            RawPayload::SustainedAttention(t) => self.sustained_attention = Some(t),
            RawPayload::GraphTest(t) => self.graph_test = Some(t),
            RawPayload::SpanTest(t) => self.span_test = Some(t),
        }
    }
}

/// Stateless cognition engine. Safe to share across threads; each call to
/// [`process`](Self::process) is independent.
#[derive(Debug, Clone)]
pub struct CognitionEngine {
    config: EngineConfig,
    pointer: PointerCalculator,
    keyboard: KeyboardCalculator,
}

impl Default for CognitionEngine {
    fn default() -> Self {
        Self::build(EngineConfig::default())
    }
}

impl CognitionEngine {
    /// Create an engine with a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        Self {
            pointer: PointerCalculator::new(&config),
            keyboard: KeyboardCalculator::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one submission.
    ///
    /// A malformed section fails the whole call; the error names the section.
    /// Missing sections are not errors: pointer and keyboard metrics come out
    /// as insufficient and the test results as `None`.
    pub fn process(&self, submission: &Submission) -> Result<SubmissionReport, ComputeError> {
        let started = Instant::now();

        // Stage 1: Normalize and validate every present section
        let mut sections = DecodedSections::default();
        for kind in submission.kinds() {
            if let Some(bytes) = submission.get(kind) {
                let payload = parse_payload(kind, bytes)?;
                tracing::debug!(
                    section = %kind,
                    bytes = bytes.len(),
                    records = payload.record_count(),
                    "decoded section"
                );
                sections.insert(payload);
            }
        }

        // Stage 2: Run calculators and scorers in parallel
        let config = &self.config;
        let ((pointer, keyboard), (sustained_attention, (graph_test, span_test))) = rayon::join(
            || {
                rayon::join(
                    || self.pointer.compute(&sections.pointer),
                    || self.keyboard.compute(&sections.keyboard),
                )
            },
            || {
                rayon::join(
                    || {
                        sections
                            .sustained_attention
                            .as_ref()
                            .and_then(|raw| score_sustained_attention(raw, config))
                    },
                    || {
                        rayon::join(
                            || sections
                                    .graph_test
                                    .as_ref()
                                    .and_then(|raw| score_graph_test(raw, config)),
                            || {
                                sections
                                    .span_test
                                    .as_ref()
                                    .and_then(|raw| score_span_test(raw, config))
                            },
                        )
                    },
                )
            },
        );

        // Stage 3: Assemble metric records
        let assembled = assemble(&pointer, &keyboard)?;

        tracing::debug!(
            global = assembled.global.len(),
            per_question = assembled.per_question.len(),
            sustained_attention = sustained_attention.is_some(),
            graph_test = graph_test.is_some(),
            span_test = span_test.is_some(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "processed submission"
        );

        Ok(SubmissionReport {
            global: assembled.global,
            per_question: assembled.per_question,
            sustained_attention,
            graph_test,
            span_test,
        })
    }

    /// Process a JSON submission document.
    pub fn process_document(
        &self,
        document: &SubmissionDocument,
    ) -> Result<SubmissionReport, ComputeError> {
        self.process(&Submission::from_document(document)?)
    }
}

/// Compute metrics for a JSON submission document (stateless, one-shot).
///
/// # Arguments
/// * `document_json` - Submission document with inline sections
///
/// # Returns
/// Submission report JSON string
///
/// # Example
/// ```ignore
/// let report_json = compute_metrics_json(r#"{ "keyboard": { "events": [] } }"#)?;
/// ```
pub fn compute_metrics_json(document_json: &str) -> Result<String, ComputeError> {
    let document = SubmissionDocument::from_json(document_json)?;
    CognitionEngine::default()
        .process_document(&document)?
        .to_json()
}
