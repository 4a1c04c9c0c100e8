//! Synheart Cognition - deterministic engine for interaction and cognitive-test metrics
//!
//! Cognition turns raw assessment telemetry into derived metrics through a
//! stateless pipeline: payload normalization → pointer / keyboard calculators
//! and cognitive-test scorers (run in parallel) → metric record assembly.
//!
//! ## Modules
//!
//! - **Payloads**: decompress and validate the five raw telemetry shapes
//! - **Interaction metrics**: pointer and keyboard metrics, global and per question
//! - **Cognitive tests**: sustained-attention, graph-traversal and span-test scoring

pub mod assembler;
pub mod cognitive;
pub mod config;
pub mod error;
pub mod keyboard;
pub mod payload;
pub mod pipeline;
pub mod pointer;
pub mod stats;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use assembler::{assemble, AssembledMetrics, MetricCollector};
pub use cognitive::{GraphTestResult, SpanTestResult, SustainedAttentionResult, TestWindow};
pub use config::EngineConfig;
pub use error::ComputeError;
pub use keyboard::{KeyboardCalculator, KeyboardMetrics};
pub use payload::{parse_payload, PayloadKind, RawPayload};
pub use pipeline::{
    compute_metrics_json, CognitionEngine, Submission, SubmissionDocument, SubmissionReport,
};
pub use pointer::{PointerCalculator, PointerMetrics};
pub use types::{MetricEntry, MetricKey, MetricValue, Scope};

/// Engine version
pub const COGNITION_VERSION: &str = env!("CARGO_PKG_VERSION");
