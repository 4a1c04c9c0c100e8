//! Cognitive test scoring
//!
//! One pure scorer per test protocol. Each takes the protocol's raw log and
//! returns `None` when the test was never attempted (both window timestamps
//! are zero), regardless of what the event log contains.

pub mod sustained_attention;

pub use graph_test::{score_graph_test, GraphPartResult, GraphTestResult};
pub use span_test::{score_span_test, SpanSeriesResult, SpanTestResult, SpanTrialResult};
pub use sustained_attention::{score_sustained_attention, SustainedAttentionResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Start/end timestamps of a test administration, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TestWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Both timestamps zero: the participant never started the test.
    pub fn is_not_attempted(&self) -> bool {
        self.start_ms == 0 && self.end_ms == 0
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end_ms - self.start_ms).max(0)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start_ms)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.end_ms)
    }

    /// Human-readable window, shown by `cognition validate`.
    pub fn describe(&self) -> String {
        if self.is_not_attempted() {
            return "not attempted".to_string();
        }
        match (self.started_at(), self.ended_at()) {
            (Some(start), Some(end)) => format!(
                "{} .. {} ({:.1}s)",
                start.to_rfc3339(),
                end.to_rfc3339(),
                self.duration_ms() as f64 / 1000.0
            ),
            _ => format!("{} .. {}", self.start_ms, self.end_ms),
        }
    }
}
