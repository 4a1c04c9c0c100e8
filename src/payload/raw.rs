//! Raw telemetry schemas
//!
//! The five JSON shapes produced by the assessment client. Field names are
//! camelCase and form a contract with the client; they must stay stable.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cognitive::TestWindow;
use crate::error::ComputeError;

/// Largest accepted coordinate or target dimension magnitude, in pixels.
/// Keeps path lengths and velocity sums finite.
pub const MAX_COORDINATE: f64 = 1.0e9;

/// Which raw shape a payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Pointer,
    Keyboard,
    SustainedAttention,
    GraphTest,
    SpanTest,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 5] = [
        PayloadKind::Pointer,
        PayloadKind::Keyboard,
        PayloadKind::SustainedAttention,
        PayloadKind::GraphTest,
        PayloadKind::SpanTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Pointer => "pointer",
            PayloadKind::Keyboard => "keyboard",
            PayloadKind::SustainedAttention => "sustained_attention",
            PayloadKind::GraphTest => "graph_test",
            PayloadKind::SpanTest => "span_test",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadKind {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        PayloadKind::ALL
            .iter()
            .find(|k| k.as_str() == normalized)
            .copied()
            .ok_or_else(|| ComputeError::UnknownPayloadKind(s.to_string()))
    }
}

// ============================================================================
// Pointer telemetry
// ============================================================================

/// One pointer position sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementSample {
    pub x: f64,
    pub y: f64,
    pub timestamp_millis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "non_empty_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub question_id: Option<String>,
}

/// One discrete pointer interaction (click or tap).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub target_type: String,
    #[serde(
        default,
        deserialize_with = "non_empty_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub question_id: Option<String>,
    pub click_x: f64,
    pub click_y: f64,
    /// Geometric center of the intended control
    pub target_x: f64,
    pub target_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_height: Option<f64>,
    /// Click-to-target distance already normalized by the producer; may exceed 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_distance: Option<f64>,
    pub timestamp_millis: i64,
}

impl InteractionEvent {
    pub fn click_point(&self) -> (f64, f64) {
        (self.click_x, self.click_y)
    }

    pub fn target_point(&self) -> (f64, f64) {
        (self.target_x, self.target_y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerTelemetry {
    #[serde(default)]
    pub movements: Vec<MovementSample>,
    #[serde(default)]
    pub interactions: Vec<InteractionEvent>,
}

// ============================================================================
// Key telemetry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEventType {
    Keydown,
    Keyup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    #[serde(rename = "type")]
    pub event_type: KeyEventType,
    pub key: String,
    #[serde(default)]
    pub is_modifier: bool,
    pub timestamp_millis: i64,
    #[serde(
        default,
        deserialize_with = "non_empty_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub question_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTelemetry {
    #[serde(default)]
    pub events: Vec<KeyEvent>,
}

// ============================================================================
// Cognitive test envelopes
// ============================================================================

/// Shared envelope of every cognitive test log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "E: DeserializeOwned"))]
pub struct CognitiveTestRaw<E> {
    #[serde(default)]
    pub test_start_time_millis: i64,
    #[serde(default)]
    pub test_end_time_millis: i64,
    #[serde(default)]
    pub event_log: Vec<E>,
}

impl<E> CognitiveTestRaw<E> {
    pub fn window(&self) -> TestWindow {
        TestWindow::new(self.test_start_time_millis, self.test_end_time_millis)
    }
}

/// Sustained-attention log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SustainedAttentionEvent {
    /// A stimulus was shown
    #[serde(rename_all = "camelCase")]
    Stimulus {
        #[serde(deserialize_with = "flexible_id")]
        stimulus_id: String,
        is_target: bool,
        timestamp_millis: i64,
    },
    /// The participant responded
    #[serde(rename_all = "camelCase")]
    Response {
        #[serde(
            default,
            deserialize_with = "optional_flexible_id",
            skip_serializing_if = "Option::is_none"
        )]
        stimulus_id: Option<String>,
        timestamp_millis: i64,
    },
}

impl SustainedAttentionEvent {
    pub fn timestamp_millis(&self) -> i64 {
        match self {
            SustainedAttentionEvent::Stimulus {
                timestamp_millis, ..
            }
            | SustainedAttentionEvent::Response {
                timestamp_millis, ..
            } => *timestamp_millis,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphEventKind {
    PartStart,
    NodeConnected,
    Error,
    PartComplete,
}

/// Graph-traversal log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTestEvent {
    /// Test part, 1 or 2
    pub part: u8,
    #[serde(rename = "type")]
    pub kind: GraphEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_index: Option<u32>,
    pub timestamp_millis: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanDirection {
    #[default]
    Forward,
    Backward,
}

/// Span-test trial record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanTrial {
    pub span_length: u32,
    #[serde(default)]
    pub direction: SpanDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presented: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    #[serde(default)]
    pub timestamp_millis: i64,
}

pub type SustainedAttentionRaw = CognitiveTestRaw<SustainedAttentionEvent>;
pub type GraphTestRaw = CognitiveTestRaw<GraphTestEvent>;
pub type SpanTestRaw = CognitiveTestRaw<SpanTrial>;

// ============================================================================
// Tagged variant
// ============================================================================

/// A decoded, validated raw payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Pointer(PointerTelemetry),
    Keyboard(KeyTelemetry),
    SustainedAttention(SustainedAttentionRaw),
    GraphTest(GraphTestRaw),
    SpanTest(SpanTestRaw),
}

impl RawPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            RawPayload::Pointer(_) => PayloadKind::Pointer,
            RawPayload::Keyboard(_) => PayloadKind::Keyboard,
            RawPayload::SustainedAttention(_) => PayloadKind::SustainedAttention,
            RawPayload::GraphTest(_) => PayloadKind::GraphTest,
            RawPayload::SpanTest(_) => PayloadKind::SpanTest,
        }
    }

    /// Administration window of a cognitive-test payload.
    pub fn window(&self) -> Option<TestWindow> {
        match self {
            RawPayload::Pointer(_) | RawPayload::Keyboard(_) => None,
            RawPayload::SustainedAttention(t) => Some(t.window()),
            RawPayload::GraphTest(t) => Some(t.window()),
            RawPayload::SpanTest(t) => Some(t.window()),
        }
    }

    /// Number of samples/events carried, for logging.
    pub fn record_count(&self) -> usize {
        match self {
            RawPayload::Pointer(p) => p.movements.len() + p.interactions.len(),
            RawPayload::Keyboard(k) => k.events.len(),
            RawPayload::SustainedAttention(t) => t.event_log.len(),
            RawPayload::GraphTest(t) => t.event_log.len(),
            RawPayload::SpanTest(t) => t.event_log.len(),
        }
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ComputeError> {
        let kind = self.kind();
        match self {
            RawPayload::Pointer(p) => {
                for (i, m) in p.movements.iter().enumerate() {
                    check_timestamp(kind, "movements", i, m.timestamp_millis)?;
                    check_finite(kind, "movements", i, &[m.x, m.y])?;
                }
                for (i, e) in p.interactions.iter().enumerate() {
                    check_timestamp(kind, "interactions", i, e.timestamp_millis)?;
                    check_finite(
                        kind,
                        "interactions",
                        i,
                        &[e.click_x, e.click_y, e.target_x, e.target_y],
                    )?;
                    let size: Vec<f64> =
                        e.target_width.into_iter().chain(e.target_height).collect();
                    check_finite(kind, "interactions", i, &size)?;
                    if let Some(d) = e.normalized_distance {
                        if !d.is_finite() || d < 0.0 {
                            return Err(invalid(
                                kind,
                                format!("interactions[{i}].normalizedDistance must be a non-negative number"),
                            ));
                        }
                    }
                }
                Ok(())
            }
            RawPayload::Keyboard(k) => {
                for (i, e) in k.events.iter().enumerate() {
                    check_timestamp(kind, "events", i, e.timestamp_millis)?;
                }
                Ok(())
            }
            RawPayload::SustainedAttention(t) => {
                check_window(kind, &t.window())?;
                for (i, e) in t.event_log.iter().enumerate() {
                    check_timestamp(kind, "eventLog", i, e.timestamp_millis())?;
                }
                Ok(())
            }
            RawPayload::GraphTest(t) => {
                check_window(kind, &t.window())?;
                for (i, e) in t.event_log.iter().enumerate() {
                    check_timestamp(kind, "eventLog", i, e.timestamp_millis)?;
                    if e.part != 1 && e.part != 2 {
                        return Err(invalid(
                            kind,
                            format!("eventLog[{i}].part must be 1 or 2, got {}", e.part),
                        ));
                    }
                }
                Ok(())
            }
            RawPayload::SpanTest(t) => {
                check_window(kind, &t.window())?;
                for (i, trial) in t.event_log.iter().enumerate() {
                    check_timestamp(kind, "eventLog", i, trial.timestamp_millis)?;
                    if trial.span_length == 0 {
                        return Err(invalid(
                            kind,
                            format!("eventLog[{i}].spanLength must be positive"),
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

fn invalid(kind: PayloadKind, reason: String) -> ComputeError {
    ComputeError::InvalidPayload {
        kind: kind.to_string(),
        reason,
    }
}

fn check_timestamp(
    kind: PayloadKind,
    field: &str,
    index: usize,
    timestamp: i64,
) -> Result<(), ComputeError> {
    if timestamp < 0 {
        return Err(invalid(
            kind,
            format!("{field}[{index}].timestampMillis must not be negative"),
        ));
    }
    Ok(())
}

fn check_finite(
    kind: PayloadKind,
    field: &str,
    index: usize,
    values: &[f64],
) -> Result<(), ComputeError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(invalid(
            kind,
            format!("{field}[{index}] has a non-finite coordinate"),
        ));
    }
    if values.iter().any(|v| v.abs() > MAX_COORDINATE) {
        return Err(invalid(
            kind,
            format!("{field}[{index}] has a coordinate beyond ±{MAX_COORDINATE}"),
        ));
    }
    Ok(())
}

fn check_window(kind: PayloadKind, window: &TestWindow) -> Result<(), ComputeError> {
    if window.is_not_attempted() {
        return Ok(());
    }
    if window.start_ms < 0 || window.end_ms < window.start_ms {
        return Err(invalid(
            kind,
            format!(
                "test window is inverted or negative ({} .. {})",
                window.start_ms, window.end_ms
            ),
        ));
    }
    Ok(())
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Question ids: absent, null and "" all mean "no question".
fn non_empty_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = optional_flexible_id(deserializer)?;
    Ok(id.filter(|s| !s.is_empty()))
}

/// Ids may arrive as strings or integers depending on the client version.
fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    optional_flexible_id(deserializer)?.ok_or_else(|| de::Error::custom("id must not be null"))
}

fn optional_flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|id| match id {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kind_parsing() {
        assert_eq!(
            "sustained-attention".parse::<PayloadKind>().unwrap(),
            PayloadKind::SustainedAttention
        );
        assert_eq!("Pointer".parse::<PayloadKind>().unwrap(), PayloadKind::Pointer);
        assert!(matches!(
            "audio".parse::<PayloadKind>(),
            Err(ComputeError::UnknownPayloadKind(_))
        ));
    }

    #[test]
    fn test_pointer_telemetry_deserialization() {
        let json = r#"{
            "movements": [
                { "x": 0, "y": 0, "timestampMillis": 0, "questionId": "" },
                { "x": 10.5, "y": 3, "timestampMillis": 16, "questionId": "q1", "targetId": "submit" }
            ],
            "interactions": [
                {
                    "targetId": "submit", "targetType": "button", "questionId": "q1",
                    "clickX": 11, "clickY": 4, "targetX": 12, "targetY": 4,
                    "targetWidth": 80, "targetHeight": 30, "timestampMillis": 20
                }
            ]
        }"#;

        let telemetry: PointerTelemetry = serde_json::from_str(json).unwrap();
        assert_eq!(telemetry.movements.len(), 2);
        assert_eq!(telemetry.movements[0].question_id, None);
        assert_eq!(telemetry.movements[1].question_id.as_deref(), Some("q1"));
        assert_eq!(telemetry.interactions[0].target_width, Some(80.0));
        assert_eq!(telemetry.interactions[0].normalized_distance, None);
    }

    #[test]
    fn test_key_event_deserialization() {
        let json = r#"{ "events": [
            { "type": "keydown", "key": "a", "isModifier": false, "timestampMillis": 5, "questionId": "q1" },
            { "type": "keyup", "key": "Shift", "isModifier": true, "timestampMillis": 9 }
        ] }"#;

        let telemetry: KeyTelemetry = serde_json::from_str(json).unwrap();
        assert_eq!(telemetry.events[0].event_type, KeyEventType::Keydown);
        assert_eq!(telemetry.events[1].event_type, KeyEventType::Keyup);
        assert!(telemetry.events[1].is_modifier);
        assert_eq!(telemetry.events[1].question_id, None);
    }

    #[test]
    fn test_sustained_attention_log_accepts_numeric_ids() {
        let json = r#"{
            "testStartTimeMillis": 1000,
            "testEndTimeMillis": 5000,
            "eventLog": [
                { "type": "stimulus", "stimulusId": 7, "isTarget": true, "timestampMillis": 1100 },
                { "type": "response", "stimulusId": "7", "timestampMillis": 1450 },
                { "type": "response", "timestampMillis": 1900 }
            ]
        }"#;

        let raw: SustainedAttentionRaw = serde_json::from_str(json).unwrap();
        assert_eq!(raw.event_log.len(), 3);
        match &raw.event_log[0] {
            SustainedAttentionEvent::Stimulus { stimulus_id, .. } => assert_eq!(stimulus_id, "7"),
            other => panic!("unexpected event {other:?}"),
        }
        match &raw.event_log[2] {
            SustainedAttentionEvent::Response { stimulus_id, .. } => assert!(stimulus_id.is_none()),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_graph_and_span_logs() {
        let graph: GraphTestRaw = serde_json::from_str(
            r#"{ "testStartTimeMillis": 1, "testEndTimeMillis": 2, "eventLog": [
                { "part": 1, "type": "partStart", "timestampMillis": 1 },
                { "part": 1, "type": "nodeConnected", "nodeIndex": 3, "timestampMillis": 2 }
            ] }"#,
        )
        .unwrap();
        assert_eq!(graph.event_log[1].kind, GraphEventKind::NodeConnected);
        assert_eq!(graph.event_log[1].node_index, Some(3));

        let span: SpanTestRaw = serde_json::from_str(
            r#"{ "testStartTimeMillis": 1, "testEndTimeMillis": 2, "eventLog": [
                { "spanLength": 3, "presented": [1, 2, 3], "response": [1, 2, 3] },
                { "spanLength": 3, "direction": "backward", "correct": false }
            ] }"#,
        )
        .unwrap();
        assert_eq!(span.event_log[0].direction, SpanDirection::Forward);
        assert_eq!(span.event_log[1].direction, SpanDirection::Backward);
        assert_eq!(span.event_log[1].correct, Some(false));
    }

    #[test]
    fn test_missing_envelope_defaults_to_not_attempted() {
        let raw: SustainedAttentionRaw = serde_json::from_str("{}").unwrap();
        assert!(raw.window().is_not_attempted());
        assert!(raw.event_log.is_empty());
    }

    #[test]
    fn test_validate_rejects_negative_timestamps() {
        let payload = RawPayload::Keyboard(KeyTelemetry {
            events: vec![KeyEvent {
                event_type: KeyEventType::Keydown,
                key: "a".to_string(),
                is_modifier: false,
                timestamp_millis: -5,
                question_id: None,
            }],
        });
        assert!(matches!(
            payload.validate(),
            Err(ComputeError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_coordinates() {
        let far = r#"{
            "movements": [
                { "x": 0, "y": 0, "timestampMillis": 0 },
                { "x": 1e200, "y": 0, "timestampMillis": 1000 }
            ]
        }"#;
        let payload = RawPayload::Pointer(serde_json::from_str(far).unwrap());
        assert!(matches!(
            payload.validate(),
            Err(ComputeError::InvalidPayload { .. })
        ));

        let huge_target = r#"{
            "interactions": [{
                "targetId": "b", "targetType": "button",
                "clickX": 0, "clickY": 0, "targetX": 0, "targetY": 0,
                "targetWidth": 1e12, "targetHeight": 10,
                "timestampMillis": 0
            }]
        }"#;
        let payload = RawPayload::Pointer(serde_json::from_str(huge_target).unwrap());
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_window_and_bad_part() {
        let inverted = RawPayload::GraphTest(GraphTestRaw {
            test_start_time_millis: 5000,
            test_end_time_millis: 1000,
            event_log: vec![],
        });
        assert!(inverted.validate().is_err());
        assert_eq!(inverted.window(), Some(TestWindow::new(5000, 1000)));

        let bad_part = RawPayload::GraphTest(GraphTestRaw {
            test_start_time_millis: 1000,
            test_end_time_millis: 5000,
            event_log: vec![GraphTestEvent {
                part: 3,
                kind: GraphEventKind::PartStart,
                node_index: None,
                timestamp_millis: 1000,
            }],
        });
        assert!(bad_part.validate().is_err());
    }
}
