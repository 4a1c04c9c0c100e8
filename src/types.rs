//! Core metric types shared by every calculator.
//!
//! A derived measurement is carried as a [`MetricValue`], which keeps
//! "measured zero" and "not enough data" apart at the type level. At the
//! storage boundary it is flattened into a [`MetricEntry`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ComputeError;

/// Scope a metric was computed over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The whole assessment
    Global,
    /// A single form field ("question")
    Question(String),
}

impl Scope {
    /// Build a scope from an optional question id. Empty ids are global.
    pub fn from_question_id(question_id: Option<&str>) -> Self {
        match question_id {
            Some(id) if !id.is_empty() => Scope::Question(id.to_string()),
            _ => Scope::Global,
        }
    }

    /// Question id as stored: empty string for the global scope.
    pub fn storage_id(&self) -> &str {
        match self {
            Scope::Global => "",
            Scope::Question(id) => id.as_str(),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Question(id) => write!(f, "question:{id}"),
        }
    }
}

/// Catalogue of interaction metrics produced by the calculators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    // Pointer
    ClickPrecision,
    PathEfficiency,
    OvershootRate,
    AverageVelocity,
    VelocityVariability,

    // Keyboard
    TypingSpeed,
    InterKeyInterval,
    TypingRhythmVariability,
    KeyHoldTime,
    KeyPressVariability,
    CorrectionRate,
    PauseRate,
    DeepThinkingPauseRate,
    KeyboardFluency,
}

impl MetricKey {
    pub const POINTER: [MetricKey; 5] = [
        MetricKey::ClickPrecision,
        MetricKey::PathEfficiency,
        MetricKey::OvershootRate,
        MetricKey::AverageVelocity,
        MetricKey::VelocityVariability,
    ];

    pub const KEYBOARD: [MetricKey; 9] = [
        MetricKey::TypingSpeed,
        MetricKey::InterKeyInterval,
        MetricKey::TypingRhythmVariability,
        MetricKey::KeyHoldTime,
        MetricKey::KeyPressVariability,
        MetricKey::CorrectionRate,
        MetricKey::PauseRate,
        MetricKey::DeepThinkingPauseRate,
        MetricKey::KeyboardFluency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::ClickPrecision => "click_precision",
            MetricKey::PathEfficiency => "path_efficiency",
            MetricKey::OvershootRate => "overshoot_rate",
            MetricKey::AverageVelocity => "average_velocity",
            MetricKey::VelocityVariability => "velocity_variability",
            MetricKey::TypingSpeed => "typing_speed",
            MetricKey::InterKeyInterval => "inter_key_interval",
            MetricKey::TypingRhythmVariability => "typing_rhythm_variability",
            MetricKey::KeyHoldTime => "key_hold_time",
            MetricKey::KeyPressVariability => "key_press_variability",
            MetricKey::CorrectionRate => "correction_rate",
            MetricKey::PauseRate => "pause_rate",
            MetricKey::DeepThinkingPauseRate => "deep_thinking_pause_rate",
            MetricKey::KeyboardFluency => "keyboard_fluency",
        }
    }

    /// Unit the value is expressed in, for display.
    pub fn unit(&self) -> &'static str {
        match self {
            MetricKey::AverageVelocity => "px/s",
            MetricKey::TypingSpeed => "keys/min",
            MetricKey::InterKeyInterval | MetricKey::KeyHoldTime => "ms",
            _ => "ratio",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::POINTER
            .iter()
            .chain(MetricKey::KEYBOARD.iter())
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| ComputeError::ParseError(format!("Unknown metric key: {s}")))
    }
}

/// Outcome of a single metric computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricValue {
    /// Measured over `sample_size` observations
    Calculated { value: f64, sample_size: u32 },
    /// Too little data; `fallback` is the documented placeholder to store
    Insufficient { fallback: f64 },
}

impl MetricValue {
    pub fn calculated(value: f64, sample_size: u32) -> Self {
        MetricValue::Calculated { value, sample_size }
    }

    pub fn insufficient(fallback: f64) -> Self {
        MetricValue::Insufficient { fallback }
    }

    /// Measured value, `None` when insufficient.
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Calculated { value, .. } => Some(*value),
            MetricValue::Insufficient { .. } => None,
        }
    }

    pub fn is_calculated(&self) -> bool {
        matches!(self, MetricValue::Calculated { .. })
    }

    pub fn sample_size(&self) -> u32 {
        match self {
            MetricValue::Calculated { sample_size, .. } => *sample_size,
            MetricValue::Insufficient { .. } => 0,
        }
    }

    /// Value written to storage: the measurement or the fallback.
    pub fn stored_value(&self) -> f64 {
        match self {
            MetricValue::Calculated { value, .. } => *value,
            MetricValue::Insufficient { fallback } => *fallback,
        }
    }
}

/// Flat, storage-facing metric record.
///
/// `calculated == false` (or `sample_size == 0`) means "insufficient data";
/// `value` then holds a fallback, not a measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEntry {
    /// Empty string for global metrics
    pub question_id: String,
    pub metric_key: String,
    pub value: f64,
    pub sample_size: u32,
    pub calculated: bool,
}

impl MetricEntry {
    pub fn new(scope: &Scope, key: &str, metric: MetricValue) -> Self {
        Self {
            question_id: scope.storage_id().to_string(),
            metric_key: key.to_string(),
            value: metric.stored_value(),
            sample_size: metric.sample_size(),
            calculated: metric.is_calculated(),
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::from_question_id(Some(self.question_id.as_str()))
    }

    /// Read the entry back as a typed value.
    pub fn metric_value(&self) -> MetricValue {
        if self.calculated && self.sample_size > 0 {
            MetricValue::calculated(self.value, self.sample_size)
        } else {
            MetricValue::insufficient(self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_question_id() {
        assert_eq!(Scope::from_question_id(None), Scope::Global);
        assert_eq!(Scope::from_question_id(Some("")), Scope::Global);
        assert_eq!(
            Scope::from_question_id(Some("q7")),
            Scope::Question("q7".to_string())
        );
        assert_eq!(Scope::Global.storage_id(), "");
    }

    #[test]
    fn test_metric_key_round_trip_names() {
        for key in MetricKey::POINTER.iter().chain(MetricKey::KEYBOARD.iter()) {
            let parsed: MetricKey = key.as_str().parse().unwrap();
            assert_eq!(parsed, *key);

            let json = serde_json::to_string(key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
        assert!("not_a_metric".parse::<MetricKey>().is_err());
    }

    #[test]
    fn test_insufficient_entry_is_distinct_from_zero() {
        let zero = MetricEntry::new(
            &Scope::Global,
            "overshoot_rate",
            MetricValue::calculated(0.0, 4),
        );
        let missing = MetricEntry::new(
            &Scope::Global,
            "overshoot_rate",
            MetricValue::insufficient(0.0),
        );

        assert_eq!(zero.value, missing.value);
        assert_ne!(zero, missing);
        assert!(zero.metric_value().is_calculated());
        assert!(!missing.metric_value().is_calculated());
        assert_eq!(missing.sample_size, 0);
    }

    #[test]
    fn test_zero_sample_size_reads_back_as_insufficient() {
        let entry = MetricEntry {
            question_id: "q1".to_string(),
            metric_key: "pause_rate".to_string(),
            value: 0.0,
            sample_size: 0,
            calculated: true,
        };
        assert_eq!(entry.metric_value(), MetricValue::insufficient(0.0));
    }

    #[test]
    fn test_metric_entry_serialization() {
        let entry = MetricEntry::new(
            &Scope::Question("q2".to_string()),
            "click_precision",
            MetricValue::calculated(0.75, 3),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["questionId"], "q2");
        assert_eq!(json["metricKey"], "click_precision");
        assert_eq!(json["sampleSize"], 3);
        assert_eq!(json["calculated"], true);
    }
}
