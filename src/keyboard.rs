//! Keyboard metrics
//!
//! Rhythm, speed, hold time, corrections and pauses derived from key events.
//! Modifier keys are dropped before anything is measured. Like the pointer
//! metrics, everything is computed for the whole session and per question.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::{EngineConfig, KeyboardConfig};
use crate::payload::{KeyEvent, KeyEventType, KeyTelemetry};
use crate::stats;
use crate::types::{MetricKey, MetricValue};

/// Key names treated as modifiers even when `isModifier` is not set.
pub const MODIFIER_KEYS: [&str; 9] = [
    "Shift", "Control", "Ctrl", "Alt", "AltGraph", "Meta", "OS", "CapsLock", "Fn",
];

/// Keys that undo previous input.
pub const CORRECTION_KEYS: [&str; 2] = ["Backspace", "Delete"];

/// Keyboard metrics for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardScopeMetrics {
    /// keys per minute
    pub typing_speed: MetricValue,
    /// Mean time between keydowns (ms)
    pub inter_key_interval: MetricValue,
    pub typing_rhythm_variability: MetricValue,
    /// Mean keydown→keyup duration (ms)
    pub key_hold_time: MetricValue,
    pub key_press_variability: MetricValue,
    pub correction_rate: MetricValue,
    pub pause_rate: MetricValue,
    pub deep_thinking_pause_rate: MetricValue,
    /// Composite score in [0, 1]
    pub keyboard_fluency: MetricValue,
}

impl KeyboardScopeMetrics {
    fn insufficient(fallback: f64) -> Self {
        let missing = MetricValue::insufficient(fallback);
        Self {
            typing_speed: missing,
            inter_key_interval: missing,
            typing_rhythm_variability: missing,
            key_hold_time: missing,
            key_press_variability: missing,
            correction_rate: missing,
            pause_rate: missing,
            deep_thinking_pause_rate: missing,
            keyboard_fluency: missing,
        }
    }

    pub fn entries(&self) -> Vec<(MetricKey, MetricValue)> {
        vec![
            (MetricKey::TypingSpeed, self.typing_speed),
            (MetricKey::InterKeyInterval, self.inter_key_interval),
            (MetricKey::TypingRhythmVariability, self.typing_rhythm_variability),
            (MetricKey::KeyHoldTime, self.key_hold_time),
            (MetricKey::KeyPressVariability, self.key_press_variability),
            (MetricKey::CorrectionRate, self.correction_rate),
            (MetricKey::PauseRate, self.pause_rate),
            (MetricKey::DeepThinkingPauseRate, self.deep_thinking_pause_rate),
            (MetricKey::KeyboardFluency, self.keyboard_fluency),
        ]
    }
}

/// Keyboard metrics for the session and each question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardMetrics {
    pub global: KeyboardScopeMetrics,
    pub per_question: BTreeMap<String, KeyboardScopeMetrics>,
}

/// Keyboard metrics calculator.
#[derive(Debug, Clone, Default)]
pub struct KeyboardCalculator {
    config: KeyboardConfig,
    fallback: f64,
}

impl KeyboardCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.keyboard.clone(),
            fallback: config.fallbacks.keyboard,
        }
    }

    /// Compute global and per-question keyboard metrics.
    pub fn compute(&self, telemetry: &KeyTelemetry) -> KeyboardMetrics {
        let qualifying: Vec<&KeyEvent> =
            telemetry.events.iter().filter(|e| !is_modifier(e)).collect();

        let mut groups: BTreeMap<&str, Vec<&KeyEvent>> = BTreeMap::new();
        for &event in &qualifying {
            if let Some(id) = event.question_id.as_deref() {
                groups.entry(id).or_default().push(event);
            }
        }

        let global = self.compute_scope(qualifying);
        let per_question = groups
            .into_iter()
            .map(|(id, events)| (id.to_string(), self.compute_scope(events)))
            .collect();

        KeyboardMetrics {
            global,
            per_question,
        }
    }

    fn compute_scope(&self, mut events: Vec<&KeyEvent>) -> KeyboardScopeMetrics {
        if events.len() < 2 {
            return KeyboardScopeMetrics::insufficient(self.fallback);
        }
        events.sort_by_key(|e| e.timestamp_millis);

        let keydowns: Vec<&KeyEvent> = events
            .iter()
            .copied()
            .filter(|e| e.event_type == KeyEventType::Keydown)
            .collect();
        let intervals = keydown_intervals(&keydowns);
        let holds = hold_durations(&events, self.config.max_hold_time_ms);

        let inter_key_interval = self.measure(stats::mean(&intervals), intervals.len());
        let typing_rhythm_variability =
            self.measure(stats::coefficient_of_variation(&intervals), intervals.len());
        let key_hold_time = self.measure(stats::mean(&holds), holds.len());
        let key_press_variability =
            self.measure(stats::coefficient_of_variation(&holds), holds.len());

        // Speed over the span of every qualifying event, keyups included
        let span_ms = match (events.first(), events.last()) {
            (Some(first), Some(last)) => last.timestamp_millis - first.timestamp_millis,
            _ => 0,
        };
        let speed = if span_ms > 0 && !keydowns.is_empty() {
            Some(keydowns.len() as f64 / (span_ms as f64 / 60_000.0))
        } else {
            None
        };
        let typing_speed = self.measure(speed, keydowns.len());

        let corrections = keydowns
            .iter()
            .filter(|e| is_correction_key(&e.key))
            .count();
        let correction_rate = self.measure(ratio(corrections, keydowns.len()), keydowns.len());

        let pauses = intervals
            .iter()
            .filter(|&&i| i > self.config.pause_threshold_ms)
            .count();
        let deep_pauses = intervals
            .iter()
            .filter(|&&i| i > self.config.deep_pause_threshold_ms)
            .count();
        let pause_rate = self.measure(ratio(pauses, intervals.len()), intervals.len());
        let deep_thinking_pause_rate =
            self.measure(ratio(deep_pauses, intervals.len()), intervals.len());

        let keyboard_fluency = match (
            typing_speed.value(),
            typing_rhythm_variability.value(),
            correction_rate.value(),
        ) {
            (Some(speed), Some(cv), Some(correction)) => MetricValue::calculated(
                self.fluency(speed, cv, correction),
                keydowns.len() as u32,
            ),
            _ => MetricValue::insufficient(self.fallback),
        };

        tracing::trace!(
            events = events.len(),
            keydowns = keydowns.len(),
            holds = holds.len(),
            "keyboard scope computed"
        );

        KeyboardScopeMetrics {
            typing_speed,
            inter_key_interval,
            typing_rhythm_variability,
            key_hold_time,
            key_press_variability,
            correction_rate,
            pause_rate,
            deep_thinking_pause_rate,
            keyboard_fluency,
        }
    }

    fn measure(&self, value: Option<f64>, sample_size: usize) -> MetricValue {
        match value {
            Some(v) if sample_size > 0 => MetricValue::calculated(v, sample_size as u32),
            _ => MetricValue::insufficient(self.fallback),
        }
    }

    /// Weighted composite of speed, rhythm regularity and accuracy.
    ///
    /// ```text
    /// speed_score    = min(speed / reference_speed, 1)
    /// rhythm_score   = 1 / (1 + rhythm_cv)
    /// accuracy_score = 1 - correction_rate
    /// fluency        = Σ wᵢ·scoreᵢ / Σ wᵢ
    /// ```
    fn fluency(&self, speed_kpm: f64, rhythm_cv: f64, correction_rate: f64) -> f64 {
        let w = &self.config.fluency_weights;
        let speed_score = (speed_kpm / self.config.fluency_reference_speed_kpm).min(1.0);
        let rhythm_score = 1.0 / (1.0 + rhythm_cv.max(0.0));
        let accuracy_score = 1.0 - correction_rate;

        let combined =
            w.speed * speed_score + w.rhythm * rhythm_score + w.accuracy * accuracy_score;
        (combined / w.total()).clamp(0.0, 1.0)
    }
}

/// Whether an event comes from a modifier key.
pub fn is_modifier(event: &KeyEvent) -> bool {
    event.is_modifier || MODIFIER_KEYS.contains(&event.key.as_str())
}

pub fn is_correction_key(key: &str) -> bool {
    CORRECTION_KEYS.contains(&key)
}

/// Gaps (ms) between consecutive keydowns. Input must be time-sorted.
pub fn keydown_intervals(keydowns: &[&KeyEvent]) -> Vec<f64> {
    keydowns
        .windows(2)
        .map(|pair| (pair[1].timestamp_millis - pair[0].timestamp_millis) as f64)
        .collect()
}

/// Keydown→keyup durations (ms), paired per key case-insensitively.
///
/// Auto-repeat keydowns while a key is held keep the original press time.
/// Unpaired events are ignored, and holds longer than `max_hold_ms` are
/// discarded as stuck keys. Input must be time-sorted.
pub fn hold_durations(events: &[&KeyEvent], max_hold_ms: f64) -> Vec<f64> {
    let mut pressed: HashMap<String, i64> = HashMap::new();
    let mut holds = Vec::new();

    for event in events {
        let key = event.key.to_lowercase();
        match event.event_type {
            KeyEventType::Keydown => {
                pressed.entry(key).or_insert(event.timestamp_millis);
            }
            KeyEventType::Keyup => {
                if let Some(down) = pressed.remove(&key) {
                    let hold = (event.timestamp_millis - down) as f64;
                    if (0.0..=max_hold_ms).contains(&hold) {
                        holds.push(hold);
                    }
                }
            }
        }
    }

    holds
}

fn ratio(count: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(count as f64 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(event_type: KeyEventType, key: &str, t: i64) -> KeyEvent {
        KeyEvent {
            event_type,
            key: key.to_string(),
            is_modifier: false,
            timestamp_millis: t,
            question_id: None,
        }
    }

    fn down(k: &str, t: i64) -> KeyEvent {
        key(KeyEventType::Keydown, k, t)
    }

    fn up(k: &str, t: i64) -> KeyEvent {
        key(KeyEventType::Keyup, k, t)
    }

    fn in_question(mut event: KeyEvent, id: &str) -> KeyEvent {
        event.question_id = Some(id.to_string());
        event
    }

    fn calculator() -> KeyboardCalculator {
        KeyboardCalculator::new(&EngineConfig::default())
    }

    #[test]
    fn test_two_keydowns_without_keyups() {
        let telemetry = KeyTelemetry {
            events: vec![down("a", 1_000), down("b", 1_200)],
        };

        let metrics = calculator().compute(&telemetry).global;
        assert_eq!(metrics.typing_rhythm_variability.value(), Some(0.0));
        assert_eq!(metrics.inter_key_interval.value(), Some(200.0));
        assert!(!metrics.key_hold_time.is_calculated());
        assert!(!metrics.key_press_variability.is_calculated());
        // 2 keys in 200ms
        assert_eq!(metrics.typing_speed.value(), Some(600.0));
    }

    #[test]
    fn test_fewer_than_two_events_is_insufficient() {
        let telemetry = KeyTelemetry {
            events: vec![down("a", 0), down("Shift", 50)],
        };

        let metrics = calculator().compute(&telemetry).global;
        for (key, value) in metrics.entries() {
            assert!(!value.is_calculated(), "{key} should be insufficient");
        }
    }

    #[test]
    fn test_modifiers_are_filtered() {
        let mut flagged = down("x", 100);
        flagged.is_modifier = true;
        let telemetry = KeyTelemetry {
            events: vec![down("a", 0), down("Control", 50), flagged, down("b", 400)],
        };

        let metrics = calculator().compute(&telemetry).global;
        assert_eq!(metrics.inter_key_interval.value(), Some(400.0));
        assert_eq!(metrics.inter_key_interval.sample_size(), 1);
    }

    #[test]
    fn test_hold_pairing() {
        let events = [
            down("a", 0),
            down("a", 30),
            up("A", 100),
            down("b", 200),
            up("b", 5_000),
            up("c", 5_100),
            down("d", 6_000),
            up("d", 6_060),
        ];
        let refs: Vec<&KeyEvent> = events.iter().collect();

        // Repeat keydown keeps the first press, stuck "b" discarded, "c" unpaired
        assert_eq!(hold_durations(&refs, 2_000.0), vec![100.0, 60.0]);
    }

    #[test]
    fn test_corrections_and_pauses() {
        let telemetry = KeyTelemetry {
            events: vec![
                down("h", 0),
                down("i", 200),
                down("Backspace", 2_700),
                down("i", 8_000),
            ],
        };

        let metrics = calculator().compute(&telemetry).global;
        assert_eq!(metrics.correction_rate.value(), Some(0.25));

        // Intervals 200, 2500, 5300: two over 2s, one over 5s
        let pause = metrics.pause_rate.value().unwrap();
        assert!((pause - 2.0 / 3.0).abs() < 1e-9);
        let deep = metrics.deep_thinking_pause_rate.value().unwrap();
        assert!((deep - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_fluency_composite() {
        let calc = calculator();

        // Perfect on every component
        assert!((calc.fluency(400.0, 0.0, 0.0) - 1.0).abs() < 1e-9);

        // Half speed, cv 1, 50% corrections
        let expected = 0.4 * 0.5 + 0.3 * 0.5 + 0.3 * 0.5;
        assert!((calc.fluency(100.0, 1.0, 0.5) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_fluency_is_bounded() {
        let telemetry = KeyTelemetry {
            events: (0..20)
                .map(|i| down(if i % 3 == 0 { "Backspace" } else { "k" }, i * 37 * (i % 4 + 1)))
                .collect(),
        };

        let fluency = calculator().compute(&telemetry).global.keyboard_fluency;
        let value = fluency.value().unwrap();
        assert!((0.0..=1.0).contains(&value));
    }

    #[test]
    fn test_per_question_grouping() {
        let telemetry = KeyTelemetry {
            events: vec![
                in_question(down("a", 0), "q1"),
                in_question(up("a", 80), "q1"),
                in_question(down("b", 300), "q1"),
                in_question(down("c", 1_000), "q2"),
                down("d", 1_500),
            ],
        };

        let metrics = calculator().compute(&telemetry);
        assert_eq!(metrics.per_question.len(), 2);

        let q1 = &metrics.per_question["q1"];
        assert_eq!(q1.key_hold_time.value(), Some(80.0));
        assert_eq!(q1.inter_key_interval.value(), Some(300.0));

        // A single event is not enough
        assert!(!metrics.per_question["q2"].typing_speed.is_calculated());

        assert_eq!(metrics.global.inter_key_interval.sample_size(), 3);
    }
}
