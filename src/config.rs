//! Engine configuration.
//!
//! Every tunable constant of the calculators lives here with a documented
//! default. Configuration is plain serde data and can be loaded from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ComputeError;

/// Top-level configuration for [`CognitionEngine`](crate::pipeline::CognitionEngine).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pointer: PointerConfig,
    pub keyboard: KeyboardConfig,
    pub cognitive: CognitiveConfig,
    pub fallbacks: FallbackValues,
}

/// Pointer calculator tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    /// Distance (px) that maps to a normalized distance of 1.0 when the
    /// target carries no bounding box
    pub default_reference_scale: f64,
    /// Minimum movement samples required for velocity metrics
    pub min_velocity_samples: usize,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            default_reference_scale: 100.0,
            min_velocity_samples: 2,
        }
    }
}

/// Relative weights of the keyboard fluency composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluencyWeights {
    pub speed: f64,
    pub rhythm: f64,
    pub accuracy: f64,
}

impl Default for FluencyWeights {
    fn default() -> Self {
        Self {
            speed: 0.4,
            rhythm: 0.3,
            accuracy: 0.3,
        }
    }
}

impl FluencyWeights {
    pub fn total(&self) -> f64 {
        self.speed + self.rhythm + self.accuracy
    }
}

/// Keyboard calculator tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Inter-key interval (ms) above which a gap counts as a pause
    pub pause_threshold_ms: f64,
    /// Inter-key interval (ms) above which a gap counts as a deep-thinking pause
    pub deep_pause_threshold_ms: f64,
    /// Typing speed (keys/min) treated as fully fluent
    pub fluency_reference_speed_kpm: f64,
    pub fluency_weights: FluencyWeights,
    /// Holds longer than this (ms) are discarded as stuck keys
    pub max_hold_time_ms: f64,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            pause_threshold_ms: 2000.0,
            deep_pause_threshold_ms: 5000.0,
            fluency_reference_speed_kpm: 200.0,
            fluency_weights: FluencyWeights::default(),
            max_hold_time_ms: 2000.0,
        }
    }
}

/// Cognitive test scorer tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitiveConfig {
    /// Responses faster than this (ms) are anticipations, not detections
    pub min_reaction_time_ms: f64,
    /// Failed trials at one span length that end the span test
    pub span_failures_to_stop: u32,
}

impl Default for CognitiveConfig {
    fn default() -> Self {
        Self {
            min_reaction_time_ms: 100.0,
            span_failures_to_stop: 2,
        }
    }
}

/// Placeholder values stored alongside `calculated = false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackValues {
    pub click_precision: f64,
    pub path_efficiency: f64,
    pub overshoot_rate: f64,
    pub average_velocity: f64,
    pub velocity_variability: f64,
    pub keyboard: f64,
    /// Cognitive-test rates, times and accuracies
    pub cognitive: f64,
}

impl Default for FallbackValues {
    fn default() -> Self {
        Self {
            click_precision: 0.0,
            path_efficiency: 1.0,
            overshoot_rate: 0.0,
            average_velocity: 0.0,
            velocity_variability: 0.0,
            keyboard: 0.0,
            cognitive: 0.0,
        }
    }
}

impl EngineConfig {
    /// Parse and validate configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| ComputeError::InvalidConfig(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ComputeError::Io(e.to_string()))?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Reject configurations the calculators cannot work with.
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !is_positive(self.pointer.default_reference_scale) {
            return Err(ComputeError::InvalidConfig(
                "pointer.default_reference_scale must be positive".to_string(),
            ));
        }
        if self.pointer.min_velocity_samples < 2 {
            return Err(ComputeError::InvalidConfig(
                "pointer.min_velocity_samples must be at least 2".to_string(),
            ));
        }

        let kb = &self.keyboard;
        if !is_positive(kb.pause_threshold_ms) {
            return Err(ComputeError::InvalidConfig(
                "keyboard.pause_threshold_ms must be positive".to_string(),
            ));
        }
        if kb.deep_pause_threshold_ms < kb.pause_threshold_ms {
            return Err(ComputeError::InvalidConfig(
                "keyboard.deep_pause_threshold_ms must not be below pause_threshold_ms"
                    .to_string(),
            ));
        }
        if !is_positive(kb.fluency_reference_speed_kpm) {
            return Err(ComputeError::InvalidConfig(
                "keyboard.fluency_reference_speed_kpm must be positive".to_string(),
            ));
        }
        let w = &kb.fluency_weights;
        if w.speed < 0.0 || w.rhythm < 0.0 || w.accuracy < 0.0 || !is_positive(w.total()) {
            return Err(ComputeError::InvalidConfig(
                "keyboard.fluency_weights must be non-negative with a positive sum".to_string(),
            ));
        }
        if !is_positive(kb.max_hold_time_ms) {
            return Err(ComputeError::InvalidConfig(
                "keyboard.max_hold_time_ms must be positive".to_string(),
            ));
        }

        if self.cognitive.min_reaction_time_ms < 0.0 {
            return Err(ComputeError::InvalidConfig(
                "cognitive.min_reaction_time_ms must not be negative".to_string(),
            ));
        }
        if self.cognitive.span_failures_to_stop == 0 {
            return Err(ComputeError::InvalidConfig(
                "cognitive.span_failures_to_stop must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
