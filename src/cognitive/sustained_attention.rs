//! Sustained-attention test scoring
//!
//! Each stimulus is classified by the responses attributed to it:
//!
//! | Stimulus   | Responded        | Outcome           |
//! |------------|------------------|-------------------|
//! | target     | yes              | correct detection |
//! | target     | no               | omission error    |
//! | non-target | yes              | commission error  |
//! | non-target | no               | correct rejection |
//!
//! Responses faster than the configured minimum reaction time are
//! anticipations: they never count as detections, but they do count as a
//! response to a non-target.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::cognitive::TestWindow;
use crate::config::EngineConfig;
use crate::payload::{SustainedAttentionEvent, SustainedAttentionRaw};
use crate::stats;
use crate::types::MetricValue;

/// Scored sustained-attention test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SustainedAttentionResult {
    pub window: TestWindow,
    pub targets: u32,
    pub non_targets: u32,
    pub correct_detections: u32,
    pub commission_errors: u32,
    pub omission_errors: u32,
    pub correct_rejections: u32,
    pub anticipations: u32,
    /// Responses that could not be attributed to any stimulus
    pub unattributed_responses: u32,
    /// Mean reaction time over correct detections (ms)
    pub average_reaction_time_ms: MetricValue,
    pub reaction_time_std_dev_ms: MetricValue,
    /// correct / (correct + omissions)
    pub detection_rate: MetricValue,
    /// omissions / (correct + omissions)
    pub omission_error_rate: MetricValue,
    /// commissions / non-targets
    pub commission_error_rate: MetricValue,
}

struct StimulusRecord {
    is_target: bool,
    shown_at: i64,
    reaction_times: Vec<f64>,
}

/// Score a sustained-attention log. `None` when the test was not attempted.
pub fn score_sustained_attention(
    raw: &SustainedAttentionRaw,
    config: &EngineConfig,
) -> Option<SustainedAttentionResult> {
    let window = raw.window();
    if window.is_not_attempted() {
        tracing::debug!("sustained-attention test not attempted");
        return None;
    }

    let mut events: Vec<&SustainedAttentionEvent> = raw.event_log.iter().collect();
    events.sort_by_key(|e| e.timestamp_millis());

    let mut stimuli: Vec<StimulusRecord> = Vec::new();
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    let mut unattributed_responses = 0u32;

    for event in events {
        match event {
            SustainedAttentionEvent::Stimulus {
                stimulus_id,
                is_target,
                timestamp_millis,
            } => {
                by_id.insert(stimulus_id.as_str(), stimuli.len());
                stimuli.push(StimulusRecord {
                    is_target: *is_target,
                    shown_at: *timestamp_millis,
                    reaction_times: Vec::new(),
                });
            }
            SustainedAttentionEvent::Response {
                stimulus_id,
                timestamp_millis,
            } => {
                let index = match stimulus_id {
                    Some(id) => by_id.get(id.as_str()).copied(),
                    None => stimuli.len().checked_sub(1),
                };
                match index.map(|i| &mut stimuli[i]) {
                    Some(stimulus) if *timestamp_millis >= stimulus.shown_at => {
                        stimulus
                            .reaction_times
                            .push((*timestamp_millis - stimulus.shown_at) as f64);
                    }
                    _ => unattributed_responses += 1,
                }
            }
        }
    }

    let mut correct_detections = 0u32;
    let mut omission_errors = 0u32;
    let mut commission_errors = 0u32;
    let mut correct_rejections = 0u32;
    let mut anticipations = 0u32;
    let mut detection_times: Vec<f64> = Vec::new();

    for stimulus in &stimuli {
        let anticipated = stimulus
            .reaction_times
            .iter()
            .filter(|&&rt| rt < config.cognitive.min_reaction_time_ms)
            .count() as u32;
        anticipations += anticipated;

        let first_valid = stimulus
            .reaction_times
            .iter()
            .copied()
            .find(|&rt| rt >= config.cognitive.min_reaction_time_ms);

        match (stimulus.is_target, first_valid) {
            (true, Some(rt)) => {
                correct_detections += 1;
                detection_times.push(rt);
            }
            (true, None) => omission_errors += 1,
            (false, _) if !stimulus.reaction_times.is_empty() => commission_errors += 1,
            (false, _) => correct_rejections += 1,
        }
    }

    let fallback = config.fallbacks.cognitive;
    let targets = correct_detections + omission_errors;
    let non_targets = commission_errors + correct_rejections;

    let average_reaction_time_ms = match stats::mean(&detection_times) {
        Some(mean) => MetricValue::calculated(mean, correct_detections),
        None => MetricValue::insufficient(fallback),
    };
    let reaction_time_std_dev_ms = match stats::std_dev(&detection_times) {
        Some(sd) if detection_times.len() >= 2 => MetricValue::calculated(sd, correct_detections),
        _ => MetricValue::insufficient(fallback),
    };

    tracing::debug!(
        targets,
        non_targets,
        correct_detections,
        commission_errors,
        omission_errors,
        "scored sustained-attention test"
    );

    Some(SustainedAttentionResult {
        window,
        targets,
        non_targets,
        correct_detections,
        commission_errors,
        omission_errors,
        correct_rejections,
        anticipations,
        unattributed_responses,
        average_reaction_time_ms,
        reaction_time_std_dev_ms,
        detection_rate: rate(correct_detections, targets, fallback),
        omission_error_rate: rate(omission_errors, targets, fallback),
        commission_error_rate: rate(commission_errors, non_targets, fallback),
    })
}

fn rate(count: u32, denominator: u32, fallback: f64) -> MetricValue {
    if denominator == 0 {
        return MetricValue::insufficient(fallback);
    }
    MetricValue::calculated(count as f64 / denominator as f64, denominator)
}
