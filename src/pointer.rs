//! Pointer and interaction metrics
//!
//! Computes click precision, path efficiency, overshoot rate, average velocity
//! and velocity variability from pointer movement samples and click events.
//! Every metric is produced once for the whole session and once per question.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{EngineConfig, FallbackValues, PointerConfig};
use crate::payload::{InteractionEvent, MovementSample, PointerTelemetry};
use crate::stats::{self, distance};
use crate::types::{MetricKey, MetricValue};

/// Pointer metrics for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerScopeMetrics {
    pub click_precision: MetricValue,
    pub path_efficiency: MetricValue,
    pub overshoot_rate: MetricValue,
    /// px per second
    pub average_velocity: MetricValue,
    /// Coefficient of variation of instantaneous velocity
    pub velocity_variability: MetricValue,
}

impl PointerScopeMetrics {
    pub fn entries(&self) -> Vec<(MetricKey, MetricValue)> {
        vec![
            (MetricKey::ClickPrecision, self.click_precision),
            (MetricKey::PathEfficiency, self.path_efficiency),
            (MetricKey::OvershootRate, self.overshoot_rate),
            (MetricKey::AverageVelocity, self.average_velocity),
            (MetricKey::VelocityVariability, self.velocity_variability),
        ]
    }
}

/// Pointer metrics for the session and each question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerMetrics {
    pub global: PointerScopeMetrics,
    pub per_question: BTreeMap<String, PointerScopeMetrics>,
}

/// The path the pointer took towards one interaction target.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproachPath {
    pub points: Vec<(f64, f64)>,
    pub target: (f64, f64),
}

impl ApproachPath {
    pub fn start(&self) -> Option<(f64, f64)> {
        self.points.first().copied()
    }

    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|p| distance(p[0], p[1])).sum()
    }

    pub fn straight_distance(&self) -> f64 {
        self.start().map_or(0.0, |s| distance(s, self.target))
    }

    /// Whether efficiency and reversals can be measured on this path.
    pub fn is_measurable(&self) -> bool {
        self.points.len() >= 2 && self.length() > 0.0 && self.straight_distance() > 0.0
    }

    /// Straight-line distance over travelled distance, capped at 1.0.
    pub fn efficiency(&self) -> f64 {
        (self.straight_distance() / self.length()).min(1.0)
    }

    /// Steps where progress along the start→target axis turns from
    /// forwards to backwards.
    pub fn reversals(&self) -> u32 {
        let Some(start) = self.start() else {
            return 0;
        };
        let straight = self.straight_distance();
        if straight <= 0.0 {
            return 0;
        }
        let axis = (
            (self.target.0 - start.0) / straight,
            (self.target.1 - start.1) / straight,
        );

        let mut reversals = 0;
        let mut last_sign = 0.0f64;
        for pair in self.points.windows(2) {
            let progress = (pair[1].0 - pair[0].0) * axis.0 + (pair[1].1 - pair[0].1) * axis.1;
            if progress == 0.0 {
                continue;
            }
            let sign = progress.signum();
            if last_sign > 0.0 && sign < 0.0 {
                reversals += 1;
            }
            last_sign = sign;
        }
        reversals
    }
}

/// Pointer/interaction metrics calculator.
#[derive(Debug, Clone, Default)]
pub struct PointerCalculator {
    config: PointerConfig,
    fallbacks: FallbackValues,
}

impl PointerCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.pointer.clone(),
            fallbacks: config.fallbacks.clone(),
        }
    }

    /// Compute global and per-question pointer metrics.
    pub fn compute(&self, telemetry: &PointerTelemetry) -> PointerMetrics {
        let movements: Vec<&MovementSample> = telemetry.movements.iter().collect();
        let interactions: Vec<&InteractionEvent> = telemetry.interactions.iter().collect();
        let global = self.compute_scope(movements, interactions);

        let mut groups: BTreeMap<&str, (Vec<&MovementSample>, Vec<&InteractionEvent>)> =
            BTreeMap::new();
        for sample in &telemetry.movements {
            if let Some(id) = sample.question_id.as_deref() {
                groups.entry(id).or_default().0.push(sample);
            }
        }
        for event in &telemetry.interactions {
            if let Some(id) = event.question_id.as_deref() {
                groups.entry(id).or_default().1.push(event);
            }
        }

        let per_question = groups
            .into_iter()
            .map(|(id, (movements, interactions))| {
                (id.to_string(), self.compute_scope(movements, interactions))
            })
            .collect();

        PointerMetrics {
            global,
            per_question,
        }
    }

    fn compute_scope(
        &self,
        mut movements: Vec<&MovementSample>,
        mut interactions: Vec<&InteractionEvent>,
    ) -> PointerScopeMetrics {
        movements.sort_by_key(|m| m.timestamp_millis);
        interactions.sort_by_key(|e| e.timestamp_millis);

        // Click precision
        let distances: Vec<f64> = interactions
            .iter()
            .map(|e| normalized_distance(e, self.config.default_reference_scale))
            .collect();
        let click_precision = match click_precision(&distances) {
            Some(p) => MetricValue::calculated(p, distances.len() as u32),
            None => MetricValue::insufficient(self.fallbacks.click_precision),
        };

        // Path efficiency and overshoot
        let paths: Vec<ApproachPath> = approach_paths(&movements, &interactions)
            .into_iter()
            .filter(ApproachPath::is_measurable)
            .collect();
        let (path_efficiency, overshoot_rate) = if paths.is_empty() {
            (
                MetricValue::insufficient(self.fallbacks.path_efficiency),
                MetricValue::insufficient(self.fallbacks.overshoot_rate),
            )
        } else {
            let n = paths.len() as f64;
            let efficiency = paths.iter().map(ApproachPath::efficiency).sum::<f64>() / n;
            let overshoots = paths.iter().filter(|p| p.reversals() > 0).count() as f64;
            (
                MetricValue::calculated(efficiency, paths.len() as u32),
                MetricValue::calculated(overshoots / n, paths.len() as u32),
            )
        };

        // Velocity
        let velocities = velocities(&movements);
        let enough_samples = movements.len() >= self.config.min_velocity_samples;
        let average_velocity = match stats::mean(&velocities) {
            Some(mean) if enough_samples => MetricValue::calculated(mean, velocities.len() as u32),
            _ => MetricValue::insufficient(self.fallbacks.average_velocity),
        };
        let velocity_variability = match stats::coefficient_of_variation(&velocities) {
            Some(cv) if enough_samples => MetricValue::calculated(cv, velocities.len() as u32),
            _ => MetricValue::insufficient(self.fallbacks.velocity_variability),
        };

        PointerScopeMetrics {
            click_precision,
            path_efficiency,
            overshoot_rate,
            average_velocity,
            velocity_variability,
        }
    }
}

/// Click-to-target distance relative to the target size.
///
/// A producer-supplied normalized distance wins. Otherwise the target's
/// bounding-box diagonal is the reference scale, or `default_scale` when the
/// target has no usable size.
pub fn normalized_distance(event: &InteractionEvent, default_scale: f64) -> f64 {
    if let Some(d) = event.normalized_distance {
        return d;
    }
    let scale = match (event.target_width, event.target_height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => w.hypot(h),
        _ => default_scale,
    };
    distance(event.click_point(), event.target_point()) / scale
}

/// Mean of `1 - min(d, 1)` over normalized distances.
pub fn click_precision(normalized_distances: &[f64]) -> Option<f64> {
    let scores: Vec<f64> = normalized_distances
        .iter()
        .map(|d| 1.0 - d.clamp(0.0, 1.0))
        .collect();
    stats::mean(&scores)
}

/// Instantaneous velocities (px/s) between consecutive samples.
///
/// Pairs with a non-positive time delta are skipped.
pub fn velocities(samples: &[&MovementSample]) -> Vec<f64> {
    samples
        .windows(2)
        .filter_map(|pair| {
            let dt_ms = pair[1].timestamp_millis - pair[0].timestamp_millis;
            if dt_ms <= 0 {
                return None;
            }
            let d = distance((pair[0].x, pair[0].y), (pair[1].x, pair[1].y));
            Some(d / (dt_ms as f64 / 1000.0))
        })
        .collect()
}

/// Build the approach path of every interaction that has movement data.
///
/// A path starts at the previous interaction's click point (or the first
/// movement sample for the first interaction), follows every sample recorded
/// after the previous interaction up to this one, and ends at the click.
/// Interactions with no samples since the previous one get no path.
/// Both slices must be sorted by timestamp.
pub fn approach_paths(
    movements: &[&MovementSample],
    interactions: &[&InteractionEvent],
) -> Vec<ApproachPath> {
    let mut paths = Vec::with_capacity(interactions.len());
    let mut previous_click: Option<(f64, f64)> = None;
    let mut cursor = 0;

    for interaction in interactions {
        let mut points: Vec<(f64, f64)> = previous_click.into_iter().collect();
        let first_sample = cursor;
        while cursor < movements.len()
            && movements[cursor].timestamp_millis <= interaction.timestamp_millis
        {
            points.push((movements[cursor].x, movements[cursor].y));
            cursor += 1;
        }
        previous_click = Some(interaction.click_point());
        if cursor == first_sample {
            continue;
        }
        points.push(interaction.click_point());

        paths.push(ApproachPath {
            points,
            target: interaction.target_point(),
        });
    }

    paths
}
