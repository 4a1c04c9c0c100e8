//! Metric record assembly
//!
//! Flattens calculator output into storage-facing [`MetricEntry`] records,
//! split into the global collection and the per-question collection. No
//! computation happens here; the assembler only tags scopes and enforces the
//! record contract (one value per key and scope, sane sample sizes).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::error::ComputeError;
use crate::keyboard::KeyboardMetrics;
use crate::pointer::PointerMetrics;
use crate::types::{MetricEntry, MetricKey, MetricValue, Scope};

/// Assembled metric records, ready for persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledMetrics {
    pub global: Vec<MetricEntry>,
    pub per_question: Vec<MetricEntry>,
}

impl AssembledMetrics {
    /// All entries, global first.
    pub fn entries(&self) -> impl Iterator<Item = &MetricEntry> {
        self.global.iter().chain(self.per_question.iter())
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.per_question.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.per_question.is_empty()
    }

    /// Look up one metric by scope and key.
    pub fn get(&self, scope: &Scope, key: MetricKey) -> Option<MetricValue> {
        let bucket = if scope.is_global() {
            &self.global
        } else {
            &self.per_question
        };
        bucket
            .iter()
            .find(|e| e.question_id == scope.storage_id() && e.metric_key == key.as_str())
            .map(MetricEntry::metric_value)
    }

    /// Rebuild from stored entries, re-checking the record contract.
    pub fn from_entries<I>(entries: I) -> Result<Self, ComputeError>
    where
        I: IntoIterator<Item = MetricEntry>,
    {
        let mut collector = MetricCollector::new();
        for entry in entries {
            collector.push_entry(entry)?;
        }
        Ok(collector.finish())
    }
}

/// Accumulates entries while enforcing per-scope key uniqueness.
#[derive(Debug, Default)]
pub struct MetricCollector {
    global: Vec<MetricEntry>,
    per_question: Vec<MetricEntry>,
    seen: HashSet<(String, String)>,
}

impl MetricCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typed metric under `scope`.
    pub fn push(
        &mut self,
        scope: &Scope,
        key: MetricKey,
        value: MetricValue,
    ) -> Result<(), ComputeError> {
        self.push_entry(MetricEntry::new(scope, key.as_str(), value))
    }

    /// Add a flat entry. Duplicate (scope, key) pairs are rejected.
    pub fn push_entry(&mut self, entry: MetricEntry) -> Result<(), ComputeError> {
        let scope = entry.scope();
        if entry.calculated && entry.sample_size == 0 {
            return Err(violation(ComputeError::InvalidMetric {
                scope: scope.to_string(),
                key: entry.metric_key,
                reason: "calculated with a sample size of 0".to_string(),
            }));
        }
        if !entry.value.is_finite() {
            return Err(violation(ComputeError::InvalidMetric {
                scope: scope.to_string(),
                key: entry.metric_key,
                reason: format!("non-finite value {}", entry.value),
            }));
        }

        let slot = (entry.question_id.clone(), entry.metric_key.clone());
        if !self.seen.insert(slot) {
            return Err(violation(ComputeError::DuplicateMetricKey {
                scope: scope.to_string(),
                key: entry.metric_key,
            }));
        }

        if scope.is_global() {
            self.global.push(entry);
        } else {
            self.per_question.push(entry);
        }
        Ok(())
    }

    pub fn finish(self) -> AssembledMetrics {
        AssembledMetrics {
            global: self.global,
            per_question: self.per_question,
        }
    }
}

fn violation(err: ComputeError) -> ComputeError {
    tracing::error!(error = %err, "metric record contract violated");
    err
}

/// Assemble pointer and keyboard metrics into global and per-question records.
///
/// Per-question records are grouped by question id (sorted), pointer metrics
/// before keyboard metrics within each question.
pub fn assemble(
    pointer: &PointerMetrics,
    keyboard: &KeyboardMetrics,
) -> Result<AssembledMetrics, ComputeError> {
    let mut collector = MetricCollector::new();

    let global = Scope::Global;
    for (key, value) in pointer.global.entries() {
        collector.push(&global, key, value)?;
    }
    for (key, value) in keyboard.global.entries() {
        collector.push(&global, key, value)?;
    }

    let question_ids: BTreeSet<&String> = pointer
        .per_question
        .keys()
        .chain(keyboard.per_question.keys())
        .collect();

    for id in question_ids {
        let scope = Scope::from_question_id(Some(id.as_str()));
        if scope.is_global() {
            continue;
        }
        if let Some(metrics) = pointer.per_question.get(id) {
            for (key, value) in metrics.entries() {
                collector.push(&scope, key, value)?;
            }
        }
        if let Some(metrics) = keyboard.per_question.get(id) {
            for (key, value) in metrics.entries() {
                collector.push(&scope, key, value)?;
            }
        }
    }

    Ok(collector.finish())
}
