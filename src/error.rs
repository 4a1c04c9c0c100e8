//! Error types for Synheart Cognition

use thiserror::Error;

/// Errors that can occur during computation.
///
/// Insufficient data is not represented here: it travels as
/// [`MetricValue::Insufficient`](crate::types::MetricValue) or as an absent
/// test result.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("Unknown payload kind: {0}")]
    UnknownPayloadKind(String),

    #[error("Duplicate metric key '{key}' in scope '{scope}'")]
    DuplicateMetricKey { scope: String, key: String },

    #[error("Invalid metric '{key}' in scope '{scope}': {reason}")]
    InvalidMetric {
        scope: String,
        key: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ComputeError {
    /// Whether this error is an internal contract violation rather than bad input.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ComputeError::DuplicateMetricKey { .. } | ComputeError::InvalidMetric { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violation_classification() {
        let dup = ComputeError::DuplicateMetricKey {
            scope: "q1".to_string(),
            key: "click_precision".to_string(),
        };
        assert!(dup.is_contract_violation());
        assert_eq!(
            dup.to_string(),
            "Duplicate metric key 'click_precision' in scope 'q1'"
        );

        let parse = ComputeError::ParseError("bad".to_string());
        assert!(!parse.is_contract_violation());
    }
}
