//! Integration tests for the submission pipeline

use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::io::Write;

use synheart_cognition::payload::SpanDirection;
use synheart_cognition::{
    compute_metrics_json, AssembledMetrics, CognitionEngine, ComputeError, MetricKey,
    PayloadKind, Scope, Submission, SubmissionDocument, SubmissionReport,
};

const FIXTURE: &str = include_str!("fixtures/submission.json");

fn process_fixture() -> SubmissionReport {
    let document = SubmissionDocument::from_json(FIXTURE).expect("fixture parses");
    CognitionEngine::default()
        .process_document(&document)
        .expect("fixture processes")
}

fn metric(report: &SubmissionReport, scope: &Scope, key: MetricKey) -> Option<f64> {
    report.metrics().get(scope, key).and_then(|v| v.value())
}

fn approx(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("metric should be calculated");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn zlib(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn plain_sections() -> Vec<(PayloadKind, Vec<u8>)> {
    let document = SubmissionDocument::from_json(FIXTURE).unwrap();
    PayloadKind::ALL
        .into_iter()
        .filter_map(|kind| {
            document
                .section(kind)
                .map(|section| (kind, serde_json::to_vec(section).unwrap()))
        })
        .collect()
}

#[test]
fn test_pointer_metrics_from_fixture() {
    let report = process_fixture();
    let global = Scope::Global;
    let q1 = Scope::Question("q1".to_string());
    let q2 = Scope::Question("q2".to_string());

    // 5px off a 40x30 target: normalized 0.1
    approx(metric(&report, &q2, MetricKey::ClickPrecision), 0.9);
    approx(metric(&report, &global, MetricKey::ClickPrecision), 0.95);

    approx(metric(&report, &q1, MetricKey::PathEfficiency), 1.0);
    approx(metric(&report, &q2, MetricKey::PathEfficiency), 80.0 / 125.0);
    approx(metric(&report, &global, MetricKey::PathEfficiency), (1.0 + 0.64) / 2.0);

    approx(metric(&report, &q1, MetricKey::OvershootRate), 0.0);
    approx(metric(&report, &q2, MetricKey::OvershootRate), 1.0);
    approx(metric(&report, &global, MetricKey::OvershootRate), 0.5);

    approx(metric(&report, &q1, MetricKey::AverageVelocity), 200.0);
    approx(metric(&report, &q1, MetricKey::VelocityVariability), 0.0);
    // 200, 200, 0, 200, 100 px/s across the whole session
    approx(metric(&report, &global, MetricKey::AverageVelocity), 140.0);
}

#[test]
fn test_keyboard_metrics_from_fixture() {
    let report = process_fixture();
    let q3 = Scope::Question("q3".to_string());

    approx(metric(&report, &q3, MetricKey::InterKeyInterval), 300.0);
    approx(metric(&report, &q3, MetricKey::TypingRhythmVariability), 0.0);
    approx(metric(&report, &q3, MetricKey::KeyHoldTime), 87.5);
    approx(metric(&report, &q3, MetricKey::CorrectionRate), 0.25);
    approx(metric(&report, &q3, MetricKey::TypingSpeed), 240.0);
    approx(metric(&report, &q3, MetricKey::PauseRate), 0.0);
    approx(metric(&report, &q3, MetricKey::KeyboardFluency), 0.925);

    // The pointer-only questions carry no keyboard metrics
    let q1 = Scope::Question("q1".to_string());
    assert_eq!(report.metrics().get(&q1, MetricKey::TypingSpeed), None);
}

#[test]
fn test_cognitive_results_from_fixture() {
    let report = process_fixture();

    let attention = report.sustained_attention.as_ref().unwrap();
    assert_eq!(attention.correct_detections, 2);
    assert_eq!(attention.omission_errors, 1);
    assert_eq!(attention.commission_errors, 1);
    assert_eq!(attention.correct_rejections, 1);
    assert_eq!(attention.average_reaction_time_ms.value(), Some(400.0));
    assert_eq!(attention.reaction_time_std_dev_ms.value(), Some(50.0));

    let graph = report.graph_test.as_ref().unwrap();
    assert_eq!(graph.part_one.error_count, 1);
    assert_eq!(graph.part_two.error_count, 3);
    assert_eq!(graph.time_ratio.value(), Some(2.0));

    let span = report.span_test.as_ref().unwrap();
    let forward = span.series_for(SpanDirection::Forward).unwrap();
    assert_eq!(forward.longest_span, 4);
    assert_eq!(forward.stopped_at_span, Some(5));
    let backward = span.series_for(SpanDirection::Backward).unwrap();
    assert_eq!(backward.longest_span, 2);
    assert_eq!(backward.stopped_at_span, None);
    assert!((span.trials[5].accuracy - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_global_and_per_question_collections() {
    let report = process_fixture();

    assert_eq!(
        report.global.len(),
        MetricKey::POINTER.len() + MetricKey::KEYBOARD.len()
    );
    assert!(report.global.iter().all(|e| e.question_id.is_empty()));

    let questions: HashSet<&str> = report
        .per_question
        .iter()
        .map(|e| e.question_id.as_str())
        .collect();
    assert_eq!(questions, HashSet::from(["q1", "q2", "q3"]));

    // Every calculated entry carries a positive sample size
    assert!(report
        .global
        .iter()
        .chain(report.per_question.iter())
        .all(|e| !e.calculated || e.sample_size > 0));
}

#[test]
fn test_compressed_sections_match_plain() {
    let plain = plain_sections();

    let mut plain_submission = Submission::new();
    let mut compressed_submission = Submission::new();
    for (i, (kind, bytes)) in plain.iter().enumerate() {
        plain_submission.set(*kind, bytes.clone());
        let packed = if i % 2 == 0 { gzip(bytes) } else { zlib(bytes) };
        compressed_submission.set(*kind, packed);
    }

    let engine = CognitionEngine::default();
    let expected = engine.process(&plain_submission).unwrap();
    let actual = engine.process(&compressed_submission).unwrap();
    assert_eq!(actual, expected);
}

#[test]
fn test_corrupt_compressed_section_is_reported() {
    let mut corrupt = gzip(br#"{ "events": [] }"#);
    corrupt.truncate(6);

    let submission = Submission::new().with(PayloadKind::Keyboard, corrupt);
    let err = CognitionEngine::default().process(&submission).unwrap_err();

    assert!(matches!(err, ComputeError::ParseError(_)));
    assert!(err.to_string().contains("keyboard"));
}

#[test]
fn test_not_attempted_tests_yield_no_result() {
    let document = r#"{
        "sustainedAttention": {
            "testStartTimeMillis": 0,
            "testEndTimeMillis": 0,
            "eventLog": [
                { "type": "stimulus", "stimulusId": "a", "isTarget": true, "timestampMillis": 10 },
                { "type": "response", "stimulusId": "a", "timestampMillis": 400 }
            ]
        },
        "graphTest": { "testStartTimeMillis": 0, "testEndTimeMillis": 0, "eventLog": [] },
        "spanTest": { "testStartTimeMillis": 0, "testEndTimeMillis": 0 }
    }"#;

    let json = compute_metrics_json(document).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["sustainedAttention"].is_null());
    assert!(value["graphTest"].is_null());
    assert!(value["spanTest"].is_null());
}

#[test]
fn test_invalid_section_rejected_eagerly() {
    let document = r#"{
        "graphTest": {
            "testStartTimeMillis": 1000,
            "testEndTimeMillis": 2000,
            "eventLog": [ { "part": 3, "type": "partStart", "timestampMillis": 1000 } ]
        }
    }"#;

    let err = compute_metrics_json(document).unwrap_err();
    assert!(matches!(err, ComputeError::InvalidPayload { .. }));
    assert!(err.to_string().contains("graph_test"));
}

#[test]
fn test_out_of_range_coordinates_are_input_errors() {
    let document = r#"{
        "pointer": {
            "movements": [
                { "x": 0, "y": 0, "timestampMillis": 0 },
                { "x": 1e200, "y": 0, "timestampMillis": 1000 }
            ]
        }
    }"#;

    let err = compute_metrics_json(document).unwrap_err();
    assert!(matches!(err, ComputeError::InvalidPayload { .. }));
    assert!(!err.is_contract_violation());
}

#[test]
fn test_stored_entries_round_trip() {
    let report = process_fixture();
    let original = report.metrics();

    let stored = serde_json::to_string(&original.entries().collect::<Vec<_>>()).unwrap();
    let restored = AssembledMetrics::from_entries(
        serde_json::from_str::<Vec<synheart_cognition::MetricEntry>>(&stored).unwrap(),
    )
    .unwrap();

    let as_set = |m: &AssembledMetrics| -> HashSet<String> {
        m.entries()
            .map(|e| serde_json::to_string(e).unwrap())
            .collect()
    };
    assert_eq!(as_set(&restored), as_set(&original));
}

#[test]
fn test_concurrent_invocations_are_independent() {
    let engine = CognitionEngine::default();
    let document = SubmissionDocument::from_json(FIXTURE).unwrap();
    let expected = engine.process_document(&document).unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| engine.process_document(&document).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
