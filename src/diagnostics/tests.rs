use tempfile::TempDir;

use super::*;
use crate::util::parse_csv;

fn row(expected: &str, predicted: &str) -> EvaluationRow {
    EvaluationRow::new(
        &format!("{expected} sentence"),
        Some(expected),
        predicted,
        "because",
    )
}

fn full_order() -> Vec<Label> {
    LabelVocabulary::with_unknown().labels().to_vec()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn end_to_end_example_matches_expected_figures() {
    let rows = vec![
        row("A1", "A1"),
        row("A2", "B1"),
        row("B1", "B1"),
        row("B2", "UNKNOWN"),
    ];

    let report = aggregate(&rows, &full_order());

    assert_close(report.accuracy, 0.5);
    assert_eq!(report.drift.len(), 1);
    assert_eq!(report.drift[0].expected, Label::A2);
    assert_eq!(report.drift[0].predicted, Label::B1);
    assert_close(report.drift_rate, 0.25);
    assert_eq!(report.confusion.get(Label::A1, Label::A1), 1);
    assert_eq!(report.confusion.get(Label::A2, Label::B1), 1);
    assert_eq!(report.confusion.get(Label::B2, Label::Unknown), 1);
    assert_eq!(report.confusion.total(), 4);
    assert_eq!(report.misclassified.len(), 2);
    assert_eq!(report.unknown_predictions, 1);
    assert_close(report.unknown_rate, 0.25);
}

#[test]
fn confusion_cells_equal_pair_counts() {
    let rows = vec![
        row("A1", "A2"),
        row("A1", "A2"),
        row("A1", "A1"),
        row("C2", "C1"),
        row("C1", "C1"),
    ];
    let order = full_order();
    let report = aggregate(&rows, &order);

    for expected in &order {
        for predicted in &order {
            let manual = rows
                .iter()
                .filter(|row| {
                    row.expected.as_deref() == Some(expected.as_str())
                        && row.predicted == predicted.as_str()
                })
                .count() as u64;
            assert_eq!(report.confusion.get(*expected, *predicted), manual);
        }
    }
}

#[test]
fn perfect_predictions_give_unit_accuracy_and_no_drift() {
    let rows = vec![row("A1", "A1"), row("B2", "B2"), row("C2", "C2")];
    let report = aggregate(&rows, &full_order());

    assert_close(report.accuracy, 1.0);
    assert!(report.drift.is_empty());
    assert_close(report.drift_rate, 0.0);
    assert!(report.misclassified.is_empty());
    assert_close(report.weighted_average.f1, 1.0);
    // Four of the seven labels have neither support nor predictions.
    assert_close(report.macro_average.f1, 3.0 / 7.0);
}

#[test]
fn precision_recall_follow_multiclass_definitions() {
    // A1: tp=1, predicted=2, support=2. B1: tp=0, predicted=1, support=1.
    let rows = vec![row("A1", "A1"), row("A1", "B1"), row("B1", "A1")];
    let report = aggregate(&rows, &full_order());

    let a1 = report
        .per_label_metrics
        .iter()
        .find(|entry| entry.label == Label::A1)
        .expect("A1 metrics");
    assert_close(a1.precision, 0.5);
    assert_close(a1.recall, 0.5);
    assert_close(a1.f1, 0.5);
    assert_eq!(a1.support, 2);

    let b1 = report
        .per_label_metrics
        .iter()
        .find(|entry| entry.label == Label::B1)
        .expect("B1 metrics");
    assert_close(b1.precision, 0.0);
    assert_close(b1.recall, 0.0);
    assert_close(b1.f1, 0.0);

    assert_eq!(report.per_label_metrics.len(), 7);
    assert_close(report.macro_average.precision, 0.5 / 7.0);
    assert_close(report.weighted_average.recall, 1.0 / 3.0);
}

#[test]
fn macro_average_spans_every_label_in_order() {
    let rows = vec![row("A1", "A1"), row("A1", "A1")];

    let report = aggregate(&rows, &full_order());
    assert_eq!(report.per_label_metrics.len(), 7);
    let unused = report
        .per_label_metrics
        .iter()
        .find(|entry| entry.label == Label::C2)
        .expect("C2 metrics");
    assert_eq!(unused.support, 0);
    assert_close(unused.f1, 0.0);
    assert_close(report.macro_average.f1, 1.0 / 7.0);
    assert_close(report.weighted_average.f1, 1.0);

    let levels_only = LabelVocabulary::levels().labels().to_vec();
    let report = aggregate(&rows, &levels_only);
    assert_eq!(report.per_label_metrics.len(), 6);
    assert_close(report.macro_average.f1, 1.0 / 6.0);
}

#[test]
fn per_label_accuracy_skips_zero_support_levels() {
    let rows = vec![row("A1", "A1"), row("A1", "A2"), row("C1", "C1")];
    let report = aggregate(&rows, &full_order());

    let labels: Vec<Label> = report
        .per_label_accuracy
        .iter()
        .map(|entry| entry.label)
        .collect();
    assert_eq!(labels, vec![Label::A1, Label::C1]);
    assert_close(report.per_label_accuracy[0].accuracy, 0.5);
    assert_eq!(
        report.levels_without_support(),
        vec![Label::A2, Label::B1, Label::B2, Label::C2]
    );
}

#[test]
fn unrecognized_and_unlabelled_rows_are_counted_separately() {
    let rows = vec![
        row("A1", "A1"),
        row("B3", "B1"),
        EvaluationRow::new("no reference", None, "A2", ""),
    ];
    let report = aggregate(&rows, &LabelVocabulary::levels().labels().to_vec());

    assert_eq!(report.rows_total, 3);
    assert_eq!(report.labelled, 2);
    assert_eq!(report.unlabelled, 1);
    assert_eq!(report.excluded_from_matrix, 1);
    assert_eq!(report.confusion.total(), 1);
    assert_close(report.accuracy, 0.5);
}

#[test]
fn unknown_predictions_fall_outside_matrix_without_sentinel_bucket() {
    let rows = vec![row("B2", "UNKNOWN"), row("B2", "B2")];
    let report = aggregate(&rows, LabelVocabulary::levels().labels());

    assert_eq!(report.excluded_from_matrix, 1);
    assert_eq!(report.confusion.labels.len(), 6);
    assert!(report.drift.is_empty());
}

#[test]
fn aggregation_is_deterministic() {
    let rows = vec![row("A2", "B1"), row("B2", "B1"), row("C1", "C2")];
    let first = aggregate(&rows, &full_order());
    let second = aggregate(&rows, &full_order());
    assert_eq!(first, second);
    assert_eq!(first.drift.len(), 3);
}

fn pair(expected: Option<&str>, corrected: bool, previous: &str, current: &str) -> RunPair {
    RunPair {
        text: format!("{previous}->{current}"),
        expected: expected.map(ToOwned::to_owned),
        corrected,
        previous: Some(previous.to_string()),
        current: current.to_string(),
        rationale: "r".to_string(),
    }
}

#[test]
fn comparison_tracks_improvements_and_regressions_on_corrected_rows() {
    let pairs = vec![
        pair(Some("B1"), true, "A2", "B1"),
        pair(Some("B1"), true, "B1", "B2"),
        pair(Some("C1"), true, "C1", "C1"),
        pair(Some("A1"), false, "A1", "A2"),
        RunPair {
            previous: None,
            ..pair(None, false, "", "A1")
        },
    ];

    let comparison = compare_runs(&pairs);

    assert_eq!(comparison.compared, 4);
    assert_eq!(comparison.consistent, 1);
    assert_close(comparison.consistency_rate, 0.25);
    assert_eq!(comparison.corrected_total, 3);
    assert_eq!(comparison.improved.len(), 1);
    assert_eq!(comparison.regressed.len(), 1);
    assert_eq!(comparison.regressed[0].current, "B2");
    assert_close(comparison.regression_rate, 1.0 / 3.0);
}

#[test]
fn misclassified_csv_quotes_cells() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("reports/errors.csv");
    let rows = vec![
        EvaluationRow::new("Well, \"fine\".", Some("B1"), "A2", "short, plain"),
        row("A1", "A1"),
    ];
    let report = aggregate(&rows, &full_order());

    write_misclassified_csv(&path, &report).expect("write csv");

    let raw = std::fs::read_to_string(&path).expect("read csv");
    assert!(raw.starts_with("text,expected,predicted,rationale\n"));
    let records = parse_csv(&raw).expect("parse csv");
    assert_eq!(records.len(), 2);
    assert_eq!(records[1], vec!["Well, \"fine\".", "B1", "A2", "short, plain"]);
}

#[test]
fn rendered_report_lists_matrix_and_drift() {
    let rows = vec![row("A1", "A1"), row("A2", "B1")];
    let report = aggregate(&rows, &full_order());
    let text = render_report(&report);

    assert!(text.contains("Overall accuracy: 50.00% (1/2)"));
    assert!(text.contains("UNKNOWN"));
    assert!(text.contains("macro avg"));
    assert!(text.contains("A2 -> B1"));
}
