use std::fmt::Write as _;

use super::*;

const MISCLASSIFIED_HEADER: [&str; 4] = ["text", "expected", "predicted", "rationale"];
const REGRESSED_HEADER: [&str; 5] = ["text", "expected", "previous", "current", "rationale"];

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Plain-text rendering of a report for the terminal.
pub fn render_report(report: &Report) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Overall accuracy: {} ({}/{})",
        percent(report.accuracy),
        report.correct,
        report.labelled
    );
    if report.unlabelled > 0 {
        let _ = writeln!(out, "Rows without an expected label: {}", report.unlabelled);
    }
    if report.excluded_from_matrix > 0 {
        let _ = writeln!(
            out,
            "Rows outside the confusion matrix: {}",
            report.excluded_from_matrix
        );
    }
    let _ = writeln!(
        out,
        "UNKNOWN predictions: {} ({})",
        report.unknown_predictions,
        percent(report.unknown_rate)
    );

    let _ = writeln!(out, "\nConfusion matrix (rows = expected, columns = predicted):");
    let _ = write!(out, "{:>8}", "");
    for label in &report.confusion.labels {
        let _ = write!(out, "{:>8}", label.as_str());
    }
    let _ = writeln!(out);
    for (label, counts) in report.confusion.labels.iter().zip(&report.confusion.counts) {
        let _ = write!(out, "{:>8}", label.as_str());
        for count in counts {
            let _ = write!(out, "{count:>8}");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "\nPer-level accuracy:");
    for entry in &report.per_label_accuracy {
        let _ = writeln!(
            out,
            "  {}: {} ({}/{})",
            entry.label,
            percent(entry.accuracy),
            entry.correct,
            entry.support
        );
    }

    let unsupported = report.levels_without_support();
    if !unsupported.is_empty() {
        let names: Vec<&str> = unsupported.iter().map(|label| label.as_str()).collect();
        let _ = writeln!(out, "  no reference rows for: {}", names.join(", "));
    }

    let _ = writeln!(out, "\nClassification report:");
    let _ = writeln!(
        out,
        "{:>14}{:>11}{:>11}{:>11}{:>9}",
        "", "precision", "recall", "f1-score", "support"
    );
    for entry in &report.per_label_metrics {
        let _ = writeln!(
            out,
            "{:>14}{:>11.2}{:>11.2}{:>11.2}{:>9}",
            entry.label.as_str(),
            entry.precision,
            entry.recall,
            entry.f1,
            entry.support
        );
    }
    for (name, average) in [
        ("macro avg", &report.macro_average),
        ("weighted avg", &report.weighted_average),
    ] {
        let _ = writeln!(
            out,
            "{:>14}{:>11.2}{:>11.2}{:>11.2}{:>9}",
            name, average.precision, average.recall, average.f1, average.support
        );
    }

    let _ = writeln!(
        out,
        "\nDrift (one level off): {} of {} ({})",
        report.drift.len(),
        report.labelled,
        percent(report.drift_rate)
    );
    for case in &report.drift {
        let _ = writeln!(
            out,
            "  {} -> {}: {}",
            case.expected, case.predicted, case.text
        );
    }

    out
}

pub fn render_comparison(comparison: &RunComparison) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Consistency vs previous run: {} ({}/{})",
        percent(comparison.consistency_rate),
        comparison.consistent,
        comparison.compared
    );
    let _ = writeln!(
        out,
        "Improvement rate: {}/{} = {}",
        comparison.improved.len(),
        comparison.corrected_total,
        percent(comparison.improvement_rate)
    );
    let _ = writeln!(
        out,
        "Regression rate: {}/{} = {}",
        comparison.regressed.len(),
        comparison.corrected_total,
        percent(comparison.regression_rate)
    );

    for (title, pairs) in [
        ("Improvements", &comparison.improved),
        ("Regressions", &comparison.regressed),
    ] {
        if pairs.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n--- {title} ---");
        for pair in pairs {
            let _ = writeln!(out, "Sentence: {}", pair.text);
            let _ = writeln!(
                out,
                "Previous: {} | Current: {} | Expected: {}",
                pair.previous.as_deref().unwrap_or(""),
                pair.current,
                pair.expected.as_deref().unwrap_or("")
            );
            let _ = writeln!(out, "Reasoning: {}", pair.rationale);
        }
    }

    out
}

pub fn write_misclassified_csv(path: &Path, report: &Report) -> Result<()> {
    let rows: Vec<Vec<String>> = report
        .misclassified
        .iter()
        .map(|row| {
            vec![
                row.text.clone(),
                row.expected.clone().unwrap_or_default(),
                row.predicted.clone(),
                row.rationale.clone(),
            ]
        })
        .collect();
    write_csv(path, &MISCLASSIFIED_HEADER, &rows)
}

pub fn write_regressed_csv(path: &Path, comparison: &RunComparison) -> Result<()> {
    let rows: Vec<Vec<String>> = comparison
        .regressed
        .iter()
        .map(|pair| {
            vec![
                pair.text.clone(),
                pair.expected.clone().unwrap_or_default(),
                pair.previous.clone().unwrap_or_default(),
                pair.current.clone(),
                pair.rationale.clone(),
            ]
        })
        .collect();
    write_csv(path, &REGRESSED_HEADER, &rows)
}
