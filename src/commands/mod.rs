pub mod classify;
pub mod evaluate;
pub mod import;
pub mod prepare;
pub mod reconcile;
pub mod report;
pub mod reset;
pub mod status;
pub mod submit;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::CachePaths;
use crate::diagnostics::{
    Report, RunComparison, render_comparison, render_report, write_misclassified_csv,
    write_regressed_csv,
};
use crate::model::{Label, LabelVocabulary};
use crate::orchestrator::Evaluation;
use crate::store::LabelCounts;
use crate::util::{utc_compact_string, write_json_pretty};

#[derive(Serialize)]
struct EvaluationArtifact<'a> {
    run_id: &'a str,
    report: &'a Report,
    comparison: Option<&'a RunComparison>,
}

fn label_order(exclude_unknown: bool) -> Vec<Label> {
    if exclude_unknown {
        LabelVocabulary::levels().labels().to_vec()
    } else {
        LabelVocabulary::with_unknown().labels().to_vec()
    }
}

fn log_label_counts(counts: &LabelCounts) {
    for (label, count) in &counts.counts {
        info!(label = %label, count, "label count");
    }
    if counts.unrecognized > 0 {
        warn!(count = counts.unrecognized, "stored labels outside the vocabulary");
    }
    let unknown = counts.count(Label::Unknown);
    if unknown > 0 {
        warn!(
            count = unknown,
            "items labelled UNKNOWN; inspect their reasoning or reset and rerun"
        );
    }
    info!(
        labelled = counts.labelled_total(),
        unprocessed = counts.unprocessed,
        "store totals"
    );
}

/// Prints the rendered diagnostics to stdout and writes the JSON report and
/// CSV audit artifacts under the report directory.
fn publish_evaluation(paths: &CachePaths, prefix: &str, evaluation: &Evaluation) -> Result<()> {
    let run_id = utc_compact_string(Utc::now());

    print!("{}", render_report(&evaluation.report));
    if let Some(comparison) = &evaluation.comparison {
        println!();
        print!("{}", render_comparison(comparison));
    }

    let report_path = paths.report_dir.join(format!("{prefix}_{run_id}.json"));
    write_json_pretty(
        &report_path,
        &EvaluationArtifact {
            run_id: &run_id,
            report: &evaluation.report,
            comparison: evaluation.comparison.as_ref(),
        },
    )?;

    let misclassified_path = paths
        .report_dir
        .join(format!("{prefix}_{run_id}_misclassified.csv"));
    write_misclassified_csv(&misclassified_path, &evaluation.report)?;

    info!(
        report = %report_path.display(),
        misclassified = %misclassified_path.display(),
        misclassified_rows = evaluation.report.misclassified.len(),
        "wrote evaluation artifacts"
    );

    if let Some(comparison) = &evaluation.comparison {
        let regressed_path = paths
            .report_dir
            .join(format!("{prefix}_{run_id}_regressed.csv"));
        write_regressed_csv(&regressed_path, comparison)?;
        info!(
            path = %regressed_path.display(),
            regressed_rows = comparison.regressed.len(),
            "wrote regression audit"
        );
    }

    Ok(())
}
