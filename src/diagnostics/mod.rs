//! Accuracy and drift diagnostics over labelled evaluation rows.
//!
//! Everything here is a pure function of its inputs; rendering and CSV
//! export sit on top of the computed [`Report`] and [`RunComparison`].

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::model::{CEFR_LEVELS, EvaluationRow, Label, LabelVocabulary};
use crate::util::write_csv;

mod aggregate;
mod compare;
mod render;
#[cfg(test)]
mod tests;

pub use self::aggregate::{Report, aggregate};
pub use self::compare::{RunComparison, RunPair, compare_runs};
pub use self::render::{
    render_comparison, render_report, write_misclassified_csv, write_regressed_csv,
};

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn labels_equal(left: &str, right: &str) -> bool {
    left.trim() == right.trim()
}
