//! Input loaders: sentence files for `import`, labelled CSV sheets for
//! `evaluate` and `report`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::warn;

use crate::model::ClassificationRequest;
use crate::util::{parse_csv, sha256_hex};

/// One row of an evaluation sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRow {
    pub text: String,
    /// Reference label after falling back to the previous prediction.
    pub expected: Option<String>,
    /// True when `expected` was supplied explicitly rather than inherited.
    pub corrected: bool,
    pub previous_predicted: Option<String>,
    pub predicted: Option<String>,
    pub rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentenceLine {
    #[serde(default)]
    id: Option<String>,
    text: String,
}

/// Stable id for a sentence without one: the first 16 hex digits of its digest.
pub fn content_id(text: &str) -> String {
    sha256_hex(text.as_bytes())[..16].to_string()
}

pub fn load_sentences(path: &Path) -> Result<Vec<ClassificationRequest>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_sentences(&raw))
}

/// Accepts one sentence per line, or JSONL objects `{"id"?, "text"}`. The
/// two forms may be mixed; a line starting with `{` is treated as JSON.
pub fn parse_sentences(raw: &str) -> Vec<ClassificationRequest> {
    let mut requests = Vec::new();

    for (index, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (id, text) = if trimmed.starts_with('{') {
            match serde_json::from_str::<SentenceLine>(trimmed) {
                Ok(parsed) => (parsed.id, parsed.text.trim().to_string()),
                Err(err) => {
                    warn!(line_number = index + 1, error = %err, "malformed sentence line skipped");
                    continue;
                }
            }
        } else {
            (None, trimmed.to_string())
        };

        if text.is_empty() {
            warn!(line_number = index + 1, "empty sentence skipped");
            continue;
        }

        let id = id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| content_id(&text));
        requests.push(ClassificationRequest { id, text });
    }

    requests
}

pub fn load_dataset(path: &Path) -> Result<Vec<DatasetRow>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_dataset(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn parse_dataset(raw: &str) -> Result<Vec<DatasetRow>> {
    let mut records = parse_csv(raw.trim_start_matches('\u{feff}'))?.into_iter();
    let Some(header) = records.next() else {
        bail!("dataset is empty");
    };

    let column = |names: &[&str]| {
        header
            .iter()
            .position(|cell| names.contains(&cell.trim().to_ascii_lowercase().as_str()))
    };
    let Some(text_column) = column(&["sentence", "text"]) else {
        bail!("dataset header needs a `sentence` or `text` column");
    };
    let expected_column = column(&["expected", "expected_level"]);
    let previous_column = column(&["previous_predicted"]);
    let predicted_column = column(&["predicted", "predicted_level"]);
    let rationale_column = column(&["rationale", "reasoning"]);

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let cell = |slot: Option<usize>| {
            slot
                .and_then(|position| record.get(position))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let Some(text) = cell(Some(text_column)) else {
            warn!(row = index + 2, "dataset row without text skipped");
            continue;
        };

        let explicit = cell(expected_column);
        let previous_predicted = cell(previous_column);
        let corrected = explicit.is_some();
        let expected = explicit.or_else(|| previous_predicted.clone());

        rows.push(DatasetRow {
            text,
            expected,
            corrected,
            previous_predicted,
            predicted: cell(predicted_column),
            rationale: cell(rationale_column),
        });
    }

    Ok(rows)
}
