use std::fs::File;
use std::io::{BufRead, BufReader};

use serde::Deserialize;
use serde_json::json;

use super::*;
use crate::classifier::build_classification_messages;
use crate::config::ClassifierConfig;
use crate::model::ClassificationRequest;

/// One line of a batch input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequestLine {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: Value,
}

pub fn build_request_line(
    request: &ClassificationRequest,
    config: &ClassifierConfig,
    endpoint: &str,
) -> BatchRequestLine {
    let messages = build_classification_messages(&request.text);
    BatchRequestLine {
        custom_id: request.id.clone(),
        method: "POST".to_string(),
        url: endpoint.to_string(),
        body: json!({
            "model": config.model,
            "messages": messages,
            "response_format": { "type": "json_object" },
            "temperature": config.temperature,
            "max_tokens": config.max_completion_tokens,
        }),
    }
}

/// Lazily reads a JSONL batch file. Blank lines are ignored and malformed
/// lines are logged and skipped, so re-reading the same file always yields
/// the same sequence.
pub fn read_request_lines(path: &Path) -> Result<impl Iterator<Item = BatchRequestLine>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let shown = path.display().to_string();

    Ok(BufReader::new(file)
        .lines()
        .enumerate()
        .filter_map(move |(index, line)| {
            let line_number = index + 1;
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(path = %shown, line_number, error = %err, "unreadable batch line skipped");
                    return None;
                }
            };
            if line.trim().is_empty() {
                return None;
            }
            match serde_json::from_str::<BatchRequestLine>(&line) {
                Ok(request) => Some(request),
                Err(err) => {
                    warn!(path = %shown, line_number, error = %err, "malformed batch line skipped");
                    None
                }
            }
        }))
}
