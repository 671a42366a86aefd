use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::*;

static FENCED_OBJECT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").ok());

/// Strict shape of a classifier answer. `grammar` is descriptive only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelResponse {
    pub cefr_level: String,
    pub reasoning: String,
    pub grammar: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLabel {
    pub label: Label,
    pub reasoning: String,
    pub grammar: Vec<String>,
    pub disposition: Disposition,
}

impl LabelResponse {
    /// Checks the label against the closed vocabulary. An unknown value is
    /// content, not a failure: it becomes `UNKNOWN` and is never retried.
    pub fn into_validated(self) -> ValidatedLabel {
        match Label::from_level(&self.cefr_level) {
            Some(label) => ValidatedLabel {
                label,
                reasoning: self.reasoning,
                grammar: self.grammar,
                disposition: Disposition::Accepted,
            },
            None => {
                warn!(raw_label = %self.cefr_level, "invalid CEFR level, forcing UNKNOWN");
                ValidatedLabel {
                    label: Label::Unknown,
                    reasoning: self.reasoning,
                    grammar: self.grammar,
                    disposition: Disposition::OutOfVocabulary {
                        raw_label: self.cefr_level,
                    },
                }
            }
        }
    }
}

pub fn parse_label_response(raw: &str) -> Result<LabelResponse, ClassifyError> {
    let candidate = extract_json_object(raw)
        .ok_or_else(|| ClassifyError::Parse(truncate_for_error(raw)))?;

    let value: Value = serde_json::from_str(candidate)
        .map_err(|err| ClassifyError::Parse(format!("{err}: {}", truncate_for_error(raw))))?;
    let Value::Object(object) = value else {
        return Err(ClassifyError::Parse(truncate_for_error(raw)));
    };

    let cefr_level = object
        .get("cefr_level")
        .and_then(Value::as_str)
        .map(|value| value.trim().to_string())
        .ok_or(ClassifyError::MissingField {
            field: "cefr_level",
        })?;
    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .map(|value| value.trim().to_string())
        .ok_or(ClassifyError::MissingField { field: "reasoning" })?;

    let grammar = match object.get("grammar") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            debug!(grammar = %other, "ignoring non-array grammar field");
            Vec::new()
        }
    };

    Ok(LabelResponse {
        cefr_level,
        reasoning,
        grammar,
    })
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    let fenced = FENCED_OBJECT
        .as_ref()
        .and_then(|pattern| pattern.captures(trimmed))
        .and_then(|captures| captures.get(1));
    if let Some(object) = fenced {
        return Some(object.as_str());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}

fn truncate_for_error(raw: &str) -> String {
    const LIMIT: usize = 160;
    let trimmed = raw.trim();
    if trimmed.chars().count() <= LIMIT {
        return trimmed.to_string();
    }
    let mut out = trimmed.chars().take(LIMIT).collect::<String>();
    out.push('…');
    out
}
