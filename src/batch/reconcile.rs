use super::*;

const TERMINAL_STATUSES: [&str; 4] = ["completed", "expired", "cancelled", "failed"];

pub fn is_terminal_status(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputOutcome {
    Labelled(ValidatedLabel),
    Unparseable(String),
}

/// One line of a finished job's output file, keyed by the request's `custom_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub custom_id: String,
    pub outcome: OutputOutcome,
}

/// Parses every non-blank line of a job output file. Lines without a
/// `custom_id` cannot be attributed and are dropped with a warning.
pub fn parse_output_file(contents: &str) -> Vec<OutputLine> {
    let mut lines = Vec::new();

    for (index, raw_line) in contents.lines().enumerate() {
        if raw_line.trim().is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(raw_line) {
            Ok(value) => value,
            Err(err) => {
                warn!(line_number = index + 1, error = %err, "malformed output line skipped");
                continue;
            }
        };

        let Some(custom_id) = value.get("custom_id").and_then(Value::as_str) else {
            warn!(line_number = index + 1, "output line without custom_id skipped");
            continue;
        };

        let outcome = match completion_content(&value) {
            Ok(content) => match parse_label_response(content) {
                Ok(response) => OutputOutcome::Labelled(response.into_validated()),
                Err(err) => OutputOutcome::Unparseable(err.to_string()),
            },
            Err(reason) => OutputOutcome::Unparseable(reason),
        };

        lines.push(OutputLine {
            custom_id: custom_id.to_string(),
            outcome,
        });
    }

    lines
}

fn completion_content(line: &Value) -> Result<&str, String> {
    if let Some(error) = line.get("error").filter(|error| !error.is_null()) {
        return Err(format!("request failed: {error}"));
    }

    let response = line
        .get("response")
        .ok_or_else(|| "output line has no response".to_string())?;

    let status_code = response
        .get("status_code")
        .and_then(Value::as_u64)
        .unwrap_or(200);
    if status_code != 200 {
        return Err(format!("request returned status {status_code}"));
    }

    response
        .pointer("/body/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| "response has no message content".to_string())
}
