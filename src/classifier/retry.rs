use super::*;

/// Result of driving a fallible operation through a bounded retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { last_error: String, attempts: u32 },
}

/// Calls `operation` until it succeeds or `max_attempts` calls have failed,
/// sleeping `pause` between failed attempts (never after the last one).
pub fn retry_with_pause<T, F>(
    max_attempts: u32,
    pause: Duration,
    operation_name: &str,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Result<T, ClassifyError>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        match operation(attempt) {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                };
            }
            Err(err) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    "attempt failed"
                );
                last_error = err.to_string();
                if attempt < max_attempts {
                    pause_between_attempts(pause);
                }
            }
        }
    }

    RetryOutcome::Exhausted {
        last_error,
        attempts: max_attempts,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub label: Label,
    pub rationale: String,
    pub grammar: Vec<String>,
    pub attempts: u32,
    pub disposition: Disposition,
}

/// Wraps one inference call with bounded retry and vocabulary validation.
/// `classify` never fails: exhaustion degrades to `UNKNOWN`.
pub struct RetryingClassifier<B> {
    backend: B,
    config: ClassifierConfig,
    options: CompletionOptions,
}

impl<B: InferenceBackend> RetryingClassifier<B> {
    pub fn new(backend: B, config: ClassifierConfig) -> Self {
        let options = CompletionOptions::for_classification(&config);
        Self {
            backend,
            config,
            options,
        }
    }

    /// One inference call parsed against the response schema.
    pub fn attempt(&self, text: &str) -> Result<LabelResponse, ClassifyError> {
        let messages = build_classification_messages(text);
        let raw = self
            .backend
            .complete(&self.config.model, &messages, &self.options)?;
        parse_label_response(&raw)
    }

    pub fn classify(&self, text: &str) -> Classification {
        let outcome = retry_with_pause(self.config.max_retries, self.config.pause, "classify", |_| {
            self.attempt(text)
        });

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                let validated = value.into_validated();
                debug!(label = %validated.label, attempts, "classified");
                Classification {
                    label: validated.label,
                    rationale: validated.reasoning,
                    grammar: validated.grammar,
                    attempts,
                    disposition: validated.disposition,
                }
            }
            RetryOutcome::Exhausted {
                last_error,
                attempts,
            } => {
                warn!(attempts, error = %last_error, "classification retries exhausted, forcing UNKNOWN");
                Classification {
                    label: Label::Unknown,
                    rationale: last_error.clone(),
                    grammar: Vec::new(),
                    attempts,
                    disposition: Disposition::Exhausted { last_error },
                }
            }
        }
    }

    pub fn classify_request(&self, request: &ClassificationRequest) -> ClassificationResult {
        let classification = self.classify(&request.text);
        ClassificationResult {
            request_id: request.id.clone(),
            label: classification.label,
            rationale: classification.rationale,
            grammar: classification.grammar,
            attempt_count: classification.attempts,
            disposition: classification.disposition,
        }
    }
}
