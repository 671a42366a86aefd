//! Label a sentence through an external chat-completion model.
//!
//! The backend is a trait so the retry contract can be exercised without a
//! network: transport and parse failures are retried up to the configured
//! budget, while a well-formed answer carrying a label outside the CEFR
//! vocabulary is coerced to `UNKNOWN` on the spot.

use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::error::ClassifyError;
use crate::model::{ClassificationRequest, ClassificationResult, Disposition, Label};

mod prompt;
mod response;
mod retry;
mod translate;

pub use self::prompt::{build_classification_messages, build_translation_messages};
pub use self::response::{LabelResponse, ValidatedLabel, parse_label_response};
pub use self::retry::{RetryOutcome, RetryingClassifier, retry_with_pause};
pub use self::translate::Translator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system",
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user",
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant",
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub json_object: bool,
}

impl CompletionOptions {
    pub fn for_classification(config: &ClassifierConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_completion_tokens: config.max_completion_tokens,
            json_object: true,
        }
    }

    pub fn for_translation(config: &ClassifierConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_completion_tokens: 100,
            json_object: false,
        }
    }
}

/// A single chat completion returning the assistant's raw message content.
pub trait InferenceBackend {
    fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, ClassifyError>;
}

impl<T: InferenceBackend + ?Sized> InferenceBackend for &T {
    fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, ClassifyError> {
        (**self).complete(model, messages, options)
    }
}

fn pause_between_attempts(pause: Duration) {
    if !pause.is_zero() {
        debug!(pause_ms = pause.as_millis() as u64, "pausing before retry");
        thread::sleep(pause);
    }
}
