use super::*;

/// Optional pre-classification step rendering source text into Spanish.
pub struct Translator<B> {
    backend: B,
    model: String,
    max_attempts: u32,
    pause: Duration,
    options: CompletionOptions,
}

impl<B: InferenceBackend> Translator<B> {
    pub fn new(backend: B, config: &ClassifierConfig) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            max_attempts: config.max_retries,
            pause: config.pause,
            options: CompletionOptions::for_translation(config),
        }
    }

    pub fn translate(&self, text: &str) -> RetryOutcome<String> {
        let messages = build_translation_messages(text);
        retry_with_pause(self.max_attempts, self.pause, "translate", |_| {
            let raw = self.backend.complete(&self.model, &messages, &self.options)?;
            let translated = raw.trim().trim_matches('"').trim().to_string();
            if translated.is_empty() {
                return Err(ClassifyError::MissingField {
                    field: "translation",
                });
            }
            Ok(translated)
        })
    }
}
