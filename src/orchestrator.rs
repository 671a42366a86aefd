//! Online mode: each item is classified synchronously, exactly once per run,
//! and diagnostics are aggregated once at the end. Nothing is checkpointed;
//! an interrupted run starts over from the items still unprocessed.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::{InferenceBackend, RetryOutcome, RetryingClassifier, Translator};
use crate::dataset::DatasetRow;
use crate::diagnostics::{Report, RunComparison, RunPair, aggregate, compare_runs};
use crate::model::{ClassificationRequest, ClassificationResult, Disposition, EvaluationRow, Label};

pub struct OnlineOrchestrator<'a, B> {
    classifier: &'a RetryingClassifier<B>,
    translator: Option<&'a Translator<B>>,
}

/// One classified item, handed to the caller's sink before the next begins.
#[derive(Debug)]
pub struct ClassifiedItem<'r> {
    pub request: &'r ClassificationRequest,
    pub translation: Option<String>,
    pub result: ClassificationResult,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct OnlineSummary {
    pub classified: usize,
    pub skipped: usize,
    pub unknown: usize,
    pub out_of_vocabulary: usize,
    pub exhausted: usize,
}

/// Rows and diagnostics of one evaluation pass.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub rows: Vec<EvaluationRow>,
    pub report: Report,
    pub comparison: Option<RunComparison>,
}

impl Evaluation {
    /// Pairs each dataset row with its current prediction and rationale, then
    /// aggregates. A comparison is produced only if some row carries a
    /// previous prediction.
    pub fn from_predictions(
        dataset: &[DatasetRow],
        predictions: Vec<(String, String)>,
        label_order: &[Label],
    ) -> Self {
        let mut rows = Vec::with_capacity(dataset.len());
        let mut pairs = Vec::with_capacity(dataset.len());

        for (source, (predicted, rationale)) in dataset.iter().zip(predictions) {
            rows.push(EvaluationRow::new(
                &source.text,
                source.expected.as_deref(),
                &predicted,
                &rationale,
            ));
            pairs.push(RunPair {
                text: source.text.clone(),
                expected: source.expected.clone(),
                corrected: source.corrected,
                previous: source.previous_predicted.clone(),
                current: predicted,
                rationale,
            });
        }

        let report = aggregate(&rows, label_order);
        let comparison = pairs
            .iter()
            .any(|pair| pair.previous.is_some())
            .then(|| compare_runs(&pairs));

        Self {
            rows,
            report,
            comparison,
        }
    }
}

impl<'a, B: InferenceBackend> OnlineOrchestrator<'a, B> {
    pub fn new(classifier: &'a RetryingClassifier<B>, translator: Option<&'a Translator<B>>) -> Self {
        Self {
            classifier,
            translator,
        }
    }

    /// Classifies `requests` in order. An item whose translation fails is
    /// skipped and stays unprocessed; a sink error aborts the run.
    pub fn classify_items<F>(
        &self,
        requests: &[ClassificationRequest],
        mut sink: F,
    ) -> Result<OnlineSummary>
    where
        F: FnMut(&ClassifiedItem<'_>) -> Result<()>,
    {
        let mut summary = OnlineSummary::default();
        let total = requests.len();

        for (position, request) in requests.iter().enumerate() {
            let translation = match self.translator {
                Some(translator) => match translator.translate(&request.text) {
                    RetryOutcome::Succeeded { value, .. } => Some(value),
                    RetryOutcome::Exhausted { last_error, attempts } => {
                        warn!(
                            item_id = %request.id,
                            attempts,
                            error = %last_error,
                            "translation failed, item left unprocessed"
                        );
                        summary.skipped += 1;
                        continue;
                    }
                },
                None => None,
            };

            // The translated sentence is what gets graded.
            let result = match &translation {
                Some(text) => self.classifier.classify_request(&ClassificationRequest {
                    id: request.id.clone(),
                    text: text.clone(),
                }),
                None => self.classifier.classify_request(request),
            };
            summary.classified += 1;
            if result.label == Label::Unknown {
                summary.unknown += 1;
            }
            match result.disposition {
                Disposition::OutOfVocabulary { .. } => summary.out_of_vocabulary += 1,
                Disposition::Exhausted { .. } => summary.exhausted += 1,
                Disposition::Accepted => {}
            }

            sink(&ClassifiedItem {
                request,
                translation,
                result,
            })?;

            if (position + 1) % 100 == 0 {
                info!(done = position + 1, total, "classification progress");
            }
        }

        Ok(summary)
    }

    /// Classifies every dataset row once, then aggregates once.
    pub fn evaluate(&self, dataset: &[DatasetRow], label_order: &[Label]) -> Evaluation {
        let predictions = dataset
            .iter()
            .map(|row| {
                let classification = self.classifier.classify(&row.text);
                (
                    classification.label.as_str().to_string(),
                    classification.rationale,
                )
            })
            .collect();

        Evaluation::from_predictions(dataset, predictions, label_order)
    }
}
