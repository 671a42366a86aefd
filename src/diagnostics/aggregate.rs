use super::*;

/// Square count table over a fixed label order, indexed `[expected][predicted]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<Label>,
    pub counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    fn new(labels: &[Label]) -> Self {
        Self {
            labels: labels.to_vec(),
            counts: vec![vec![0; labels.len()]; labels.len()],
        }
    }

    fn position(&self, label: Label) -> Option<usize> {
        self.labels.iter().position(|candidate| *candidate == label)
    }

    /// Returns false when either label is outside the matrix.
    fn record(&mut self, expected: Label, predicted: Label) -> bool {
        match (self.position(expected), self.position(predicted)) {
            (Some(row), Some(column)) => {
                self.counts[row][column] += 1;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, expected: Label, predicted: Label) -> u64 {
        match (self.position(expected), self.position(predicted)) {
            (Some(row), Some(column)) => self.counts[row][column],
            _ => 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelAccuracy {
    pub label: Label,
    pub correct: usize,
    pub support: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelMetrics {
    pub label: Label,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// A one-level adjacent misclassification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftCase {
    pub text: String,
    pub expected: Label,
    pub predicted: Label,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub label_order: Vec<Label>,
    pub rows_total: usize,
    /// Rows carrying an expected label; the denominator of accuracy and drift.
    pub labelled: usize,
    pub unlabelled: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    /// Labelled rows that could not be placed in the matrix.
    pub excluded_from_matrix: usize,
    pub per_label_accuracy: Vec<LabelAccuracy>,
    pub per_label_metrics: Vec<LabelMetrics>,
    pub macro_average: AverageMetrics,
    pub weighted_average: AverageMetrics,
    pub drift: Vec<DriftCase>,
    pub drift_rate: f64,
    pub unknown_predictions: usize,
    pub unknown_rate: f64,
    pub prediction_histogram: Vec<(Label, usize)>,
    pub unrecognized_predictions: usize,
    pub misclassified: Vec<EvaluationRow>,
}

struct Tally {
    true_positive: usize,
    predicted: usize,
    support: usize,
}

/// Computes the full diagnostic report. `label_order` fixes the matrix axes
/// and the row order of every per-label table; include `Label::Unknown` to
/// give sentinel predictions their own bucket.
pub fn aggregate(rows: &[EvaluationRow], label_order: &[Label]) -> Report {
    let mut confusion = ConfusionMatrix::new(label_order);
    let mut tallies: Vec<Tally> = label_order
        .iter()
        .map(|_| Tally {
            true_positive: 0,
            predicted: 0,
            support: 0,
        })
        .collect();

    let mut labelled = 0usize;
    let mut correct = 0usize;
    let mut excluded_from_matrix = 0usize;
    let mut drift = Vec::new();
    let mut misclassified = Vec::new();

    for row in rows {
        let Some(expected_raw) = row.expected.as_deref() else {
            continue;
        };
        labelled += 1;

        let hit = labels_equal(expected_raw, &row.predicted);
        if hit {
            correct += 1;
        } else {
            misclassified.push(row.clone());
        }

        let expected = Label::parse_any(expected_raw);
        let predicted = Label::parse_any(&row.predicted);

        let placed = match (expected, predicted) {
            (Some(expected), Some(predicted)) => confusion.record(expected, predicted),
            _ => false,
        };
        if !placed {
            excluded_from_matrix += 1;
        }

        let expected_slot = expected.and_then(|label| label_order.iter().position(|l| *l == label));
        let predicted_slot =
            predicted.and_then(|label| label_order.iter().position(|l| *l == label));
        if let Some(slot) = expected_slot {
            tallies[slot].support += 1;
            if hit {
                tallies[slot].true_positive += 1;
            }
        }
        if let Some(slot) = predicted_slot {
            tallies[slot].predicted += 1;
        }

        match (expected, predicted) {
            (Some(expected), Some(predicted)) if expected.is_adjacent(predicted) => {
                drift.push(DriftCase {
                    text: row.text.clone(),
                    expected,
                    predicted,
                    rationale: row.rationale.clone(),
                });
            }
            _ => {}
        }
    }

    let per_label_accuracy = label_order
        .iter()
        .zip(&tallies)
        .filter(|(_, tally)| tally.support > 0)
        .map(|(label, tally)| LabelAccuracy {
            label: *label,
            correct: tally.true_positive,
            support: tally.support,
            accuracy: ratio(tally.true_positive, tally.support),
        })
        .collect();

    let per_label_metrics: Vec<LabelMetrics> = label_order
        .iter()
        .zip(&tallies)
        .map(|(label, tally)| {
            let precision = ratio(tally.true_positive, tally.predicted);
            let recall = ratio(tally.true_positive, tally.support);
            LabelMetrics {
                label: *label,
                precision,
                recall,
                f1: f1_score(precision, recall),
                support: tally.support,
            }
        })
        .collect();

    let (macro_average, weighted_average) = averages(&per_label_metrics);

    let mut prediction_histogram: Vec<(Label, usize)> = LabelVocabulary::with_unknown()
        .labels()
        .iter()
        .map(|label| (*label, 0))
        .collect();
    let mut unrecognized_predictions = 0usize;
    for row in rows {
        let slot = Label::parse_any(&row.predicted).and_then(|label| {
            prediction_histogram
                .iter()
                .position(|(candidate, _)| *candidate == label)
        });
        match slot {
            Some(position) => prediction_histogram[position].1 += 1,
            None => unrecognized_predictions += 1,
        }
    }
    let unknown_predictions = prediction_histogram
        .iter()
        .find(|(label, _)| *label == Label::Unknown)
        .map(|(_, count)| *count)
        .unwrap_or(0);

    let drift_rate = ratio(drift.len(), labelled);

    Report {
        label_order: label_order.to_vec(),
        rows_total: rows.len(),
        labelled,
        unlabelled: rows.len() - labelled,
        correct,
        accuracy: ratio(correct, labelled),
        confusion,
        excluded_from_matrix,
        per_label_accuracy,
        per_label_metrics,
        macro_average,
        weighted_average,
        drift,
        drift_rate,
        unknown_predictions,
        unknown_rate: ratio(unknown_predictions, rows.len()),
        prediction_histogram,
        unrecognized_predictions,
        misclassified,
    }
}

impl Report {
    /// Labels of the six CEFR levels that never appeared as an expected label.
    pub fn levels_without_support(&self) -> Vec<Label> {
        CEFR_LEVELS
            .iter()
            .copied()
            .filter(|level| {
                !self
                    .per_label_accuracy
                    .iter()
                    .any(|entry| entry.label == *level)
            })
            .collect()
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn averages(metrics: &[LabelMetrics]) -> (AverageMetrics, AverageMetrics) {
    let support: usize = metrics.iter().map(|entry| entry.support).sum();
    let count = metrics.len() as f64;

    let macro_average = if metrics.is_empty() {
        AverageMetrics {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            support,
        }
    } else {
        AverageMetrics {
            precision: metrics.iter().map(|entry| entry.precision).sum::<f64>() / count,
            recall: metrics.iter().map(|entry| entry.recall).sum::<f64>() / count,
            f1: metrics.iter().map(|entry| entry.f1).sum::<f64>() / count,
            support,
        }
    };

    let weighted = |value: fn(&LabelMetrics) -> f64| {
        if support == 0 {
            0.0
        } else {
            metrics
                .iter()
                .map(|entry| value(entry) * entry.support as f64)
                .sum::<f64>()
                / support as f64
        }
    };
    let weighted_average = AverageMetrics {
        precision: weighted(|entry| entry.precision),
        recall: weighted(|entry| entry.recall),
        f1: weighted(|entry| entry.f1),
        support,
    };

    (macro_average, weighted_average)
}
