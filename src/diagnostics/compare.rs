use super::*;

/// One sentence classified in two runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPair {
    pub text: String,
    pub expected: Option<String>,
    /// Whether `expected` is an explicit correction rather than an inherited label.
    pub corrected: bool,
    pub previous: Option<String>,
    pub current: String,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunComparison {
    pub compared: usize,
    pub consistent: usize,
    pub consistency_rate: f64,
    pub corrected_total: usize,
    pub improved: Vec<RunPair>,
    pub regressed: Vec<RunPair>,
    pub improvement_rate: f64,
    pub regression_rate: f64,
}

/// Consistency is measured over rows that carry a previous prediction;
/// improvement and regression only over explicitly corrected rows.
pub fn compare_runs(pairs: &[RunPair]) -> RunComparison {
    let mut compared = 0usize;
    let mut consistent = 0usize;
    let mut corrected_total = 0usize;
    let mut improved = Vec::new();
    let mut regressed = Vec::new();

    for pair in pairs {
        let Some(previous) = pair.previous.as_deref() else {
            continue;
        };
        compared += 1;
        if labels_equal(previous, &pair.current) {
            consistent += 1;
        }

        let Some(expected) = pair.expected.as_deref().filter(|_| pair.corrected) else {
            continue;
        };
        corrected_total += 1;

        let now_right = labels_equal(&pair.current, expected);
        let was_right = labels_equal(previous, expected);
        match (was_right, now_right) {
            (false, true) => improved.push(pair.clone()),
            (true, false) => regressed.push(pair.clone()),
            _ => {}
        }
    }

    RunComparison {
        compared,
        consistent,
        consistency_rate: ratio(consistent, compared),
        corrected_total,
        improvement_rate: ratio(improved.len(), corrected_total),
        regression_rate: ratio(regressed.len(), corrected_total),
        improved,
        regressed,
    }
}
