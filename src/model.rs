use std::fmt;

use serde::{Deserialize, Serialize};

/// CEFR proficiency label. `Unknown` is the sentinel for unparseable or
/// out-of-vocabulary classifier output and sits outside the level order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Label {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

pub const CEFR_LEVELS: [Label; 6] = [
    Label::A1,
    Label::A2,
    Label::B1,
    Label::B2,
    Label::C1,
    Label::C2,
];

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::C1 => "C1",
            Self::C2 => "C2",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Strict vocabulary lookup: surrounding whitespace is ignored, case is not.
    pub fn from_level(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        CEFR_LEVELS
            .iter()
            .copied()
            .find(|level| level.as_str() == trimmed)
    }

    /// Like [`Label::from_level`] but also accepts the sentinel spelling.
    pub fn parse_any(value: &str) -> Option<Self> {
        if value.trim() == Self::Unknown.as_str() {
            return Some(Self::Unknown);
        }
        Self::from_level(value)
    }

    /// 1-based position in the level order; `None` for the sentinel.
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::A1 => Some(1),
            Self::A2 => Some(2),
            Self::B1 => Some(3),
            Self::B2 => Some(4),
            Self::C1 => Some(5),
            Self::C2 => Some(6),
            Self::Unknown => None,
        }
    }

    /// Numeric rank as persisted in the item store (UNKNOWN is 0).
    pub fn stored_rank(self) -> i64 {
        self.rank().map(i64::from).unwrap_or(0)
    }

    pub fn is_adjacent(self, other: Label) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a.abs_diff(b) == 1,
            _ => false,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed ordered label set used for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<Label>,
}

impl LabelVocabulary {
    pub fn levels() -> Self {
        Self {
            labels: CEFR_LEVELS.to_vec(),
        }
    }

    pub fn with_unknown() -> Self {
        let mut labels = CEFR_LEVELS.to_vec();
        labels.push(Label::Unknown);
        Self { labels }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub id: String,
    pub text: String,
}

/// How a classification arrived at its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    Accepted,
    OutOfVocabulary { raw_label: String },
    Exhausted { last_error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub request_id: String,
    pub label: Label,
    pub rationale: String,
    pub grammar: Vec<String>,
    pub attempt_count: u32,
    pub disposition: Disposition,
}

/// One append-only manifest entry per confirmed shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub shard_index: u64,
    pub external_job_id: String,
    pub external_file_id: String,
    pub status: String,
    pub submitted_at: String,
    pub request_count: u64,
    pub start_offset: u64,
    pub end_offset: u64,
    pub payload_sha256: String,
}

/// A shard that failed upload or job creation and was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub shard_index: u64,
    pub start_offset: u64,
    pub end_offset: u64,
    pub request_count: u64,
    pub error: String,
    pub failed_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub text: String,
    pub expected: Option<String>,
    pub predicted: String,
    pub rationale: String,
}

impl EvaluationRow {
    pub fn new(text: &str, expected: Option<&str>, predicted: &str, rationale: &str) -> Self {
        Self {
            text: text.to_string(),
            expected: expected.map(ToOwned::to_owned),
            predicted: predicted.to_string(),
            rationale: rationale.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Label, LabelVocabulary};

    #[test]
    fn from_level_accepts_trimmed_exact_levels_only() {
        assert_eq!(Label::from_level(" B2 "), Some(Label::B2));
        assert_eq!(Label::from_level("b2"), None);
        assert_eq!(Label::from_level("UNKNOWN"), None);
        assert_eq!(Label::from_level("B3"), None);
        assert_eq!(Label::parse_any("UNKNOWN"), Some(Label::Unknown));
    }

    #[test]
    fn adjacency_ignores_unknown_sentinel() {
        assert!(Label::A2.is_adjacent(Label::B1));
        assert!(Label::C2.is_adjacent(Label::C1));
        assert!(!Label::A1.is_adjacent(Label::A1));
        assert!(!Label::A1.is_adjacent(Label::B1));
        assert!(!Label::C2.is_adjacent(Label::Unknown));
        assert_eq!(Label::Unknown.stored_rank(), 0);
        assert_eq!(Label::C2.stored_rank(), 6);
    }

    #[test]
    fn vocabulary_with_unknown_appends_sentinel_last() {
        let vocabulary = LabelVocabulary::with_unknown();
        assert_eq!(vocabulary.labels().len(), 7);
        assert_eq!(vocabulary.labels().last(), Some(&Label::Unknown));
        assert!(!LabelVocabulary::levels().labels().contains(&Label::Unknown));
    }
}
