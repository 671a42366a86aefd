/// Failure of a single classification attempt. Every variant is retryable;
/// an out-of-vocabulary label is not an error and never reaches this type.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("inference transport failed: {0}")]
    Transport(String),

    #[error("inference service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("inference response had no choices")]
    EmptyChoices,

    #[error("inference response is not a JSON object: {0}")]
    Parse(String),

    #[error("inference response field `{field}` missing or mistyped")]
    MissingField { field: &'static str },
}

/// Failure while pushing one shard to the batch facility.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("failed to serialize request at offset {offset}: {source}")]
    Serialize {
        offset: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("batch facility transport failed: {0}")]
    Transport(String),

    #[error("batch facility returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("batch facility response could not be decoded: {0}")]
    Decode(String),
}
