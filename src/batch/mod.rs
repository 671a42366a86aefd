//! Sharded submission of classification requests to an asynchronous batch
//! facility, with an append-only job manifest for crash resumption and a
//! reconciliation pass that applies finished job outputs to the item store.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::classifier::{ValidatedLabel, parse_label_response};
use crate::config::SubmitterConfig;
use crate::error::SubmissionError;
use crate::model::{DeadLetterRecord, JobRecord};
use crate::util::{now_utc_string, sha256_hex, unix_to_utc_string, write_json_durable};

mod manifest;
mod reconcile;
mod request_line;
mod submitter;
#[cfg(test)]
mod tests;

pub use self::manifest::{DeadLetterLog, JobManifest, ResumePoint};
pub use self::reconcile::{OutputLine, OutputOutcome, is_terminal_status, parse_output_file};
pub use self::request_line::{BatchRequestLine, build_request_line, read_request_lines};
pub use self::submitter::{ShardedSubmitter, SubmitSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
    pub status: String,
    pub created_at: Option<i64>,
    pub output_file_id: Option<String>,
    pub error_file_id: Option<String>,
}

/// The external asynchronous processing facility.
pub trait BatchFacility {
    fn upload_batch_file(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<FileHandle, SubmissionError>;

    fn create_batch_job(
        &self,
        input_file_id: &str,
        endpoint: &str,
        completion_window: &str,
    ) -> Result<JobHandle, SubmissionError>;

    fn retrieve_batch_job(&self, job_id: &str) -> Result<JobHandle, SubmissionError>;

    fn download_file_content(&self, file_id: &str) -> Result<String, SubmissionError>;
}

impl<T: BatchFacility + ?Sized> BatchFacility for &T {
    fn upload_batch_file(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<FileHandle, SubmissionError> {
        (**self).upload_batch_file(file_name, contents)
    }

    fn create_batch_job(
        &self,
        input_file_id: &str,
        endpoint: &str,
        completion_window: &str,
    ) -> Result<JobHandle, SubmissionError> {
        (**self).create_batch_job(input_file_id, endpoint, completion_window)
    }

    fn retrieve_batch_job(&self, job_id: &str) -> Result<JobHandle, SubmissionError> {
        (**self).retrieve_batch_job(job_id)
    }

    fn download_file_content(&self, file_id: &str) -> Result<String, SubmissionError> {
        (**self).download_file_content(file_id)
    }
}
