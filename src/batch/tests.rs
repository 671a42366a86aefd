use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::config::ClassifierConfig;
use crate::model::{ClassificationRequest, Label};

/// In-memory facility. Uploads whose 1-based call number is listed in
/// `fail_uploads` are rejected; everything else succeeds with sequential ids.
#[derive(Default)]
struct FakeFacility {
    fail_uploads: BTreeSet<u32>,
    uploads: RefCell<Vec<(String, Vec<u8>)>>,
    upload_calls: Cell<u32>,
    jobs_created: Cell<u32>,
}

impl FakeFacility {
    fn failing_on(calls: &[u32]) -> Self {
        Self {
            fail_uploads: calls.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn uploaded_line_counts(&self) -> Vec<usize> {
        self.uploads
            .borrow()
            .iter()
            .map(|(_, bytes)| bytes.iter().filter(|byte| **byte == b'\n').count())
            .collect()
    }
}

impl BatchFacility for FakeFacility {
    fn upload_batch_file(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<FileHandle, SubmissionError> {
        let call = self.upload_calls.get() + 1;
        self.upload_calls.set(call);
        if self.fail_uploads.contains(&call) {
            return Err(SubmissionError::Status {
                status: 500,
                body: "upload rejected".to_string(),
            });
        }
        self.uploads
            .borrow_mut()
            .push((file_name.to_string(), contents));
        Ok(FileHandle {
            id: format!("file-{call}"),
        })
    }

    fn create_batch_job(
        &self,
        input_file_id: &str,
        _endpoint: &str,
        _completion_window: &str,
    ) -> Result<JobHandle, SubmissionError> {
        let created = self.jobs_created.get() + 1;
        self.jobs_created.set(created);
        Ok(JobHandle {
            id: format!("batch-{input_file_id}"),
            status: "validating".to_string(),
            created_at: Some(1_767_225_600),
            output_file_id: None,
            error_file_id: None,
        })
    }

    fn retrieve_batch_job(&self, job_id: &str) -> Result<JobHandle, SubmissionError> {
        Err(SubmissionError::Transport(format!("unexpected lookup of {job_id}")))
    }

    fn download_file_content(&self, file_id: &str) -> Result<String, SubmissionError> {
        Err(SubmissionError::Transport(format!("unexpected download of {file_id}")))
    }
}

fn submitter_config(dir: &TempDir, capacity: usize) -> SubmitterConfig {
    SubmitterConfig::new(
        capacity,
        "/v1/chat/completions",
        "24h",
        dir.path().join("manifests/active_batches.json"),
        dir.path().join("manifests/dead_letters.json"),
    )
    .expect("valid submitter config")
}

fn requests(count: u64) -> Vec<ClassificationRequest> {
    (0..count)
        .map(|index| ClassificationRequest {
            id: format!("item-{index}"),
            text: format!("Sentence number {index}."),
        })
        .collect()
}

#[test]
fn submit_all_splits_stream_into_capacity_bounded_shards() {
    let dir = TempDir::new().expect("tempdir");
    let facility = FakeFacility::default();
    let mut submitter =
        ShardedSubmitter::open(&facility, submitter_config(&dir, 4)).expect("open submitter");

    let summary = submitter.submit_all(requests(10)).expect("submit");

    assert_eq!(summary.shards_submitted, 3);
    assert_eq!(summary.shards_failed, 0);
    assert_eq!(summary.requests_submitted, 10);
    assert_eq!(facility.uploaded_line_counts(), vec![4, 4, 2]);
    assert_eq!(submitter.manifest().len(), 3);

    let offsets: Vec<(u64, u64, u64)> = submitter
        .manifest()
        .entries()
        .iter()
        .map(|record| (record.shard_index, record.start_offset, record.end_offset))
        .collect();
    assert_eq!(offsets, vec![(1, 0, 4), (2, 4, 8), (3, 8, 10)]);

    let first = &submitter.manifest().entries()[0];
    assert_eq!(first.external_file_id, "file-1");
    assert_eq!(first.external_job_id, "batch-file-1");
    assert_eq!(first.submitted_at, "2026-01-01T00:00:00Z");
    assert_eq!(first.payload_sha256.len(), 64);

    let names: Vec<String> = facility
        .uploads
        .borrow()
        .iter()
        .map(|(name, _)| name.clone())
        .collect();
    assert_eq!(names[0], "shard_00001.jsonl");
}

#[test]
fn submit_all_with_empty_stream_touches_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let facility = FakeFacility::default();
    let mut submitter =
        ShardedSubmitter::open(&facility, submitter_config(&dir, 4)).expect("open submitter");

    let summary = submitter.submit_all(requests(0)).expect("submit");

    assert_eq!(summary, SubmitSummary::default());
    assert_eq!(facility.upload_calls.get(), 0);
    assert!(!dir.path().join("manifests/active_batches.json").exists());
}

#[test]
fn exact_multiple_of_capacity_leaves_no_trailing_shard() {
    let dir = TempDir::new().expect("tempdir");
    let facility = FakeFacility::default();
    let mut submitter =
        ShardedSubmitter::open(&facility, submitter_config(&dir, 5)).expect("open submitter");

    let summary = submitter.submit_all(requests(10)).expect("submit");

    assert_eq!(summary.shards_submitted, 2);
    assert_eq!(facility.uploaded_line_counts(), vec![5, 5]);
}

#[test]
fn failed_shard_is_dead_lettered_and_run_continues() {
    let dir = TempDir::new().expect("tempdir");
    let facility = FakeFacility::failing_on(&[2]);
    let mut submitter =
        ShardedSubmitter::open(&facility, submitter_config(&dir, 3)).expect("open submitter");

    let summary = submitter.submit_all(requests(8)).expect("submit");

    assert_eq!(summary.shards_submitted, 2);
    assert_eq!(summary.shards_failed, 1);
    assert_eq!(summary.requests_submitted, 5);
    assert_eq!(summary.requests_dropped, 3);
    assert_eq!(facility.jobs_created.get(), 2);

    let indices: Vec<u64> = submitter
        .manifest()
        .entries()
        .iter()
        .map(|record| record.shard_index)
        .collect();
    assert_eq!(indices, vec![1, 3]);

    let dead = submitter.dead_letters().entries();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].shard_index, 2);
    assert_eq!((dead[0].start_offset, dead[0].end_offset), (3, 6));
    assert!(dead[0].error.starts_with("upload failed:"));
}

#[test]
fn resume_skips_requests_covered_by_confirmed_shards() {
    let dir = TempDir::new().expect("tempdir");

    {
        let facility = FakeFacility::default();
        let mut submitter =
            ShardedSubmitter::open(&facility, submitter_config(&dir, 4)).expect("open submitter");
        submitter.submit_all(requests(8)).expect("first run");
    }

    let facility = FakeFacility::default();
    let mut submitter =
        ShardedSubmitter::open(&facility, submitter_config(&dir, 4)).expect("reopen submitter");
    assert_eq!(
        submitter.manifest().resume_point(),
        ResumePoint {
            next_shard_index: 3,
            offset: 8,
        }
    );

    let summary = submitter.submit_all(requests(11)).expect("second run");

    assert_eq!(summary.requests_skipped_on_resume, 8);
    assert_eq!(summary.shards_submitted, 1);
    assert_eq!(facility.uploaded_line_counts(), vec![3]);

    let last = submitter.manifest().entries().last().expect("new record");
    assert_eq!(last.shard_index, 3);
    assert_eq!((last.start_offset, last.end_offset), (8, 11));
    assert_eq!(submitter.manifest().len(), 3);
    assert_eq!(submitter.manifest().submitted_request_count(), 11);
}

#[test]
fn manifest_reload_preserves_entries_in_order() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("active_batches.json");

    let mut manifest = JobManifest::load(&path).expect("load empty");
    assert!(manifest.is_empty());
    assert_eq!(
        manifest.resume_point(),
        ResumePoint {
            next_shard_index: 1,
            offset: 0,
        }
    );

    for index in 1..=2u64 {
        manifest
            .append(JobRecord {
                shard_index: index,
                external_job_id: format!("batch-{index}"),
                external_file_id: format!("file-{index}"),
                status: "validating".to_string(),
                submitted_at: "2026-01-01T00:00:00Z".to_string(),
                request_count: 2,
                start_offset: (index - 1) * 2,
                end_offset: index * 2,
                payload_sha256: "00".repeat(32),
            })
            .expect("append");
    }

    let reloaded = JobManifest::load(&path).expect("reload");
    assert_eq!(reloaded.entries(), manifest.entries());
    assert!(!dir.path().join(".active_batches.json.tmp").exists());
}

#[test]
fn whitespace_manifest_loads_as_empty() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("active_batches.json");
    fs::write(&path, "  \n").expect("write");

    let manifest = JobManifest::load(&path).expect("load");
    assert!(manifest.is_empty());
}

#[test]
fn corrupt_manifest_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("active_batches.json");
    fs::write(&path, "[{\"shard_index\":").expect("write");

    assert!(JobManifest::load(&path).is_err());
}

#[test]
fn request_line_carries_prompt_and_json_mode() {
    let config = ClassifierConfig::new("gpt-4o-mini", 10, std::time::Duration::ZERO)
        .expect("classifier config");
    let request = ClassificationRequest {
        id: "abc".to_string(),
        text: "I like apples.".to_string(),
    };

    let line = build_request_line(&request, &config, "/v1/chat/completions");

    assert_eq!(line.custom_id, "abc");
    assert_eq!(line.method, "POST");
    assert_eq!(line.url, "/v1/chat/completions");
    assert_eq!(line.body["model"], "gpt-4o-mini");
    assert_eq!(line.body["response_format"]["type"], "json_object");
    let messages = line.body["messages"].as_array().expect("messages array");
    assert_eq!(messages[0]["role"], "system");
    let last = messages.last().expect("user message");
    assert_eq!(last["role"], "user");
    assert_eq!(last["content"], "I like apples.");
}

#[test]
fn read_request_lines_skips_blank_and_malformed_lines() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("batch_tasks.jsonl");
    let good = json!({
        "custom_id": "a",
        "method": "POST",
        "url": "/v1/chat/completions",
        "body": {"model": "m"}
    });
    let contents = format!("{good}\n\nnot json\n{good}\n");
    fs::write(&path, contents).expect("write");

    let lines: Vec<BatchRequestLine> = read_request_lines(&path).expect("open").collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].custom_id, "a");
}

#[test]
fn parse_output_file_separates_labels_from_failures() {
    let ok = json!({
        "custom_id": "one",
        "response": {
            "status_code": 200,
            "body": {"choices": [{"message": {"content":
                "{\"cefr_level\": \"B1\", \"reasoning\": \"past tense\", \"grammar\": [\"past simple\"]}"
            }}]}
        }
    });
    let out_of_vocabulary = json!({
        "custom_id": "two",
        "response": {
            "status_code": 200,
            "body": {"choices": [{"message": {"content":
                "{\"cefr_level\": \"B3\", \"reasoning\": \"r\"}"
            }}]}
        }
    });
    let failed = json!({
        "custom_id": "three",
        "response": {"status_code": 429, "body": {}}
    });
    let garbled = json!({
        "custom_id": "four",
        "response": {
            "status_code": 200,
            "body": {"choices": [{"message": {"content": "level: B2"}}]}
        }
    });
    let contents = format!("{ok}\n{out_of_vocabulary}\n\n{failed}\n{{broken\n{garbled}\n");

    let lines = parse_output_file(&contents);
    assert_eq!(lines.len(), 4);

    match &lines[0].outcome {
        OutputOutcome::Labelled(validated) => {
            assert_eq!(validated.label, Label::B1);
            assert_eq!(validated.grammar, vec!["past simple".to_string()]);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    match &lines[1].outcome {
        OutputOutcome::Labelled(validated) => assert_eq!(validated.label, Label::Unknown),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(matches!(lines[2].outcome, OutputOutcome::Unparseable(_)));
    assert_eq!(lines[3].custom_id, "four");
    assert!(matches!(lines[3].outcome, OutputOutcome::Unparseable(_)));
}

#[test]
fn terminal_statuses_are_closed_set() {
    for status in ["completed", "expired", "cancelled", "failed"] {
        assert!(is_terminal_status(status));
    }
    for status in ["validating", "in_progress", "finalizing", "cancelling"] {
        assert!(!is_terminal_status(status));
    }
}
