use super::*;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitSummary {
    pub shards_submitted: u64,
    pub shards_failed: u64,
    pub requests_submitted: u64,
    pub requests_dropped: u64,
    pub requests_skipped_on_resume: u64,
    pub records: Vec<JobRecord>,
}

/// Drains a request stream into capacity-bounded shards, submitting each as
/// one asynchronous job. Shards are processed strictly one at a time.
pub struct ShardedSubmitter<F> {
    facility: F,
    config: SubmitterConfig,
    manifest: JobManifest,
    dead_letters: DeadLetterLog,
}

struct PendingShard<R> {
    index: u64,
    start_offset: u64,
    requests: Vec<R>,
}

impl<R> PendingShard<R> {
    fn end_offset(&self) -> u64 {
        self.start_offset + self.requests.len() as u64
    }
}

impl<F: BatchFacility> ShardedSubmitter<F> {
    /// Loads the manifest and dead-letter log named by `config`.
    pub fn open(facility: F, config: SubmitterConfig) -> Result<Self> {
        let manifest = JobManifest::load(&config.manifest_path)?;
        let dead_letters = DeadLetterLog::load(&config.dead_letter_path)?;
        Ok(Self {
            facility,
            config,
            manifest,
            dead_letters,
        })
    }

    pub fn manifest(&self) -> &JobManifest {
        &self.manifest
    }

    pub fn dead_letters(&self) -> &DeadLetterLog {
        &self.dead_letters
    }

    /// Submits every request past the manifest's resume cursor. A shard that
    /// fails to upload or start is dead-lettered and the run continues; only
    /// a failure to persist the manifest itself aborts.
    pub fn submit_all<I, R>(&mut self, requests: I) -> Result<SubmitSummary>
    where
        I: IntoIterator<Item = R>,
        R: Serialize,
    {
        let resume = self.manifest.resume_point();
        let capacity = self.config.capacity;
        let mut summary = SubmitSummary::default();

        if resume.offset > 0 {
            info!(
                resume_offset = resume.offset,
                next_shard_index = resume.next_shard_index,
                confirmed_shards = self.manifest.len(),
                "resuming from manifest"
            );
        }

        let mut offset = 0u64;
        let mut shard = PendingShard {
            index: resume.next_shard_index,
            start_offset: resume.offset,
            requests: Vec::with_capacity(capacity.min(4096)),
        };

        for request in requests {
            if offset < resume.offset {
                offset += 1;
                summary.requests_skipped_on_resume += 1;
                continue;
            }

            shard.requests.push(request);
            offset += 1;

            if shard.requests.len() >= capacity {
                self.submit_shard(&shard, &mut summary)?;
                shard = PendingShard {
                    index: shard.index + 1,
                    start_offset: offset,
                    requests: Vec::with_capacity(capacity.min(4096)),
                };
            }
        }

        if !shard.requests.is_empty() {
            self.submit_shard(&shard, &mut summary)?;
        }

        info!(
            shards_submitted = summary.shards_submitted,
            shards_failed = summary.shards_failed,
            requests_submitted = summary.requests_submitted,
            requests_dropped = summary.requests_dropped,
            requests_skipped_on_resume = summary.requests_skipped_on_resume,
            "submission finished"
        );

        Ok(summary)
    }

    fn submit_shard<R: Serialize>(
        &mut self,
        shard: &PendingShard<R>,
        summary: &mut SubmitSummary,
    ) -> Result<()> {
        let request_count = shard.requests.len() as u64;
        info!(shard_index = shard.index, request_count, "submitting shard");

        match self.push_shard(shard) {
            Ok(record) => {
                self.manifest.append(record.clone()).with_context(|| {
                    format!(
                        "job {} was created but could not be recorded in {}",
                        record.external_job_id,
                        self.manifest.path().display()
                    )
                })?;
                info!(
                    shard_index = record.shard_index,
                    job_id = %record.external_job_id,
                    file_id = %record.external_file_id,
                    status = %record.status,
                    "shard submitted"
                );
                summary.shards_submitted += 1;
                summary.requests_submitted += request_count;
                summary.records.push(record);
            }
            Err(err) => {
                error!(
                    shard_index = shard.index,
                    request_count,
                    error = %err,
                    "shard submission failed, requests dropped"
                );
                self.dead_letters.append(DeadLetterRecord {
                    shard_index: shard.index,
                    start_offset: shard.start_offset,
                    end_offset: shard.end_offset(),
                    request_count,
                    error: err.to_string(),
                    failed_at: now_utc_string(),
                })?;
                summary.shards_failed += 1;
                summary.requests_dropped += request_count;
            }
        }

        Ok(())
    }

    /// Serialize, upload, create job. The transient payload is dropped on return.
    fn push_shard<R: Serialize>(&self, shard: &PendingShard<R>) -> Result<JobRecord, ShardFailure> {
        let payload = encode_jsonl(shard).map_err(|err| ShardFailure::new("serialize", err))?;
        let payload_sha256 = sha256_hex(&payload);
        let file_name = format!("shard_{:05}.jsonl", shard.index);

        let file = self
            .facility
            .upload_batch_file(&file_name, payload)
            .map_err(|err| ShardFailure::new("upload", err))?;
        let job = self
            .facility
            .create_batch_job(&file.id, &self.config.endpoint, &self.config.completion_window)
            .map_err(|err| ShardFailure::new("create job", err))?;

        Ok(JobRecord {
            shard_index: shard.index,
            external_job_id: job.id,
            external_file_id: file.id,
            status: job.status,
            submitted_at: job
                .created_at
                .and_then(unix_to_utc_string)
                .unwrap_or_else(now_utc_string),
            request_count: shard.requests.len() as u64,
            start_offset: shard.start_offset,
            end_offset: shard.end_offset(),
            payload_sha256,
        })
    }
}

#[derive(Debug)]
struct ShardFailure {
    stage: &'static str,
    source: SubmissionError,
}

impl ShardFailure {
    fn new(stage: &'static str, source: SubmissionError) -> Self {
        Self { stage, source }
    }
}

impl std::fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.source)
    }
}

fn encode_jsonl<R: Serialize>(shard: &PendingShard<R>) -> Result<Vec<u8>, SubmissionError> {
    let mut payload = Vec::<u8>::new();
    for (position, request) in shard.requests.iter().enumerate() {
        serde_json::to_writer(&mut payload, request).map_err(|source| {
            SubmissionError::Serialize {
                offset: shard.start_offset + position as u64,
                source,
            }
        })?;
        payload.push(b'\n');
    }
    Ok(payload)
}
