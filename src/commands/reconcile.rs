use anyhow::Result;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::batch::{
    BatchFacility, JobManifest, OutputLine, OutputOutcome, is_terminal_status, parse_output_file,
};
use crate::cli::ReconcileArgs;
use crate::config::{ApiConfig, CachePaths};
use crate::store::{ItemStore, ItemUpdate, ReconciledJob};

use super::log_label_counts;

#[derive(Debug, Default)]
struct ReconcileTotals {
    applied_jobs: usize,
    pending_jobs: usize,
    already_reconciled: usize,
    lookup_failures: usize,
    applied_items: u64,
    unparseable_items: u64,
}

pub fn run(args: ReconcileArgs) -> Result<()> {
    let paths = CachePaths::new(&args.cache_root, args.db_path.as_deref());
    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| paths.job_manifest());

    let manifest = JobManifest::load(&manifest_path)?;
    if manifest.is_empty() {
        warn!(path = %manifest_path.display(), "job manifest is empty, nothing to reconcile");
        return Ok(());
    }

    let client = ApiClient::new(ApiConfig::from_args(&args.api)?)?;
    let mut store = ItemStore::open(&paths.db_path)?;
    let mut totals = ReconcileTotals::default();

    for record in manifest.entries() {
        if store.is_job_reconciled(&record.external_job_id)? {
            totals.already_reconciled += 1;
            continue;
        }

        let job = match client.retrieve_batch_job(&record.external_job_id) {
            Ok(job) => job,
            Err(err) => {
                warn!(
                    shard_index = record.shard_index,
                    job_id = %record.external_job_id,
                    error = %err,
                    "job lookup failed, will retry on a later run"
                );
                totals.lookup_failures += 1;
                continue;
            }
        };

        if !is_terminal_status(&job.status) {
            info!(
                shard_index = record.shard_index,
                job_id = %job.id,
                status = %job.status,
                "job still running"
            );
            totals.pending_jobs += 1;
            continue;
        }

        let lines = match &job.output_file_id {
            Some(file_id) => match client.download_file_content(file_id) {
                Ok(contents) => parse_output_file(&contents),
                Err(err) => {
                    warn!(
                        shard_index = record.shard_index,
                        job_id = %job.id,
                        file_id = %file_id,
                        error = %err,
                        "output download failed, will retry on a later run"
                    );
                    totals.lookup_failures += 1;
                    continue;
                }
            },
            None => {
                warn!(
                    shard_index = record.shard_index,
                    job_id = %job.id,
                    status = %job.status,
                    "terminal job has no output file"
                );
                Vec::new()
            }
        };

        if job.status != "completed" {
            warn!(
                shard_index = record.shard_index,
                job_id = %job.id,
                status = %job.status,
                error_file_id = %job.error_file_id.as_deref().unwrap_or("-"),
                "job ended without completing; unanswered items stay unprocessed"
            );
        }

        let (updates, unparseable) = collect_updates(&lines, &args.model);
        let applied = store.apply_job_results(
            &ReconciledJob {
                external_job_id: job.id.clone(),
                status: job.status.clone(),
                output_file_id: job.output_file_id.clone(),
                applied_count: 0,
                unparseable_count: unparseable,
            },
            &updates,
        )?;

        info!(
            shard_index = record.shard_index,
            job_id = %job.id,
            status = %job.status,
            applied,
            unparseable,
            "job reconciled"
        );
        totals.applied_jobs += 1;
        totals.applied_items += applied;
        totals.unparseable_items += unparseable;
    }

    info!(
        applied_jobs = totals.applied_jobs,
        pending_jobs = totals.pending_jobs,
        already_reconciled = totals.already_reconciled,
        lookup_failures = totals.lookup_failures,
        applied_items = totals.applied_items,
        unparseable_items = totals.unparseable_items,
        "reconciliation finished"
    );
    log_label_counts(&store.label_counts()?);

    Ok(())
}

/// Labelled lines become store updates; unparseable ones only count, leaving
/// their items unprocessed for a later run.
fn collect_updates<'a>(lines: &'a [OutputLine], model: &'a str) -> (Vec<(String, ItemUpdate<'a>)>, u64) {
    let mut updates = Vec::with_capacity(lines.len());
    let mut unparseable = 0u64;

    for line in lines {
        match &line.outcome {
            OutputOutcome::Labelled(validated) => updates.push((
                line.custom_id.clone(),
                ItemUpdate {
                    label: validated.label,
                    rationale: &validated.reasoning,
                    grammar: &validated.grammar,
                    translation: None,
                    model,
                },
            )),
            OutputOutcome::Unparseable(reason) => {
                warn!(item_id = %line.custom_id, reason = %reason, "unparseable output line");
                unparseable += 1;
            }
        }
    }

    (updates, unparseable)
}
