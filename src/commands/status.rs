use anyhow::Result;
use tracing::{info, warn};

use crate::batch::{DeadLetterLog, JobManifest};
use crate::cli::StatusArgs;
use crate::config::CachePaths;
use crate::store::ItemStore;

use super::log_label_counts;

pub fn run(args: StatusArgs) -> Result<()> {
    let paths = CachePaths::new(&args.cache_root, args.db_path.as_deref());
    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| paths.job_manifest());
    let dead_letter_path = manifest_path.with_file_name("dead_letters.json");

    info!(cache_root = %args.cache_root.display(), "status requested");

    if manifest_path.exists() {
        let manifest = JobManifest::load(&manifest_path)?;
        let resume = manifest.resume_point();
        info!(
            path = %manifest_path.display(),
            shards = manifest.len(),
            requests = manifest.submitted_request_count(),
            next_shard_index = resume.next_shard_index,
            resume_offset = resume.offset,
            "loaded job manifest"
        );
        for record in manifest.entries() {
            info!(
                shard_index = record.shard_index,
                job_id = %record.external_job_id,
                status_at_submit = %record.status,
                submitted_at = %record.submitted_at,
                requests = record.request_count,
                "shard"
            );
        }
    } else {
        warn!(path = %manifest_path.display(), "job manifest missing");
    }

    if dead_letter_path.exists() {
        let dead_letters = DeadLetterLog::load(&dead_letter_path)?;
        let dropped: u64 = dead_letters
            .entries()
            .iter()
            .map(|record| record.request_count)
            .sum();
        if dead_letters.is_empty() {
            info!(path = %dead_letter_path.display(), "no dead-lettered shards");
        } else {
            warn!(
                path = %dead_letter_path.display(),
                shards = dead_letters.len(),
                requests = dropped,
                "dead-lettered shards need operator attention"
            );
        }
    }

    if paths.db_path.exists() {
        let store = ItemStore::open(&paths.db_path)?;
        log_label_counts(&store.label_counts()?);
        let reconciled = store.reconciled_jobs()?;
        info!(
            reconciled_jobs = reconciled.len(),
            applied = reconciled.iter().map(|job| job.applied_count).sum::<u64>(),
            unparseable = reconciled.iter().map(|job| job.unparseable_count).sum::<u64>(),
            "reconciliation totals"
        );
    } else {
        warn!(path = %paths.db_path.display(), "database file missing");
    }

    Ok(())
}
