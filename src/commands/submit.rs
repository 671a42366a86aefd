use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::batch::{ShardedSubmitter, read_request_lines};
use crate::cli::SubmitArgs;
use crate::config::{ApiConfig, CachePaths, SubmitterConfig};
use crate::util::{utc_compact_string, write_json_pretty};

pub fn run(args: SubmitArgs) -> Result<()> {
    let paths = CachePaths::new(&args.cache_root, None);
    let input = args.input.clone().unwrap_or_else(|| paths.batch_tasks());
    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| paths.job_manifest());
    let dead_letter_path = manifest_path.with_file_name("dead_letters.json");

    let config = SubmitterConfig::new(
        args.capacity,
        &args.endpoint,
        &args.completion_window,
        manifest_path,
        dead_letter_path,
    )?;
    let client = ApiClient::new(ApiConfig::from_args(&args.api)?)?;

    info!(
        input = %input.display(),
        manifest = %config.manifest_path.display(),
        capacity = config.capacity,
        "starting sharded submission"
    );

    let requests = read_request_lines(&input)?;
    let mut submitter = ShardedSubmitter::open(&client, config)?;
    let summary = submitter.submit_all(requests)?;

    if summary.shards_failed > 0 {
        warn!(
            shards_failed = summary.shards_failed,
            requests_dropped = summary.requests_dropped,
            dead_letters = %submitter.dead_letters().path().display(),
            "some shards were not submitted; compare submitted against source counts"
        );
    }

    let summary_path = paths
        .report_dir
        .join(format!("submit_{}.json", utc_compact_string(Utc::now())));
    write_json_pretty(&summary_path, &summary)?;
    info!(
        path = %summary_path.display(),
        confirmed_requests = submitter.manifest().submitted_request_count(),
        "wrote submission summary"
    );

    Ok(())
}
