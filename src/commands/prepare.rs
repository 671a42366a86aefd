use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::batch::build_request_line;
use crate::cli::PrepareArgs;
use crate::config::{CachePaths, ClassifierConfig};
use crate::store::ItemStore;
use crate::util::ensure_directory;

pub fn run(args: PrepareArgs) -> Result<()> {
    let paths = CachePaths::new(&args.cache_root, args.db_path.as_deref());
    let config = ClassifierConfig::from_args(&args.classifier)?;
    let output = args.output.clone().unwrap_or_else(|| paths.batch_tasks());

    let store = ItemStore::open(&paths.db_path)?;
    let items = store.select_unprocessed(args.limit)?;
    if items.is_empty() {
        warn!(db = %paths.db_path.display(), "no unprocessed items, batch file not written");
        return Ok(());
    }

    if let Some(parent) = output.parent() {
        ensure_directory(parent)?;
    }
    let file = File::create(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    for item in &items {
        let line = build_request_line(item, &config, &args.endpoint);
        serde_json::to_writer(&mut writer, &line)
            .with_context(|| format!("failed to serialize request for {}", item.id))?;
        writer
            .write_all(b"\n")
            .with_context(|| format!("failed to write {}", output.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", output.display()))?;

    info!(
        path = %output.display(),
        requests = items.len(),
        model = %config.model,
        "batch request file written"
    );

    Ok(())
}
