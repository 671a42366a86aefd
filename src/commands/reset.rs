use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::ResetArgs;
use crate::config::CachePaths;
use crate::store::ItemStore;

pub fn run(args: ResetArgs) -> Result<()> {
    let paths = CachePaths::new(&args.cache_root, args.db_path.as_deref());
    if !args.yes {
        bail!(
            "refusing to clear ratings in {} without --yes",
            paths.db_path.display()
        );
    }
    if !paths.db_path.exists() {
        warn!(path = %paths.db_path.display(), "database file missing, nothing to reset");
        return Ok(());
    }

    let store = ItemStore::open(&paths.db_path)?;
    let cleared = store.reset_ratings()?;
    info!(path = %paths.db_path.display(), cleared, "ratings reset");

    Ok(())
}
