use anyhow::Result;
use tracing::info;

use crate::cli::ImportArgs;
use crate::config::CachePaths;
use crate::dataset::load_sentences;
use crate::store::ItemStore;

pub fn run(args: ImportArgs) -> Result<()> {
    let paths = CachePaths::new(&args.cache_root, args.db_path.as_deref());
    let requests = load_sentences(&args.input)?;

    let mut store = ItemStore::open(&paths.db_path)?;
    let summary = store.import_items(&requests)?;

    info!(
        input = %args.input.display(),
        db = %paths.db_path.display(),
        read = requests.len(),
        inserted = summary.inserted,
        already_present = summary.already_present,
        "import finished"
    );

    Ok(())
}
