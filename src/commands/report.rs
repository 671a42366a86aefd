use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::ReportArgs;
use crate::config::CachePaths;
use crate::dataset::{DatasetRow, load_dataset};
use crate::orchestrator::Evaluation;

use super::{label_order, publish_evaluation};

pub fn run(args: ReportArgs) -> Result<()> {
    let paths = CachePaths::new(&args.cache_root, None);
    let dataset = load_dataset(&args.input)?;

    let (rows, predictions): (Vec<DatasetRow>, Vec<(String, String)>) = dataset
        .into_iter()
        .filter_map(|row| match row.predicted.clone() {
            Some(predicted) => {
                let rationale = row.rationale.clone().unwrap_or_default();
                Some((row, (predicted, rationale)))
            }
            None => {
                warn!(text = %row.text, "row without a prediction skipped");
                None
            }
        })
        .unzip();

    if rows.is_empty() {
        bail!(
            "{} has no rows with a `predicted` column value",
            args.input.display()
        );
    }
    info!(input = %args.input.display(), rows = rows.len(), "aggregating existing predictions");

    let evaluation =
        Evaluation::from_predictions(&rows, predictions, &label_order(args.exclude_unknown));
    publish_evaluation(&paths, "report", &evaluation)
}
