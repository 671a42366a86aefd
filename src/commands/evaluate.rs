use anyhow::{Result, bail};
use tracing::info;

use crate::api::ApiClient;
use crate::classifier::RetryingClassifier;
use crate::cli::EvaluateArgs;
use crate::config::{ApiConfig, CachePaths, ClassifierConfig};
use crate::dataset::load_dataset;
use crate::orchestrator::OnlineOrchestrator;

use super::{label_order, publish_evaluation};

pub fn run(args: EvaluateArgs) -> Result<()> {
    let paths = CachePaths::new(&args.cache_root, None);
    let config = ClassifierConfig::from_args(&args.classifier)?;
    let client = ApiClient::new(ApiConfig::from_args(&args.api)?)?;

    let mut dataset = load_dataset(&args.input)?;
    if let Some(sample_size) = args.sample_size {
        dataset.truncate(sample_size);
    }
    if dataset.is_empty() {
        bail!("{} has no rows to evaluate", args.input.display());
    }

    info!(
        input = %args.input.display(),
        rows = dataset.len(),
        model = %config.model,
        "starting evaluation"
    );

    let classifier = RetryingClassifier::new(&client, config);
    let orchestrator = OnlineOrchestrator::new(&classifier, None);
    let evaluation = orchestrator.evaluate(&dataset, &label_order(args.exclude_unknown));

    publish_evaluation(&paths, "evaluation", &evaluation)
}
