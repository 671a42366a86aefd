use anyhow::Result;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::classifier::{RetryingClassifier, Translator};
use crate::cli::ClassifyArgs;
use crate::config::{ApiConfig, CachePaths, ClassifierConfig};
use crate::orchestrator::OnlineOrchestrator;
use crate::store::{ItemStore, ItemUpdate};

use super::log_label_counts;

pub fn run(args: ClassifyArgs) -> Result<()> {
    let paths = CachePaths::new(&args.cache_root, args.db_path.as_deref());
    let config = ClassifierConfig::from_args(&args.classifier)?;
    let client = ApiClient::new(ApiConfig::from_args(&args.api)?)?;

    let store = ItemStore::open(&paths.db_path)?;
    let items = store.select_unprocessed(args.limit)?;
    if items.is_empty() {
        warn!(db = %paths.db_path.display(), "no unprocessed items");
        return Ok(());
    }

    info!(
        items = items.len(),
        model = %config.model,
        translate = args.translate,
        max_retries = config.max_retries,
        "starting online classification"
    );

    let translator = args
        .translate
        .then(|| Translator::new(&client, &config));
    let model = config.model.clone();
    let classifier = RetryingClassifier::new(&client, config);
    let orchestrator = OnlineOrchestrator::new(&classifier, translator.as_ref());

    let summary = orchestrator.classify_items(&items, |item| {
        let update = ItemUpdate {
            label: item.result.label,
            rationale: &item.result.rationale,
            grammar: &item.result.grammar,
            translation: item.translation.as_deref(),
            model: &model,
        };
        if !store.record_result(&item.request.id, &update)? {
            warn!(item_id = %item.request.id, "item vanished from the store before its result was recorded");
        }
        Ok(())
    })?;

    info!(
        classified = summary.classified,
        skipped = summary.skipped,
        unknown = summary.unknown,
        out_of_vocabulary = summary.out_of_vocabulary,
        exhausted = summary.exhausted,
        "online classification finished"
    );
    log_label_counts(&store.label_counts()?);

    Ok(())
}
