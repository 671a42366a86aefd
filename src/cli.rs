use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_CAPACITY, DEFAULT_COMPLETION_WINDOW, DEFAULT_ENDPOINT};

#[derive(Parser, Debug)]
#[command(
    name = "cefrgrade",
    version,
    about = "CEFR sentence grading through an LLM service, with batch submission and accuracy diagnostics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load sentences into the item store.
    Import(ImportArgs),
    /// Classify unprocessed items one request at a time.
    Classify(ClassifyArgs),
    /// Classify a labelled CSV and report accuracy and drift.
    Evaluate(EvaluateArgs),
    /// Report on an already-classified CSV without calling the model.
    Report(ReportArgs),
    /// Write batch request lines for every unprocessed item.
    Prepare(PrepareArgs),
    /// Shard a batch request file into asynchronous jobs.
    Submit(SubmitArgs),
    /// Apply finished batch job outputs to the item store.
    Reconcile(ReconcileArgs),
    Status(StatusArgs),
    /// Clear every stored rating.
    Reset(ResetArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    #[arg(long)]
    pub api_base_url: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long, default_value_t = 120)]
    pub request_timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ClassifierArgs {
    #[arg(long, default_value = "qwen2.5:14b")]
    pub model: String,

    #[arg(long, default_value_t = 10)]
    pub max_retries: u32,

    #[arg(long, default_value_t = 500)]
    pub pause_ms: u64,

    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    #[arg(long, default_value_t = 500)]
    pub max_completion_tokens: u32,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long, default_value = ".cache/cefrgrade")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Plain text (one sentence per line) or JSONL with `id` and `text`.
    #[arg(long)]
    pub input: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    #[arg(long, default_value = ".cache/cefrgrade")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub translate: bool,

    #[command(flatten)]
    pub api: ApiArgs,

    #[command(flatten)]
    pub classifier: ClassifierArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long, default_value = ".cache/cefrgrade")]
    pub cache_root: PathBuf,

    /// CSV with `sentence`/`text`, optional `expected` and `previous_predicted`.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub sample_size: Option<usize>,

    /// Leave UNKNOWN out of the confusion matrix axes.
    #[arg(long, default_value_t = false)]
    pub exclude_unknown: bool,

    #[command(flatten)]
    pub api: ApiArgs,

    #[command(flatten)]
    pub classifier: ClassifierArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, default_value = ".cache/cefrgrade")]
    pub cache_root: PathBuf,

    /// CSV with `sentence`/`text`, `predicted`, optional `expected`,
    /// `previous_predicted` and `rationale`.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value_t = false)]
    pub exclude_unknown: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PrepareArgs {
    #[arg(long, default_value = ".cache/cefrgrade")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[command(flatten)]
    pub classifier: ClassifierArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    #[arg(long, default_value = ".cache/cefrgrade")]
    pub cache_root: PathBuf,

    /// Batch request file; defaults to the one written by `prepare`.
    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long, default_value = DEFAULT_COMPLETION_WINDOW)]
    pub completion_window: String,

    #[command(flatten)]
    pub api: ApiArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    #[arg(long, default_value = ".cache/cefrgrade")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// Model name recorded against applied results.
    #[arg(long, default_value = "qwen2.5:14b")]
    pub model: String,

    #[command(flatten)]
    pub api: ApiArgs,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/cefrgrade")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ResetArgs {
    #[arg(long, default_value = ".cache/cefrgrade")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Required; there is no interactive confirmation.
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}
