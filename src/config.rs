use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};

use crate::cli::{ApiArgs, ClassifierArgs};

pub const DEFAULT_CAPACITY: usize = 45_000;
pub const DEFAULT_ENDPOINT: &str = "/v1/chat/completions";
pub const DEFAULT_COMPLETION_WINDOW: &str = "24h";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:11434/v1";
pub const API_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn from_args(args: &ApiArgs) -> Result<Self> {
        let base_url = args
            .api_base_url
            .clone()
            .or_else(|| std::env::var(API_BASE_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            bail!("api base url must not be empty");
        }

        // Flag wins over the environment.
        let api_key = args
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            base_url,
            api_key,
            timeout: Duration::from_secs(args.request_timeout_secs.max(1)),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model: String,
    pub max_retries: u32,
    pub pause: Duration,
    pub temperature: f32,
    pub max_completion_tokens: u32,
}

impl ClassifierConfig {
    pub fn new(model: &str, max_retries: u32, pause: Duration) -> Result<Self> {
        let model = model.trim();
        if model.is_empty() {
            bail!("model must not be empty");
        }
        if max_retries == 0 {
            bail!("max retries must be at least 1");
        }

        Ok(Self {
            model: model.to_string(),
            max_retries,
            pause,
            temperature: 0.0,
            max_completion_tokens: 500,
        })
    }

    pub fn from_args(args: &ClassifierArgs) -> Result<Self> {
        let mut config = Self::new(
            &args.model,
            args.max_retries,
            Duration::from_millis(args.pause_ms),
        )?;
        config.temperature = args.temperature;
        config.max_completion_tokens = args.max_completion_tokens;
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub capacity: usize,
    pub endpoint: String,
    pub completion_window: String,
    pub manifest_path: PathBuf,
    pub dead_letter_path: PathBuf,
}

impl SubmitterConfig {
    pub fn new(
        capacity: usize,
        endpoint: &str,
        completion_window: &str,
        manifest_path: PathBuf,
        dead_letter_path: PathBuf,
    ) -> Result<Self> {
        if capacity == 0 {
            bail!("shard capacity must be greater than zero");
        }
        if endpoint.trim().is_empty() {
            bail!("batch endpoint must not be empty");
        }

        Ok(Self {
            capacity,
            endpoint: endpoint.trim().to_string(),
            completion_window: completion_window.trim().to_string(),
            manifest_path,
            dead_letter_path,
        })
    }
}

/// Well-known locations under the cache root.
#[derive(Debug, Clone)]
pub struct CachePaths {
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub manifest_dir: PathBuf,
    pub report_dir: PathBuf,
}

impl CachePaths {
    pub fn new(cache_root: &Path, db_path: Option<&Path>) -> Self {
        Self {
            root: cache_root.to_path_buf(),
            db_path: db_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cache_root.join("cefrgrade.sqlite")),
            manifest_dir: cache_root.join("manifests"),
            report_dir: cache_root.join("reports"),
        }
    }

    pub fn job_manifest(&self) -> PathBuf {
        self.manifest_dir.join("active_batches.json")
    }

    pub fn batch_tasks(&self) -> PathBuf {
        self.root.join("batch_tasks.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::{ApiConfig, CachePaths, ClassifierConfig, SubmitterConfig};
    use crate::cli::ApiArgs;

    #[test]
    fn api_config_prefers_flags_and_trims() {
        let args = ApiArgs {
            api_base_url: Some(" https://api.example.test/v1/ ".to_string()),
            api_key: Some("  ".to_string()),
            request_timeout_secs: 0,
        };
        let config = ApiConfig::from_args(&args).expect("valid api config");
        assert_eq!(config.base_url, "https://api.example.test/v1");
        assert_eq!(config.api_key, None);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn classifier_config_rejects_zero_retries_and_blank_model() {
        assert!(ClassifierConfig::new("gpt-4o-mini", 0, Duration::ZERO).is_err());
        assert!(ClassifierConfig::new("  ", 3, Duration::ZERO).is_err());
        let config = ClassifierConfig::new(" qwen2.5:14b ", 10, Duration::from_millis(500))
            .expect("valid config");
        assert_eq!(config.model, "qwen2.5:14b");
    }

    #[test]
    fn submitter_config_rejects_zero_capacity() {
        let result = SubmitterConfig::new(
            0,
            "/v1/chat/completions",
            "24h",
            PathBuf::from("m.json"),
            PathBuf::from("d.json"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn cache_paths_default_under_root() {
        let paths = CachePaths::new(Path::new(".cache/cefrgrade"), None);
        assert_eq!(
            paths.db_path,
            PathBuf::from(".cache/cefrgrade/cefrgrade.sqlite")
        );
        assert_eq!(
            paths.job_manifest(),
            PathBuf::from(".cache/cefrgrade/manifests/active_batches.json")
        );
    }
}
