//! Configuration model loaded from external sources.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("storage/index")
}

fn default_embedding_model() -> String {
    "all-minilm-l6-v2".to_string()
}

fn default_embedding_batch_size() -> usize {
    64
}

fn default_fetch_timeout_secs() -> u64 {
    20
}

fn default_zmq_address() -> String {
    "tcp://127.0.0.1:5556".to_string()
}

fn default_enrich_concurrency() -> usize {
    5
}

#[derive(Clone, Debug, Deserialize)]
/// Service configuration, read from YAML and `JOBSCOUT_*` variables.
pub struct AppConfig {
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default)]
    pub embedding_cache_dir: Option<PathBuf>,
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_zmq_address")]
    pub zmq_address: String,
    #[serde(default = "default_enrich_concurrency")]
    pub enrich_concurrency: usize,
}

impl AppConfig {
    /// Loads `path` if it exists, then applies environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("JOBSCOUT").try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be positive".to_string(),
            ));
        }
        if self.enrich_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "enrich_concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::{AppConfig, ConfigError};

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.yaml");

        let config = AppConfig::load(path.to_str().expect("utf-8 path")).expect("defaults");

        assert_eq!(config.index_dir, PathBuf::from("storage/index"));
        assert_eq!(config.embedding_model, "all-minilm-l6-v2");
        assert_eq!(config.fetch_timeout_secs, 20);
        assert_eq!(config.zmq_address, "tcp://127.0.0.1:5556");
        assert!(config.embedding_cache_dir.is_none());
    }

    #[test]
    fn yaml_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobscout.yaml");
        fs::write(
            &path,
            "index_dir: /var/lib/jobscout\nembedding_model: bge-small-en-v1.5\nfetch_timeout_secs: 5\n",
        )
        .expect("write config");

        let config = AppConfig::load(path.to_str().expect("utf-8 path")).expect("config");

        assert_eq!(config.index_dir, PathBuf::from("/var/lib/jobscout"));
        assert_eq!(config.embedding_model, "bge-small-en-v1.5");
        assert_eq!(config.fetch_timeout().as_secs(), 5);
        assert_eq!(config.enrich_concurrency, 5);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobscout.yaml");
        fs::write(&path, "fetch_timeout_secs: 0\n").expect("write config");

        assert!(matches!(
            AppConfig::load(path.to_str().expect("utf-8 path")),
            Err(ConfigError::Invalid(_))
        ));
    }
}
