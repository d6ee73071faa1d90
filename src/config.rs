//! Configuration management

use config::{Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::history::HistoryConfig;
use crate::ml::{default_signals, EnsembleConfig};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Feed ingestion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Bound of the channel between the reader and the history writer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Records loaded as the initial batch before live scoring starts
    #[serde(default)]
    pub warmup: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            warmup: 0,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// A missing file is not an error; defaults apply. Environment variables
    /// prefixed with `SICBO__` override file values, with `__` separating
    /// nested keys (e.g. `SICBO__ENSEMBLE__EMA_ALPHA=0.2`).
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = shellexpand::tilde(path);
        let config: Config = config::Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("SICBO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        tracing::debug!("Loaded config from {}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.ensemble.validate(default_signals().len())?;
        if self.feed.channel_capacity == 0 {
            return Err(crate::error::PredictorError::Config(
                "feed.channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
