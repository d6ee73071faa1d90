//! Error types for the predictor

use thiserror::Error;

/// Predictor errors
#[derive(Error, Debug)]
pub enum PredictorError {
    #[error("Session {session}: expected 3 dice, got {count}")]
    InvalidDiceCount { session: u64, count: usize },

    #[error("Session {session}: die value {value} out of range 1..=6")]
    DieOutOfRange { session: u64, value: u8 },

    #[error("Session {session}: total {total} does not match dice sum {sum}")]
    TotalMismatch { session: u64, total: u8, sum: u8 },

    #[error("Session {session}: label {label} disagrees with total {total}")]
    LabelMismatch {
        session: u64,
        label: String,
        total: u8,
    },

    #[error("Unknown result label: {0}")]
    UnknownLabel(String),

    #[error("Session {session} is not after latest session {latest}")]
    OutOfOrder { session: u64, latest: u64 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for PredictorError {
    fn from(e: config::ConfigError) -> Self {
        PredictorError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for PredictorError {
    fn from(e: serde_json::Error) -> Self {
        PredictorError::Decode(e.to_string())
    }
}

impl PredictorError {
    /// True for errors caused by a bad boundary record
    pub fn is_malformed_record(&self) -> bool {
        matches!(
            self,
            PredictorError::InvalidDiceCount { .. }
                | PredictorError::DieOutOfRange { .. }
                | PredictorError::TotalMismatch { .. }
                | PredictorError::LabelMismatch { .. }
                | PredictorError::UnknownLabel(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PredictorError>;
