//! History manager
//!
//! Owns the canonical outcome sequence, the running prediction tally and
//! the ensemble. It is the single mutation point for all predictor state:
//! every arrival is scored against the standing prediction, learned from
//! (using the history *before* the arrival), appended, and then a fresh
//! prediction is computed. Reordering those steps would let the ensemble
//! learn from the outcome it is being scored against.

mod shared;

pub use shared::SharedHistory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{PredictorError, Result};
use crate::ml::{default_signals, AdaptiveEnsemble, CurrentPrediction, WeightVector};
use crate::types::{classes, pattern_string, OutcomeClass, OutcomeRecord, RawRecord};

/// History manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of recent outcomes rendered in the report pattern
    #[serde(default = "default_pattern_length")]
    pub pattern_length: usize,
}

fn default_pattern_length() -> usize {
    50
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            pattern_length: default_pattern_length(),
        }
    }
}

/// Running correct/incorrect tally. Never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredictionStats {
    total_correct: u64,
    total_incorrect: u64,
}

impl PredictionStats {
    fn record(&mut self, correct: bool) {
        if correct {
            self.total_correct += 1;
        } else {
            self.total_incorrect += 1;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total_correct + self.total_incorrect;
        let correct_rate = if total > 0 {
            self.total_correct as f64 / total as f64
        } else {
            0.0
        };
        StatsSnapshot {
            total_correct: self.total_correct,
            total_incorrect: self.total_incorrect,
            total,
            correct_rate,
        }
    }
}

/// Point-in-time view of the tally
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_correct: u64,
    pub total_incorrect: u64,
    pub total: u64,
    /// Fraction in [0, 1]; 0 when nothing has been scored
    pub correct_rate: f64,
}

/// Result of one accepted arrival
#[derive(Debug, Clone, PartialEq)]
pub struct PushOutcome {
    pub session_id: u64,
    pub actual: OutcomeClass,
    /// Whether the standing prediction was right; `None` if there was none
    pub scored: Option<bool>,
    /// Prediction for the next session
    pub prediction: CurrentPrediction,
}

/// Serializable status snapshot for display
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub generated_at: DateTime<Utc>,
    pub latest: Option<OutcomeRecord>,
    pub next_session: Option<u64>,
    pub prediction: Option<CurrentPrediction>,
    pub stats: StatsSnapshot,
    /// Most recent classes, oldest first, as `H`/`L`
    pub pattern: String,
    pub weights: WeightVector,
}

/// Owner of history, tally and ensemble
#[derive(Debug)]
pub struct HistoryManager {
    config: HistoryConfig,
    ensemble: AdaptiveEnsemble,
    history: Vec<OutcomeRecord>,
    stats: PredictionStats,
    current_prediction: Option<CurrentPrediction>,
}

impl HistoryManager {
    pub fn new(ensemble: AdaptiveEnsemble, config: HistoryConfig) -> Self {
        Self {
            config,
            ensemble,
            history: Vec::new(),
            stats: PredictionStats::default(),
            current_prediction: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AdaptiveEnsemble::with_defaults(), HistoryConfig::default())
    }

    /// Build from application config with the full signal library
    pub fn from_config(config: &Config) -> Result<Self> {
        let ensemble = AdaptiveEnsemble::new(config.ensemble.clone(), default_signals())?;
        Ok(Self::new(ensemble, config.history.clone()))
    }

    /// Replace the history wholesale with a historical batch.
    ///
    /// Records are sorted by session id; duplicate ids keep the first
    /// occurrence. Weights are re-fitted and a prediction computed. The tally
    /// is left untouched. Returns the number of records kept.
    pub fn load_initial(&mut self, mut records: Vec<OutcomeRecord>) -> usize {
        records.sort_by_key(|r| r.session_id());
        let before = records.len();
        records.dedup_by_key(|r| r.session_id());
        if records.len() < before {
            tracing::warn!(
                "Dropped {} duplicate sessions from initial batch",
                before - records.len()
            );
        }

        self.history = records;
        self.ensemble.initialize_weights(&self.history);

        let prediction = self.ensemble.predict(&self.history);
        tracing::info!(
            "Loaded {} historical sessions; next session {} predicted {} ({:.0}%)",
            self.history.len(),
            self.next_session().map_or_else(|| "N/A".to_string(), |s| s.to_string()),
            prediction.predicted_class,
            prediction.confidence * 100.0
        );
        self.current_prediction = Some(prediction);
        self.history.len()
    }

    /// Validate a raw batch and load it. Any malformed record rejects the batch.
    pub fn load_initial_raw(&mut self, raw: Vec<RawRecord>) -> Result<usize> {
        let records = raw
            .into_iter()
            .map(OutcomeRecord::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(self.load_initial(records))
    }

    /// Apply one new outcome: score, learn, append, predict.
    pub fn push_record(&mut self, record: OutcomeRecord) -> Result<PushOutcome> {
        if let Some(latest) = self.history.last() {
            if record.session_id() <= latest.session_id() {
                return Err(PredictorError::OutOfOrder {
                    session: record.session_id(),
                    latest: latest.session_id(),
                });
            }
        }

        let session_id = record.session_id();
        let actual = record.outcome_class();

        let scored = self
            .current_prediction
            .as_ref()
            .map(|p| p.predicted_class == actual);
        if let Some(correct) = scored {
            self.stats.record(correct);
            let stats = self.stats.snapshot();
            tracing::info!(
                "Session {}: {} (actual {}), hit rate {:.2}% over {}",
                session_id,
                if correct { "CORRECT" } else { "WRONG" },
                actual,
                stats.correct_rate * 100.0,
                stats.total
            );
        }

        if self.history.len() >= 3 {
            self.ensemble.update_on_outcome(&self.history, actual);
        }

        self.history.push(record);

        let prediction = self.ensemble.predict(&self.history);
        tracing::info!(
            "Session {} -> {}; session {} predicted {} ({:.0}%)",
            session_id,
            actual,
            self.next_session().map_or_else(|| "N/A".to_string(), |s| s.to_string()),
            prediction.predicted_class,
            prediction.confidence * 100.0
        );
        self.current_prediction = Some(prediction.clone());

        Ok(PushOutcome {
            session_id,
            actual,
            scored,
            prediction,
        })
    }

    /// Validate a raw record and push it
    pub fn push_raw(&mut self, raw: RawRecord) -> Result<PushOutcome> {
        let record = OutcomeRecord::try_from(raw)?;
        self.push_record(record)
    }

    pub fn prediction(&self) -> Option<&CurrentPrediction> {
        self.current_prediction.as_ref()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Most recent `n` records, oldest first
    pub fn history(&self, n: usize) -> Vec<OutcomeRecord> {
        let start = self.history.len().saturating_sub(n);
        self.history[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn latest(&self) -> Option<&OutcomeRecord> {
        self.history.last()
    }

    /// `None` when empty or when the latest id is `u64::MAX`
    pub fn next_session(&self) -> Option<u64> {
        self.latest().and_then(|r| r.session_id().checked_add(1))
    }

    pub fn weights(&self) -> &WeightVector {
        self.ensemble.weights()
    }

    pub fn report(&self) -> PredictionReport {
        let start = self.history.len().saturating_sub(self.config.pattern_length);
        PredictionReport {
            generated_at: Utc::now(),
            latest: self.latest().cloned(),
            next_session: self.next_session(),
            prediction: self.current_prediction.clone(),
            stats: self.stats(),
            pattern: pattern_string(&classes(&self.history[start..])),
            weights: self.weights().clone(),
        }
    }
}
