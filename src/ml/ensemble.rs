//! Adaptive ensemble
//!
//! Combines the signal library into one prediction:
//! - Backtest initialization of per-signal weights
//! - Online multiplicative reward/penalty blended by an EMA
//! - Weighted voting with a clamped confidence
//!
//! Weights always sum to 1 and never drop below `min_weight`, so a signal
//! that went through a bad stretch can still recover.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{PredictorError, Result};
use crate::ml::features::ClassCounts;
use crate::ml::signals::{default_signals, frequency_rebalance, Signal};
use crate::types::{classes, OutcomeClass, OutcomeRecord};

/// Minimum window length for backtest initialization
const MIN_FIT_LEN: usize = 10;
/// First prefix length scored during backtest
const FIT_START: usize = 3;
/// Confidence reported when no signal votes
pub const FALLBACK_CONFIDENCE: f64 = 0.5;
const MIN_CONFIDENCE: f64 = 0.51;
const MAX_CONFIDENCE: f64 = 0.99;

/// Configuration for the adaptive ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Blend between the rewarded weight and the old weight, in (0, 1]
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,
    /// Floor for every weight
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,
    /// Number of most recent outcomes used by backtest initialization
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Multiplicative reward (hit) or penalty (miss or abstain)
    #[serde(default = "default_reward_rate")]
    pub reward_rate: f64,
}

fn default_ema_alpha() -> f64 {
    0.1
}

fn default_min_weight() -> f64 {
    0.001
}

fn default_history_window() -> usize {
    500
}

fn default_reward_rate() -> f64 {
    0.1
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            ema_alpha: default_ema_alpha(),
            min_weight: default_min_weight(),
            history_window: default_history_window(),
            reward_rate: default_reward_rate(),
        }
    }
}

impl EnsembleConfig {
    /// Check parameter ranges for an ensemble of `signal_count` signals
    pub fn validate(&self, signal_count: usize) -> Result<()> {
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(PredictorError::Config(format!(
                "ema_alpha must be in (0, 1], got {}",
                self.ema_alpha
            )));
        }
        if !(self.min_weight > 0.0) {
            return Err(PredictorError::Config(format!(
                "min_weight must be positive, got {}",
                self.min_weight
            )));
        }
        if self.min_weight * signal_count as f64 > 1.0 {
            return Err(PredictorError::Config(format!(
                "min_weight {} too large for {} signals",
                self.min_weight, signal_count
            )));
        }
        if !(0.0..1.0).contains(&self.reward_rate) {
            return Err(PredictorError::Config(format!(
                "reward_rate must be in [0, 1), got {}",
                self.reward_rate
            )));
        }
        if self.history_window == 0 {
            return Err(PredictorError::Config("history_window must be at least 1".into()));
        }
        Ok(())
    }
}

/// Ordered mapping from signal id to weight
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    entries: Vec<(&'static str, f64)>,
}

impl WeightVector {
    /// Equal weights summing to 1
    pub fn uniform(ids: impl IntoIterator<Item = &'static str>) -> Self {
        let mut entries: Vec<(&'static str, f64)> = ids.into_iter().map(|id| (id, 1.0)).collect();
        let n = entries.len() as f64;
        for (_, w) in entries.iter_mut() {
            *w /= n;
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.entries.iter().find(|(k, _)| *k == id).map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut f64> + '_ {
        self.entries.iter_mut().map(|(_, w)| w)
    }

    /// Scale to sum 1 while keeping every weight at or above `floor`.
    ///
    /// Weights that would fall under the floor are pinned to it and the
    /// remaining mass is shared proportionally among the rest. When no weight
    /// binds this is a plain division by the sum. Requires `floor * len <= 1`.
    fn normalize_with_floor(&mut self, floor: f64) {
        let n = self.entries.len();
        if n == 0 {
            return;
        }
        let raw: Vec<f64> = self.entries.iter().map(|(_, w)| w.max(0.0)).collect();
        let mut pinned = vec![false; n];

        loop {
            let pinned_count = pinned.iter().filter(|&&p| p).count();
            let free_mass = 1.0 - floor * pinned_count as f64;
            let free_sum: f64 = raw
                .iter()
                .zip(&pinned)
                .filter(|(_, p)| !**p)
                .map(|(w, _)| w)
                .sum();
            let free_count = n - pinned_count;

            let scaled = |w: f64| {
                if free_sum > 0.0 {
                    w / free_sum * free_mass
                } else {
                    free_mass / free_count as f64
                }
            };

            let mut changed = false;
            for i in 0..n {
                if !pinned[i] && scaled(raw[i]) < floor {
                    pinned[i] = true;
                    changed = true;
                }
            }

            if !changed {
                for (i, w) in self.values_mut().enumerate() {
                    *w = if pinned[i] { floor } else { scaled(raw[i]) };
                }
                return;
            }
        }
    }
}

impl Serialize for WeightVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, w) in &self.entries {
            map.serialize_entry(id, w)?;
        }
        map.end()
    }
}

/// Accumulated vote weight per class
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VoteTally {
    pub high: f64,
    pub low: f64,
}

impl VoteTally {
    fn add(&mut self, class: OutcomeClass, weight: f64) {
        match class {
            OutcomeClass::High => self.high += weight,
            OutcomeClass::Low => self.low += weight,
        }
    }

    pub fn total(&self) -> f64 {
        self.high + self.low
    }
}

/// The ensemble's prediction for the next outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentPrediction {
    pub predicted_class: OutcomeClass,
    /// 0.5 for a fallback, otherwise in [0.51, 0.99]
    pub confidence: f64,
    pub votes: VoteTally,
    /// True when no signal voted and the fallback rule decided
    pub fallback: bool,
}

/// One signal's vote alongside its current weight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalVote {
    pub id: &'static str,
    pub vote: Option<OutcomeClass>,
    pub weight: f64,
}

/// Weighted-vote ensemble over the signal library
pub struct AdaptiveEnsemble {
    config: EnsembleConfig,
    signals: Vec<Signal>,
    weights: WeightVector,
}

impl AdaptiveEnsemble {
    pub fn new(config: EnsembleConfig, signals: Vec<Signal>) -> Result<Self> {
        config.validate(signals.len())?;
        let weights = WeightVector::uniform(signals.iter().map(|s| s.id));
        Ok(Self {
            config,
            signals,
            weights,
        })
    }

    /// Default configuration over the full signal library
    pub fn with_defaults() -> Self {
        let signals = default_signals();
        Self {
            weights: WeightVector::uniform(signals.iter().map(|s| s.id)),
            config: EnsembleConfig::default(),
            signals,
        }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn weight(&self, id: &str) -> Option<f64> {
        self.weights.get(id)
    }

    pub fn signal_ids(&self) -> Vec<&'static str> {
        self.signals.iter().map(|s| s.id).collect()
    }

    /// Backtest the signals over the recent window and seed weights.
    ///
    /// Returns false (weights untouched) when the window holds fewer than
    /// 10 outcomes.
    pub fn initialize_weights(&mut self, history: &[OutcomeRecord]) -> bool {
        let start = history.len().saturating_sub(self.config.history_window);
        let window = &history[start..];
        if window.len() < MIN_FIT_LEN {
            tracing::debug!(
                "Skipping weight initialization: {} outcomes < {}",
                window.len(),
                MIN_FIT_LEN
            );
            return false;
        }

        let mut scores = vec![0usize; self.signals.len()];
        for i in FIT_START..window.len() {
            let prefix = &window[..i];
            let actual = window[i].outcome_class();
            for (score, signal) in scores.iter_mut().zip(&self.signals) {
                if signal.vote(prefix) == Some(actual) {
                    *score += 1;
                }
            }
        }

        // +1 smoothing keeps every signal above zero before the floor applies
        for (w, score) in self.weights.values_mut().zip(&scores) {
            *w = (*score + 1) as f64;
        }
        let total: usize = scores.iter().map(|s| s + 1).sum();
        self.weights.normalize_with_floor(self.config.min_weight);

        tracing::info!(
            "Initialized {} signal weights from {} outcomes (score total {})",
            self.weights.len(),
            window.len(),
            total
        );
        true
    }

    /// Learn from one observed outcome.
    ///
    /// `prefix` is the history before `actual` was appended. Abstains take the
    /// same penalty as wrong votes.
    pub fn update_on_outcome(&mut self, prefix: &[OutcomeRecord], actual: OutcomeClass) {
        let alpha = self.config.ema_alpha;
        let floor = self.config.min_weight;
        let mut hits = 0usize;

        for (w, signal) in self.weights.values_mut().zip(&self.signals) {
            let factor = if signal.vote(prefix) == Some(actual) {
                hits += 1;
                1.0 + self.config.reward_rate
            } else {
                1.0 - self.config.reward_rate
            };
            let old = *w;
            *w = (alpha * (old * factor) + (1.0 - alpha) * old).max(floor);
        }

        self.weights.normalize_with_floor(floor);
        tracing::debug!(
            "Updated weights on {}: {}/{} signals correct",
            actual,
            hits,
            self.signals.len()
        );
    }

    /// Every signal's vote on `history` with its current weight
    pub fn evaluate_all(&self, history: &[OutcomeRecord]) -> Vec<SignalVote> {
        self.signals
            .iter()
            .zip(self.weights.iter())
            .map(|(signal, (_, weight))| SignalVote {
                id: signal.id,
                vote: signal.vote(history),
                weight,
            })
            .collect()
    }

    /// Weighted vote for the next outcome.
    ///
    /// Equal vote weight goes to the class seen more often in `history`, and
    /// to `High` when those counts are equal too.
    pub fn predict(&self, history: &[OutcomeRecord]) -> CurrentPrediction {
        let mut votes = VoteTally::default();
        let mut voters = 0usize;
        for vote in self.evaluate_all(history) {
            if let Some(class) = vote.vote {
                votes.add(class, vote.weight);
                voters += 1;
            }
        }

        if voters == 0 {
            return CurrentPrediction {
                predicted_class: frequency_rebalance(history).unwrap_or(OutcomeClass::High),
                confidence: FALLBACK_CONFIDENCE,
                votes,
                fallback: true,
            };
        }

        let predicted_class = if votes.high > votes.low {
            OutcomeClass::High
        } else if votes.low > votes.high {
            OutcomeClass::Low
        } else {
            ClassCounts::from_classes(&classes(history))
                .majority()
                .unwrap_or(OutcomeClass::High)
        };

        let winning = match predicted_class {
            OutcomeClass::High => votes.high,
            OutcomeClass::Low => votes.low,
        };
        let total = votes.total();
        let ratio = if total > 0.0 { winning / total } else { MIN_CONFIDENCE };

        CurrentPrediction {
            predicted_class,
            confidence: ratio.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
            votes,
            fallback: false,
        }
    }
}

impl std::fmt::Debug for AdaptiveEnsemble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveEnsemble")
            .field("config", &self.config)
            .field("weights", &self.weights)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_normalized(w: &WeightVector, floor: f64) {
        assert!((w.sum() - 1.0).abs() < 1e-9, "sum = {}", w.sum());
        for (id, v) in w.iter() {
            assert!(v >= floor - 1e-15, "{} = {} below floor", id, v);
        }
    }

    #[test]
    fn test_uniform_weights() {
        let w = WeightVector::uniform(["a", "b", "c", "d"]);
        assert_eq!(w.get("a"), Some(0.25));
        assert_eq!(w.get("missing"), None);
        assert_normalized(&w, 0.0);
    }

    #[test]
    fn test_normalize_plain_division_when_floor_slack() {
        let mut w = WeightVector::uniform(["a", "b"]);
        for (i, v) in w.values_mut().enumerate() {
            *v = (i + 1) as f64;
        }
        w.normalize_with_floor(0.001);
        assert!((w.get("a").unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert!((w.get("b").unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_pins_small_weights() {
        let mut w = WeightVector::uniform(["a", "b", "c"]);
        let raw = [1.0, 1000.0, 1000.0];
        for (v, r) in w.values_mut().zip(raw) {
            *v = r;
        }
        w.normalize_with_floor(0.1);
        assert!((w.get("a").unwrap() - 0.1).abs() < 1e-12);
        assert!((w.get("b").unwrap() - 0.45).abs() < 1e-12);
        assert_normalized(&w, 0.1);
    }

    #[test]
    fn test_config_validation() {
        let config = EnsembleConfig::default();
        assert!(config.validate(27).is_ok());

        let bad_alpha = EnsembleConfig {
            ema_alpha: 0.0,
            ..Default::default()
        };
        assert!(bad_alpha.validate(27).is_err());

        let bad_floor = EnsembleConfig {
            min_weight: 0.5,
            ..Default::default()
        };
        assert!(bad_floor.validate(27).is_err());

        let bad_reward = EnsembleConfig {
            reward_rate: 1.0,
            ..Default::default()
        };
        assert!(bad_reward.validate(27).is_err());

        let bad_window = EnsembleConfig {
            history_window: 0,
            ..Default::default()
        };
        assert!(bad_window.validate(27).is_err());
    }

    #[test]
    fn test_update_rewards_hits_over_misses() {
        fn always_high(_: &[OutcomeRecord]) -> Option<OutcomeClass> {
            Some(OutcomeClass::High)
        }
        fn always_low(_: &[OutcomeRecord]) -> Option<OutcomeClass> {
            Some(OutcomeClass::Low)
        }
        fn never(_: &[OutcomeRecord]) -> Option<OutcomeClass> {
            None
        }

        let signals = vec![
            Signal::new("high", always_high),
            Signal::new("low", always_low),
            Signal::new("abstain", never),
        ];
        let mut ensemble = AdaptiveEnsemble::new(EnsembleConfig::default(), signals).unwrap();
        ensemble.update_on_outcome(&[], OutcomeClass::High);

        // old = 1/3; hit -> 1/3 * 1.01, miss -> 1/3 * 0.99
        let s = (1.01 + 0.99 + 0.99) / 3.0;
        let expected_hit = (1.01 / 3.0) / s;
        let w = ensemble.weights();
        assert!((w.get("high").unwrap() - expected_hit).abs() < 1e-12);
        assert_eq!(w.get("low"), w.get("abstain"));
        assert_normalized(w, 0.001);
    }

    #[test]
    fn test_predict_fallback_when_nobody_votes() {
        let ensemble = AdaptiveEnsemble::with_defaults();
        let prediction = ensemble.predict(&[]);
        assert!(prediction.fallback);
        assert_eq!(prediction.predicted_class, OutcomeClass::High);
        assert_eq!(prediction.confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_tie_prefers_more_frequent_class() {
        fn always_high(_: &[OutcomeRecord]) -> Option<OutcomeClass> {
            Some(OutcomeClass::High)
        }
        fn always_low(_: &[OutcomeRecord]) -> Option<OutcomeClass> {
            Some(OutcomeClass::Low)
        }
        let signals = vec![
            Signal::new("high", always_high),
            Signal::new("low", always_low),
        ];
        let ensemble = AdaptiveEnsemble::new(EnsembleConfig::default(), signals).unwrap();

        let lows = vec![
            OutcomeRecord::new(1, [1, 1, 1]).unwrap(),
            OutcomeRecord::new(2, [1, 2, 1]).unwrap(),
            OutcomeRecord::new(3, [6, 6, 6]).unwrap(),
        ];
        let prediction = ensemble.predict(&lows);
        assert_eq!(prediction.predicted_class, OutcomeClass::Low);
        assert_eq!(prediction.confidence, 0.51);

        assert_eq!(ensemble.predict(&[]).predicted_class, OutcomeClass::High);
    }
}
