//! Prediction engine
//!
//! Provides outcome-class prediction with:
//! - Feature extraction over the outcome history
//! - A closed library of independent pattern signals
//! - An adaptive ensemble that learns which signals are currently reliable

pub mod ensemble;
pub mod features;
pub mod signals;

#[cfg(test)]
mod tests;

pub use ensemble::{
    AdaptiveEnsemble, CurrentPrediction, EnsembleConfig, SignalVote, VoteTally, WeightVector,
    FALLBACK_CONFIDENCE,
};
pub use features::{ClassCounts, FeatureExtractor, OutcomeFeatures, Run};
pub use signals::{default_signals, Signal, SignalFn};
