//! Sic Bo Outcome Predictor
//!
//! Predicts the High/Low class of the next three-dice session from the
//! history of settled sessions, using an adaptive ensemble of pattern signals.
//!
//! ## Architecture
//!
//! ```text
//! Feed (file / simulated) → mpsc → HistoryManager → AdaptiveEnsemble → Report
//!                                       ↑                  ↑
//!                              score / learn / append   27 signals + features
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod history;
pub mod ml;
pub mod types;
