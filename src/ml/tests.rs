//! Integration tests for the prediction engine

use super::*;
use crate::types::{OutcomeClass, OutcomeRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_history(len: usize, seed: u64) -> Vec<OutcomeRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|i| {
            let dice = [
                rng.random_range(1..=6u8),
                rng.random_range(1..=6u8),
                rng.random_range(1..=6u8),
            ];
            OutcomeRecord::new(i as u64 + 1, dice).unwrap()
        })
        .collect()
}

fn assert_weights_valid(ensemble: &AdaptiveEnsemble) {
    let weights = ensemble.weights();
    assert!((weights.sum() - 1.0).abs() < 1e-9, "sum = {}", weights.sum());
    let floor = ensemble.config().min_weight;
    for (id, w) in weights.iter() {
        assert!(w >= floor - 1e-15, "{} below floor: {}", id, w);
    }
}

fn assert_confidence_valid(prediction: &CurrentPrediction) {
    let c = prediction.confidence;
    if prediction.fallback {
        assert_eq!(c, FALLBACK_CONFIDENCE);
    } else {
        assert!((0.51..=0.99).contains(&c), "confidence {} out of range", c);
    }
}

#[test]
fn test_full_learning_loop() {
    let history = random_history(400, 42);
    let (warmup, live) = history.split_at(200);

    let mut ensemble = AdaptiveEnsemble::with_defaults();
    assert!(ensemble.initialize_weights(warmup));
    assert_weights_valid(&ensemble);

    let mut seen = warmup.to_vec();
    for record in live {
        let prediction = ensemble.predict(&seen);
        assert_confidence_valid(&prediction);

        ensemble.update_on_outcome(&seen, record.outcome_class());
        assert_weights_valid(&ensemble);
        seen.push(record.clone());
    }
}

#[test]
fn test_initialize_skips_short_window() {
    let mut ensemble = AdaptiveEnsemble::with_defaults();
    let before = ensemble.weights().clone();
    assert!(!ensemble.initialize_weights(&random_history(9, 1)));
    assert_eq!(ensemble.weights(), &before);
}

#[test]
fn test_initialize_uses_recent_window_only() {
    let config = EnsembleConfig {
        history_window: 20,
        ..Default::default()
    };
    let history = random_history(120, 3);

    let mut windowed = AdaptiveEnsemble::new(config, default_signals()).unwrap();
    windowed.initialize_weights(&history);

    let mut tail_only = AdaptiveEnsemble::with_defaults();
    tail_only.initialize_weights(&history[100..]);

    for ((id, a), (_, b)) in windowed.weights().iter().zip(tail_only.weights().iter()) {
        assert!((a - b).abs() < 1e-12, "{} differs: {} vs {}", id, a, b);
    }
}

#[test]
fn test_signal_with_more_hits_gets_more_weight() {
    fn always_high(_: &[OutcomeRecord]) -> Option<OutcomeClass> {
        Some(OutcomeClass::High)
    }
    fn always_low(_: &[OutcomeRecord]) -> Option<OutcomeClass> {
        Some(OutcomeClass::Low)
    }

    let highs: Vec<_> = (1..=20)
        .map(|i| OutcomeRecord::new(i, [6, 5, 4]).unwrap())
        .collect();
    let signals = vec![
        Signal::new("high", always_high),
        Signal::new("low", always_low),
    ];
    let mut ensemble = AdaptiveEnsemble::new(EnsembleConfig::default(), signals).unwrap();
    ensemble.initialize_weights(&highs);

    // 17 scored prefixes: (17 + 1) / (18 + 1) vs 1 / 19
    let w = ensemble.weights();
    assert!((w.get("high").unwrap() - 18.0 / 19.0).abs() < 1e-12);
    assert!((w.get("low").unwrap() - 1.0 / 19.0).abs() < 1e-12);

    let prediction = ensemble.predict(&highs);
    assert_eq!(prediction.predicted_class, OutcomeClass::High);
    assert!((prediction.confidence - 18.0 / 19.0).abs() < 1e-12);
}

#[test]
fn test_weights_survive_long_losing_streak() {
    fn always_low(_: &[OutcomeRecord]) -> Option<OutcomeClass> {
        Some(OutcomeClass::Low)
    }
    fn always_high(_: &[OutcomeRecord]) -> Option<OutcomeClass> {
        Some(OutcomeClass::High)
    }
    let config = EnsembleConfig {
        ema_alpha: 1.0,
        reward_rate: 0.5,
        min_weight: 0.01,
        ..Default::default()
    };
    let signals = vec![
        Signal::new("low", always_low),
        Signal::new("high", always_high),
    ];
    let mut ensemble = AdaptiveEnsemble::new(config, signals).unwrap();

    for _ in 0..200 {
        ensemble.update_on_outcome(&[], OutcomeClass::High);
        assert_weights_valid(&ensemble);
    }
    assert!((ensemble.weights().get("low").unwrap() - 0.01).abs() < 1e-12);
    assert!((ensemble.weights().get("high").unwrap() - 0.99).abs() < 1e-12);
}

#[test]
fn test_six_high_run_predicts_low() {
    // total 12: distinct dice, even total
    let history: Vec<_> = (1..=6)
        .map(|i| OutcomeRecord::new(i, [3, 4, 5]).unwrap())
        .collect();
    let ensemble = AdaptiveEnsemble::with_defaults();
    let prediction = ensemble.predict(&history);

    assert!(!prediction.fallback);
    assert_eq!(prediction.predicted_class, OutcomeClass::Low);
    assert!(prediction.confidence > 0.51);

    let votes = ensemble.evaluate_all(&history);
    let vote_of = |id: &str| votes.iter().find(|v| v.id == id).unwrap().vote;
    assert_eq!(vote_of("long_run_reversal"), Some(OutcomeClass::Low));
    assert_eq!(vote_of("streak_of_five"), Some(OutcomeClass::Low));
}

#[test]
fn test_confidence_range_on_many_histories() {
    let ensemble = AdaptiveEnsemble::with_defaults();
    for seed in 0..20 {
        let history = random_history(60, seed);
        for end in 0..history.len() {
            assert_confidence_valid(&ensemble.predict(&history[..end]));
        }
    }
}

#[test]
fn test_signal_ids_follow_library_order() {
    let ensemble = AdaptiveEnsemble::with_defaults();
    let ids = ensemble.signal_ids();
    assert_eq!(ids.len(), 27);
    assert_eq!(ids[0], "cycle_repeat");
    assert_eq!(ids[26], "statistical_persistence");

    let weighted: Vec<_> = ensemble.weights().iter().map(|(id, _)| id).collect();
    assert_eq!(ids, weighted);
    assert_eq!(ensemble.weight("total_parity"), Some(1.0 / 27.0));
    assert_eq!(ensemble.weight("unknown"), None);
}

#[test]
fn test_alternating_history_predicts_next_alternation() {
    // High = 12 and Low = 9, both distinct dice, so dice_composition ties
    let history: Vec<_> = (0..8u64)
        .map(|i| {
            let dice = if i % 2 == 0 { [6, 5, 1] } else { [2, 3, 4] };
            OutcomeRecord::new(i + 1, dice).unwrap()
        })
        .collect();
    let ensemble = AdaptiveEnsemble::with_defaults();

    let votes = ensemble.evaluate_all(&history);
    let vote_of = |id: &str| votes.iter().find(|v| v.id == id).unwrap().vote;
    for id in [
        "long_run_reversal",
        "run_momentum",
        "run_length_anomaly",
        "streak_of_five",
    ] {
        assert_eq!(vote_of(id), None, "{} should abstain", id);
    }
    for id in ["markov_order3", "ngram_4", "ngram_5"] {
        assert_eq!(vote_of(id), Some(OutcomeClass::High), "{} should follow", id);
    }

    // 4 High votes (markov, ngram_4, ngram_5, fibonacci) against 2 Low
    // (novel_sequence_follow, total_parity)
    let prediction = ensemble.predict(&history);
    assert!(!prediction.fallback);
    assert_eq!(prediction.predicted_class, OutcomeClass::High);
    assert!((prediction.confidence - 4.0 / 6.0).abs() < 1e-12);
}
