//! Signal library
//!
//! Each signal is a pure function from the history so far to a vote for the
//! next outcome class. `None` means the signal abstains: its length or pattern
//! precondition is not met. Signals never guess on insufficient data.
//!
//! The set is closed and ordered. Thresholds are fixed because the ensemble's
//! learned weights are tuned against them.

use crate::ml::features::{entropy, mean, run_lengths, similarity, ClassCounts, FeatureExtractor};
use crate::types::{classes, OutcomeClass, OutcomeRecord};
use std::collections::HashMap;

/// Signal evaluation function. `None` is an abstain.
pub type SignalFn = fn(&[OutcomeRecord]) -> Option<OutcomeClass>;

/// A named, stateless predictor
#[derive(Clone, Copy)]
pub struct Signal {
    pub id: &'static str,
    pub evaluate: SignalFn,
}

impl Signal {
    pub const fn new(id: &'static str, evaluate: SignalFn) -> Self {
        Self { id, evaluate }
    }

    pub fn vote(&self, history: &[OutcomeRecord]) -> Option<OutcomeClass> {
        (self.evaluate)(history)
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("id", &self.id).finish()
    }
}

/// The full signal set, in registry order
pub fn default_signals() -> Vec<Signal> {
    vec![
        Signal::new("cycle_repeat", cycle_repeat),
        Signal::new("alternation_break", alternation_break),
        Signal::new("triple_repeat", triple_repeat),
        Signal::new("double_pair", double_pair),
        Signal::new(FREQUENCY_REBALANCE, frequency_rebalance),
        Signal::new("long_run_reversal", long_run_reversal),
        Signal::new("three_pattern_reversal", three_pattern_reversal),
        Signal::new("two_one_switch", two_one_switch),
        Signal::new("novel_sequence_follow", novel_sequence_follow),
        Signal::new("markov_order3", markov_order3),
        Signal::new("ngram_4", ngram_4),
        Signal::new("entropy_shift", entropy_shift),
        Signal::new("dice_composition", dice_composition),
        Signal::new("run_momentum", run_momentum),
        Signal::new("window_similarity", window_similarity),
        Signal::new("fibonacci_self_similarity", fibonacci_self_similarity),
        Signal::new("total_parity", total_parity),
        Signal::new("run_length_anomaly", run_length_anomaly),
        Signal::new("global_skew", global_skew),
        Signal::new("ngram_5", ngram_5),
        Signal::new("dynamic_pattern_match", dynamic_pattern_match),
        Signal::new("recent_bias", recent_bias),
        Signal::new("streak_of_five", streak_of_five),
        Signal::new("adaptive_ngram", adaptive_ngram),
        Signal::new("mean_reversion", mean_reversion),
        Signal::new("symmetry_reversal", symmetry_reversal),
        Signal::new("statistical_persistence", statistical_persistence),
    ]
}

/// Id of the signal the ensemble falls back to when nobody votes
pub const FREQUENCY_REBALANCE: &str = "frequency_rebalance";

/// Last `n` classes, or `None` when the history is shorter
fn tail(history: &[OutcomeRecord], n: usize) -> Option<Vec<OutcomeClass>> {
    if history.len() < n {
        return None;
    }
    Some(classes(&history[history.len() - n..]))
}

fn latest(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    history.last().map(|r| r.outcome_class())
}

/// Successor counts of every earlier occurrence of the last `k` classes.
///
/// Windows start at `0..len - k`, so the final window (which has no
/// successor) is never counted.
fn follower_counts(tx: &[OutcomeClass], k: usize) -> ClassCounts {
    let mut counts = ClassCounts::default();
    if k == 0 || tx.len() < k + 1 {
        return counts;
    }
    let gram = &tx[tx.len() - k..];
    for i in 0..tx.len() - k {
        if &tx[i..i + k] == gram {
            counts.record(tx[i + k]);
        }
    }
    counts
}

// ==================== Fixed-pattern signals ====================

/// Last 3-block repeats the 3-block before it
pub fn cycle_repeat(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let tx = tail(history, 6)?;
    if tx[..3] == tx[3..] {
        return Some(tx[5].opposite());
    }
    None
}

/// A,B,B,C with A≠B and B≠C
pub fn alternation_break(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let tx = tail(history, 4)?;
    if tx[0] != tx[1] && tx[1] == tx[2] && tx[2] != tx[3] {
        return Some(tx[3].opposite());
    }
    None
}

pub fn triple_repeat(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let tx = tail(history, 3)?;
    if tx[0] == tx[1] && tx[1] == tx[2] {
        return Some(tx[0].opposite());
    }
    None
}

/// A,A,B,B with A≠B
pub fn double_pair(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let tx = tail(history, 4)?;
    if tx[0] == tx[1] && tx[2] == tx[3] && tx[0] != tx[2] {
        return Some(tx[3].opposite());
    }
    None
}

/// Predict the under-represented class once the imbalance exceeds one
pub fn frequency_rebalance(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let counts = ClassCounts::from_classes(&classes(history));
    if counts.high > counts.low + 1 {
        Some(OutcomeClass::Low)
    } else if counts.low > counts.high + 1 {
        Some(OutcomeClass::High)
    } else {
        None
    }
}

pub fn long_run_reversal(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let runs = run_lengths(&classes(history));
    let run = runs.last()?;
    if run.len >= 4 {
        return Some(run.class.opposite());
    }
    None
}

/// A,B,B with A≠B
pub fn three_pattern_reversal(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let tx = tail(history, 3)?;
    if tx[0] != tx[1] && tx[1] == tx[2] {
        return Some(tx[2].opposite());
    }
    None
}

/// A,A,B with A≠B
pub fn two_one_switch(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let tx = tail(history, 3)?;
    if tx[0] == tx[1] && tx[1] != tx[2] {
        return Some(tx[2].opposite());
    }
    None
}

/// Follow the latest class when the last 8-block has never been seen before
pub fn novel_sequence_follow(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    const BLOCK: usize = 8;
    let tx = classes(history);
    if tx.len() < BLOCK {
        return None;
    }
    let split = tx.len() - BLOCK;
    let (earlier, block) = tx.split_at(split);
    if earlier.windows(BLOCK).any(|w| w == block) {
        return None;
    }
    Some(tx[tx.len() - 1])
}

pub fn streak_of_five(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let tx = tail(history, 5)?;
    if tx.iter().all(|&c| c == tx[0]) {
        return Some(tx[0].opposite());
    }
    None
}

/// A,B,B,B,A or A,A,B,B,B (A≠B)
pub fn symmetry_reversal(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    if history.len() < 7 {
        return None;
    }
    let p = tail(history, 5)?;
    let mirrored = p[0] == p[4] && p[1] == p[2] && p[2] == p[3] && p[0] != p[1];
    let nested = p[0] == p[1] && p[2] == p[3] && p[3] == p[4] && p[0] != p[2];
    if mirrored || nested {
        return Some(p[4].opposite());
    }
    None
}

// ==================== Sequence-model signals ====================

/// Order-3 Markov transition majority
pub fn markov_order3(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    const ORDER: usize = 3;
    let tx = classes(history);
    if tx.len() < ORDER + 1 {
        return None;
    }

    let mut transitions: HashMap<&[OutcomeClass], ClassCounts> = HashMap::new();
    for i in 0..tx.len() - ORDER {
        transitions
            .entry(&tx[i..i + ORDER])
            .or_default()
            .record(tx[i + ORDER]);
    }

    transitions.get(&tx[tx.len() - ORDER..])?.majority()
}

fn ngram(history: &[OutcomeRecord], k: usize) -> Option<OutcomeClass> {
    let tx = classes(history);
    if tx.len() < k + 1 {
        return None;
    }
    follower_counts(&tx, k).majority()
}

pub fn ngram_4(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    ngram(history, 4)
}

pub fn ngram_5(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    ngram(history, 5)
}

/// Majority follower of the exact last-5 pattern, once there are 10 outcomes
pub fn dynamic_pattern_match(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    if history.len() < 10 {
        return None;
    }
    follower_counts(&classes(history), 5).majority()
}

/// N-gram majority over k = 3..=6, keeping the k with the strongest winner
pub fn adaptive_ngram(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let tx = classes(history);
    if tx.len() < 10 {
        return None;
    }

    let mut best: Option<(usize, OutcomeClass)> = None;
    for k in 3..=6 {
        let counts = follower_counts(&tx, k);
        let Some(winner) = counts.majority() else {
            continue;
        };
        let count = counts.get(winner);
        if best.map_or(true, |(max, _)| count > max) {
            best = Some((count, winner));
        }
    }
    best.map(|(_, class)| class)
}

/// Vote of the classes following earlier 6-windows that look like the last one
pub fn window_similarity(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    const WIN: usize = 6;
    let tx = classes(history);
    if tx.len() < WIN * 2 + 1 {
        return None;
    }

    let target = &tx[tx.len() - WIN..];
    let mut counts = ClassCounts::default();
    for i in 0..=tx.len() - 2 * WIN - 1 {
        if similarity(&tx[i..i + WIN], target) > 0.7 {
            counts.record(tx[i + WIN]);
        }
    }
    counts.majority()
}

/// First Fibonacci block size whose tail block repeats the block before it
pub fn fibonacci_self_similarity(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let tx = classes(history);
    let len = tx.len();
    for n in [1usize, 2, 3, 5, 8] {
        if len < n * 2 + 1 {
            continue;
        }
        if tx[len - n..] == tx[len - 2 * n..len - n] {
            return Some(tx[len - n]);
        }
    }
    None
}

// ==================== Statistical signals ====================

/// Entropy of the last 10 classes against the rest
pub fn entropy_shift(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let tx = classes(history);
    if tx.len() < 20 {
        return None;
    }
    let (older, recent) = tx.split_at(tx.len() - 10);
    let e_recent = entropy(recent);
    let e_older = entropy(older);
    let last = tx[tx.len() - 1];

    if e_recent < 0.7 && e_older - e_recent > 0.1 {
        return Some(last);
    }
    // Binary entropy never exceeds 1.0; the rise branch is kept for parity
    // with the tuned weights.
    if e_recent > 1.2 && e_recent - e_older > 0.1 {
        return Some(last.opposite());
    }
    None
}

/// Majority class among outcomes with the same dice composition as the latest
pub fn dice_composition(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let kind = history.last()?.dice_kind();
    let counts = history
        .iter()
        .filter(|r| r.dice_kind() == kind)
        .fold(ClassCounts::default(), |mut acc, r| {
            acc.record(r.outcome_class());
            acc
        });
    counts.majority()
}

/// Lengthening runs continue, shortening runs reverse
pub fn run_momentum(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let runs = run_lengths(&classes(history));
    if runs.len() < 3 {
        return None;
    }
    let l = &runs[runs.len() - 3..];
    let (l0, l1, l2) = (l[0].len, l[1].len, l[2].len);
    let last = l[2].class;

    if l2 > l1 && l1 > l0 && l2 >= 3 {
        return Some(last);
    }
    if l2 < l1 && l1 < l0 && l0 >= 3 {
        return Some(last.opposite());
    }
    None
}

/// Parity of the latest total crossed with its side of the threshold
pub fn total_parity(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let total = history.last()?.total();
    let high = total >= crate::types::HIGH_THRESHOLD;
    let class = match (total % 2 == 0, high) {
        (true, true) => OutcomeClass::Low,
        (true, false) => OutcomeClass::High,
        (false, true) => OutcomeClass::High,
        (false, false) => OutcomeClass::Low,
    };
    Some(class)
}

/// Current run is unusually long compared with all earlier runs
pub fn run_length_anomaly(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let runs = run_lengths(&classes(history));
    if runs.len() < 8 {
        return None;
    }
    let (prior, last) = runs.split_at(runs.len() - 1);
    let last = last[0];
    let prior_lens: Vec<f64> = prior.iter().map(|r| r.len as f64).collect();
    let avg = mean(&prior_lens);

    if last.len as f64 > avg * 1.5 && last.len >= 3 {
        return Some(last.class.opposite());
    }
    None
}

/// Long-horizon skew beyond 60% predicts the minority class
pub fn global_skew(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    if history.len() < 50 {
        return None;
    }
    let counts = ClassCounts::from_classes(&classes(history));
    let n = history.len() as f64;
    if counts.high as f64 / n > 0.60 {
        return Some(OutcomeClass::Low);
    }
    if counts.low as f64 / n > 0.60 {
        return Some(OutcomeClass::High);
    }
    None
}

/// Short-horizon imbalance over the last 8 outcomes
pub fn recent_bias(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    let start = history.len().saturating_sub(8);
    let counts = ClassCounts::from_classes(&classes(&history[start..]));
    if counts.high > counts.low + 3 {
        Some(OutcomeClass::Low)
    } else if counts.low > counts.high + 3 {
        Some(OutcomeClass::High)
    } else {
        None
    }
}

/// Extreme latest total relative to the window's distribution
pub fn mean_reversion(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    if history.len() < 10 {
        return None;
    }
    let features = FeatureExtractor::extract(history);
    if features.std_total == 0.0 {
        return None;
    }
    let total = f64::from(history.last()?.total());
    let (mean, std) = (features.mean_total, features.std_total);

    if total > mean + 1.5 * std && total >= 13.0 {
        return Some(OutcomeClass::Low);
    }
    if total < mean - 1.5 * std && total <= 8.0 {
        return Some(OutcomeClass::High);
    }
    None
}

/// Latest class under-represented overall: expect it to persist
pub fn statistical_persistence(history: &[OutcomeRecord]) -> Option<OutcomeClass> {
    if history.len() < 30 {
        return None;
    }
    let last = latest(history)?;
    let counts = ClassCounts::from_classes(&classes(history));
    let share = counts.get(last) as f64 / history.len() as f64;
    if share < 0.45 {
        return Some(last);
    }
    None
}
