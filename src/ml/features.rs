//! Feature extraction over classified outcome windows
//!
//! Provides the statistics shared by the signal library:
//! - Class and total sequences
//! - Class frequency counts
//! - Run-length decomposition
//! - Mean / population standard deviation of totals
//! - Shannon entropy of the class sequence
//!
//! Everything here is a pure function of its input window.

use serde::Serialize;

use crate::types::{OutcomeClass, OutcomeRecord};

/// Maximal run of one class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Run {
    pub class: OutcomeClass,
    pub len: usize,
}

/// Per-class occurrence counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassCounts {
    pub high: usize,
    pub low: usize,
}

impl ClassCounts {
    pub fn from_classes(classes: &[OutcomeClass]) -> Self {
        classes.iter().fold(Self::default(), |mut acc, c| {
            match c {
                OutcomeClass::High => acc.high += 1,
                OutcomeClass::Low => acc.low += 1,
            }
            acc
        })
    }

    pub fn get(&self, class: OutcomeClass) -> usize {
        match class {
            OutcomeClass::High => self.high,
            OutcomeClass::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.low
    }

    /// Strict majority class, `None` on a tie
    pub fn majority(&self) -> Option<OutcomeClass> {
        if self.high > self.low {
            Some(OutcomeClass::High)
        } else if self.low > self.high {
            Some(OutcomeClass::Low)
        } else {
            None
        }
    }

    pub fn record(&mut self, class: OutcomeClass) {
        match class {
            OutcomeClass::High => self.high += 1,
            OutcomeClass::Low => self.low += 1,
        }
    }
}

/// Features extracted from a history window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeFeatures {
    pub classes: Vec<OutcomeClass>,
    pub totals: Vec<u8>,
    pub counts: ClassCounts,
    pub runs: Vec<Run>,
    pub max_run: usize,
    pub mean_total: f64,
    pub std_total: f64,
    pub entropy: f64,
}

/// Stateless feature extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn extract(history: &[OutcomeRecord]) -> OutcomeFeatures {
        let classes: Vec<OutcomeClass> = history.iter().map(|r| r.outcome_class()).collect();
        let totals: Vec<u8> = history.iter().map(|r| r.total()).collect();

        let runs = run_lengths(&classes);
        let max_run = runs.iter().map(|r| r.len).max().unwrap_or(0);

        let as_f64: Vec<f64> = totals.iter().map(|&t| f64::from(t)).collect();
        let mean_total = mean(&as_f64);
        let std_total = population_std(&as_f64, mean_total);

        OutcomeFeatures {
            counts: ClassCounts::from_classes(&classes),
            entropy: entropy(&classes),
            classes,
            totals,
            runs,
            max_run,
            mean_total,
            std_total,
        }
    }
}

/// Decompose a class sequence into maximal runs, in arrival order
pub fn run_lengths(classes: &[OutcomeClass]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for &class in classes {
        match runs.last_mut() {
            Some(run) if run.class == class => run.len += 1,
            _ => runs.push(Run { class, len: 1 }),
        }
    }
    runs
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Shannon entropy (base 2) of a class sequence
pub fn entropy(classes: &[OutcomeClass]) -> f64 {
    if classes.is_empty() {
        return 0.0;
    }
    let counts = ClassCounts::from_classes(classes);
    let n = classes.len() as f64;
    [counts.high, counts.low]
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Fraction of matching positions; 0 when lengths differ or both are empty
pub fn similarity(a: &[OutcomeClass], b: &[OutcomeClass]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let matches = a.iter().zip(b).filter(|(x, y)| x == y).count();
    matches as f64 / a.len() as f64
}
