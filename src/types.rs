//! Core outcome types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PredictorError, Result};

/// Totals at or above this value are `High`
pub const HIGH_THRESHOLD: u8 = 11;

/// Binary outcome class derived from the dice total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeClass {
    High,
    Low,
}

impl OutcomeClass {
    pub fn from_total(total: u8) -> Self {
        if total >= HIGH_THRESHOLD {
            OutcomeClass::High
        } else {
            OutcomeClass::Low
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            OutcomeClass::High => OutcomeClass::Low,
            OutcomeClass::Low => OutcomeClass::High,
        }
    }

    /// Single-letter symbol used in pattern strings
    pub fn symbol(self) -> char {
        match self {
            OutcomeClass::High => 'H',
            OutcomeClass::Low => 'L',
        }
    }

    /// Parse a feed result label.
    ///
    /// Accepts English labels as well as the Tài/Xỉu labels used by the
    /// game feeds, with or without diacritics.
    pub fn from_label(label: &str) -> Result<Self> {
        match label.trim().to_lowercase().as_str() {
            "high" | "h" | "t" | "tài" | "tai" => Ok(OutcomeClass::High),
            "low" | "l" | "x" | "xỉu" | "xiu" => Ok(OutcomeClass::Low),
            _ => Err(PredictorError::UnknownLabel(label.to_string())),
        }
    }
}

impl fmt::Display for OutcomeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeClass::High => write!(f, "High"),
            OutcomeClass::Low => write!(f, "Low"),
        }
    }
}

/// Dice composition bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiceKind {
    /// All three dice equal
    Triple,
    /// Exactly two dice equal
    Pair,
    /// All dice different
    Distinct,
}

impl DiceKind {
    pub fn of(dice: &[u8; 3]) -> Self {
        let [a, b, c] = *dice;
        if a == b && b == c {
            DiceKind::Triple
        } else if a == b || b == c || a == c {
            DiceKind::Pair
        } else {
            DiceKind::Distinct
        }
    }
}

/// Outcome record as delivered by a feed, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub session: u64,
    pub dice: Vec<u8>,
    pub total: u8,
    /// Result label; derived from the total when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// A validated game outcome.
///
/// Only constructible through validation, so `total` always equals the dice
/// sum and `outcome_class` always agrees with `total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", into = "RawRecord")]
pub struct OutcomeRecord {
    session_id: u64,
    dice: [u8; 3],
    total: u8,
    outcome_class: OutcomeClass,
}

impl OutcomeRecord {
    /// Build a record from dice values, deriving total and class
    pub fn new(session_id: u64, dice: [u8; 3]) -> Result<Self> {
        for &value in &dice {
            if !(1..=6).contains(&value) {
                return Err(PredictorError::DieOutOfRange {
                    session: session_id,
                    value,
                });
            }
        }
        let total = dice.iter().sum();
        Ok(Self {
            session_id,
            dice,
            total,
            outcome_class: OutcomeClass::from_total(total),
        })
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn dice(&self) -> [u8; 3] {
        self.dice
    }

    pub fn total(&self) -> u8 {
        self.total
    }

    pub fn outcome_class(&self) -> OutcomeClass {
        self.outcome_class
    }

    pub fn dice_kind(&self) -> DiceKind {
        DiceKind::of(&self.dice)
    }
}

impl TryFrom<RawRecord> for OutcomeRecord {
    type Error = PredictorError;

    fn try_from(raw: RawRecord) -> Result<Self> {
        let dice: [u8; 3] = raw.dice.as_slice().try_into().map_err(|_| {
            PredictorError::InvalidDiceCount {
                session: raw.session,
                count: raw.dice.len(),
            }
        })?;

        let record = OutcomeRecord::new(raw.session, dice)?;
        if record.total != raw.total {
            return Err(PredictorError::TotalMismatch {
                session: raw.session,
                total: raw.total,
                sum: record.total,
            });
        }

        if let Some(label) = raw.result {
            if OutcomeClass::from_label(&label)? != record.outcome_class {
                return Err(PredictorError::LabelMismatch {
                    session: raw.session,
                    label,
                    total: raw.total,
                });
            }
        }

        Ok(record)
    }
}

impl From<OutcomeRecord> for RawRecord {
    fn from(record: OutcomeRecord) -> Self {
        RawRecord {
            session: record.session_id,
            dice: record.dice.to_vec(),
            total: record.total,
            result: Some(record.outcome_class.to_string()),
        }
    }
}

/// Class sequence of a history slice
pub fn classes(history: &[OutcomeRecord]) -> Vec<OutcomeClass> {
    history.iter().map(|r| r.outcome_class).collect()
}

/// Render classes as a compact `H`/`L` string
pub fn pattern_string(classes: &[OutcomeClass]) -> String {
    classes.iter().map(|c| c.symbol()).collect()
}
