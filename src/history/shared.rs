//! Shared, lock-guarded access to the history manager

use parking_lot::RwLock;
use std::sync::Arc;

use super::{HistoryManager, PredictionReport, PushOutcome, StatsSnapshot};
use crate::error::Result;
use crate::ml::{CurrentPrediction, WeightVector};
use crate::types::{OutcomeRecord, RawRecord};

/// Cloneable handle: one writer at a time, concurrent readers.
///
/// Each mutation holds the write lock for its whole
/// score-learn-append-predict sequence, so readers never see a
/// half-applied arrival. Queries return owned copies.
#[derive(Clone)]
pub struct SharedHistory {
    inner: Arc<RwLock<HistoryManager>>,
}

impl SharedHistory {
    pub fn new(manager: HistoryManager) -> Self {
        Self {
            inner: Arc::new(RwLock::new(manager)),
        }
    }

    pub fn load_initial(&self, records: Vec<OutcomeRecord>) -> usize {
        self.inner.write().load_initial(records)
    }

    pub fn load_initial_raw(&self, raw: Vec<RawRecord>) -> Result<usize> {
        self.inner.write().load_initial_raw(raw)
    }

    pub fn push_record(&self, record: OutcomeRecord) -> Result<PushOutcome> {
        self.inner.write().push_record(record)
    }

    pub fn push_raw(&self, raw: RawRecord) -> Result<PushOutcome> {
        self.inner.write().push_raw(raw)
    }

    pub fn prediction(&self) -> Option<CurrentPrediction> {
        self.inner.read().prediction().cloned()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.read().stats()
    }

    pub fn history(&self, n: usize) -> Vec<OutcomeRecord> {
        self.inner.read().history(n)
    }

    pub fn weights(&self) -> WeightVector {
        self.inner.read().weights().clone()
    }

    pub fn report(&self) -> PredictionReport {
        self.inner.read().report()
    }

    /// Run `f` against one consistent view of the manager
    pub fn read<R>(&self, f: impl FnOnce(&HistoryManager) -> R) -> R {
        f(&self.inner.read())
    }
}

impl std::fmt::Debug for SharedHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedHistory")
            .field("len", &self.inner.read().len())
            .finish()
    }
}
