//! Feed adapter
//!
//! Decodes game feed messages into raw records and drives the history
//! manager from a [`FeedSource`]. Sources run on their own task and hand
//! messages over a bounded channel to a single consumer, so every mutation
//! of the shared history happens in arrival order.

pub mod file;
pub mod simulated;


pub use file::FileSource;
pub use simulated::SimulatedSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::FeedConfig;
use crate::error::{PredictorError, Result};
use crate::history::SharedHistory;
use crate::types::{OutcomeRecord, RawRecord};

/// One decoded feed message
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// A single settled session
    Record(RawRecord),
    /// Full history snapshot; replaces the current history
    Snapshot(Vec<RawRecord>),
}

/// Entry of a history snapshot (`htr`) message
#[derive(Debug, Clone, Deserialize)]
struct SnapshotEntry {
    sid: u64,
    d1: u8,
    d2: u8,
    d3: u8,
}

impl From<SnapshotEntry> for RawRecord {
    fn from(entry: SnapshotEntry) -> Self {
        RawRecord {
            session: entry.sid,
            dice: vec![entry.d1, entry.d2, entry.d3],
            total: entry.d1.saturating_add(entry.d2).saturating_add(entry.d3),
            result: None,
        }
    }
}

/// Decode one JSON feed message.
///
/// Returns `Ok(None)` for blank lines and messages that carry no outcome
/// data (heartbeats, acks). Invalid JSON is a `Decode` error.
pub fn decode_message(text: &str) -> Result<Option<FeedMessage>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(text)?;

    // [cmd, {"htr": [...]}]
    if let Some(htr) = value
        .as_array()
        .and_then(|a| a.get(1))
        .and_then(|v| v.get("htr"))
    {
        let entries: Vec<SnapshotEntry> = serde_json::from_value(htr.clone())?;
        return Ok(Some(FeedMessage::Snapshot(
            entries.into_iter().map(RawRecord::from).collect(),
        )));
    }

    if value.get("session").is_some() && value.get("dice").is_some() {
        let raw: RawRecord = serde_json::from_value(value)?;
        return Ok(Some(FeedMessage::Record(raw)));
    }

    Ok(None)
}

/// Producer of feed messages
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Get source name
    fn name(&self) -> &str;

    /// Send messages until exhausted or the receiver is dropped
    async fn run(&self, tx: mpsc::Sender<FeedMessage>) -> Result<()>;
}

/// Counters for one feed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub messages: u64,
    pub snapshots: u64,
    /// Records loaded as the warmup batch
    pub warmup: u64,
    pub pushed: u64,
    pub scored: u64,
    /// Malformed records
    pub rejected: u64,
    /// Records at or before the latest known session
    pub stale: u64,
}

/// Run `source` to completion, applying its messages to `history`.
///
/// The first `config.warmup` records are buffered and loaded as the initial
/// batch; later records are pushed one by one. A snapshot replaces the
/// history and ends the warmup phase.
pub async fn run_feed<S>(
    source: S,
    history: SharedHistory,
    config: &FeedConfig,
) -> Result<ReplaySummary>
where
    S: FeedSource + 'static,
{
    let (tx, mut rx) = mpsc::channel(config.channel_capacity.max(1));
    let name = source.name().to_string();
    tracing::info!("Starting feed {}", name);
    let producer = tokio::spawn(async move { source.run(tx).await });

    let mut summary = ReplaySummary::default();
    let mut warming = config.warmup > 0;
    let mut buffer: Vec<OutcomeRecord> = Vec::with_capacity(config.warmup);

    while let Some(message) = rx.recv().await {
        summary.messages += 1;
        match message {
            FeedMessage::Snapshot(raw) => {
                let count = raw.len();
                match history.load_initial_raw(raw) {
                    Ok(_) => {
                        summary.snapshots += 1;
                        if warming {
                            tracing::debug!("Snapshot supersedes {} warmup records", buffer.len());
                            buffer.clear();
                            warming = false;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Rejected snapshot of {} records: {}", count, e);
                        summary.rejected += count as u64;
                    }
                }
            }
            FeedMessage::Record(raw) if warming => match OutcomeRecord::try_from(raw) {
                Ok(record) => {
                    buffer.push(record);
                    if buffer.len() >= config.warmup {
                        summary.warmup += history.load_initial(std::mem::take(&mut buffer)) as u64;
                        warming = false;
                    }
                }
                Err(e) => {
                    tracing::warn!("Rejected record: {}", e);
                    summary.rejected += 1;
                }
            },
            FeedMessage::Record(raw) => match history.push_raw(raw) {
                Ok(outcome) => {
                    summary.pushed += 1;
                    if outcome.scored.is_some() {
                        summary.scored += 1;
                    }
                }
                Err(PredictorError::OutOfOrder { session, latest }) => {
                    tracing::debug!("Skipping session {} (latest {})", session, latest);
                    summary.stale += 1;
                }
                Err(e) => {
                    tracing::warn!("Rejected record: {}", e);
                    summary.rejected += 1;
                }
            },
        }
    }

    // Feed ended before the warmup filled
    if warming && !buffer.is_empty() {
        summary.warmup += history.load_initial(buffer) as u64;
    }

    producer
        .await
        .map_err(|e| PredictorError::Feed(format!("{} task failed: {}", name, e)))??;

    tracing::info!(
        "Feed {} finished: {} messages, {} pushed, {} rejected",
        name,
        summary.messages,
        summary.pushed,
        summary.rejected
    );
    Ok(summary)
}
