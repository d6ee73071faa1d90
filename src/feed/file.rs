//! Line-delimited feed capture replay

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::{decode_message, FeedMessage, FeedSource};
use crate::error::Result;

/// Replays a captured feed, one JSON message per line
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn run(&self, tx: mpsc::Sender<FeedMessage>) -> Result<()> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            match decode_message(&line) {
                Ok(Some(message)) => {
                    if tx.send(message).await.is_err() {
                        tracing::warn!("Feed receiver closed at line {}", line_no);
                        return Ok(());
                    }
                }
                Ok(None) => tracing::debug!("Ignoring line {}", line_no),
                Err(e) => tracing::warn!("Skipping line {}: {}", line_no, e),
            }
        }
        Ok(())
    }
}
