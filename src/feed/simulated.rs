//! Seeded random dice feed

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use super::{FeedMessage, FeedSource};
use crate::error::Result;
use crate::types::{OutcomeClass, RawRecord};

/// Fair dice rolled from a fixed seed, so runs are reproducible
pub struct SimulatedSource {
    rounds: u64,
    seed: u64,
    first_session: u64,
}

impl SimulatedSource {
    pub fn new(rounds: u64, seed: u64) -> Self {
        Self {
            rounds,
            seed,
            first_session: 1,
        }
    }

    pub fn starting_at(mut self, session: u64) -> Self {
        self.first_session = session;
        self
    }
}

#[async_trait]
impl FeedSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn run(&self, tx: mpsc::Sender<FeedMessage>) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let last = self.first_session.saturating_add(self.rounds);
        for session in self.first_session..last {
            let dice = [
                rng.random_range(1..=6u8),
                rng.random_range(1..=6u8),
                rng.random_range(1..=6u8),
            ];
            let total: u8 = dice.iter().sum();
            let raw = RawRecord {
                session,
                dice: dice.to_vec(),
                total,
                result: Some(OutcomeClass::from_total(total).to_string()),
            };
            if tx.send(FeedMessage::Record(raw)).await.is_err() {
                tracing::warn!("Feed receiver closed at session {}", session);
                break;
            }
        }
        Ok(())
    }
}
