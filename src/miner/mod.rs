pub mod offsets;
pub mod session;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{Duration, Utc};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::blockchain::{
    Block, Chain, DEFAULT_DIFFICULTY, GENESIS_DATA, GENESIS_PRECEDING_HASH, next_difficulty,
};
use crate::client::{VerificationService, Verdict};
use crate::error::{MinerError, Result};

pub use offsets::OffsetSampler;
pub use session::{MiningEvent, SessionResult};

/// Drives mining sessions against a verification service.
///
/// Owns the speculative chain and the local difficulty. Blocks are appended
/// before they are submitted and rolled back when the service says no, so the
/// chain tail is always the last accepted block between attempts.
pub struct Miner<S> {
    service: S,
    chain: Chain,
    difficulty: u32,
    cancel: Arc<AtomicBool>,
    subscribers: Vec<UnboundedSender<MiningEvent>>,
    rng: StdRng,
}

impl<S: VerificationService> Miner<S> {
    pub fn new(service: S) -> Self {
        Self::with_rng(service, StdRng::from_entropy())
    }

    /// Same as `new` with a caller-chosen RNG for offset draws.
    pub fn with_rng(service: S, rng: StdRng) -> Self {
        Self {
            service,
            chain: Chain::new(),
            difficulty: DEFAULT_DIFFICULTY,
            cancel: Arc::new(AtomicBool::new(false)),
            subscribers: Vec::new(),
            rng,
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Flag that aborts the running (or next) session when set to `true`.
    /// It is lowered again once that session returns.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Receive `block:found` and `mining:sequence` events.
    pub fn subscribe(&mut self) -> UnboundedReceiver<MiningEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Rebuild genesis from server metadata and check it against the
    /// server's hash. Mining is refused until this succeeds.
    pub async fn init(&mut self) -> Result<()> {
        let info = self.service.info().await?;
        let first = &info.first_block;

        let mut chain = Chain::new();
        chain.seed_genesis(
            first.index,
            first.timestamp,
            GENESIS_DATA,
            GENESIS_PRECEDING_HASH,
            &first.hash,
        )?;

        self.chain = chain;
        self.difficulty = info.difficulty;
        info!(
            "MINER - genesis #{} verified (hash={}, difficulty={})",
            first.index, first.hash, info.difficulty
        );
        Ok(())
    }

    /// Mine until `count` blocks have been accepted.
    pub async fn mine(&mut self, count: u32) -> Result<SessionResult> {
        let outcome = self.run_session(count).await;
        self.cancel.store(false, Ordering::Relaxed);
        outcome
    }

    async fn run_session(&mut self, count: u32) -> Result<SessionResult> {
        if self.chain.is_empty() {
            return Err(MinerError::NotInitialized);
        }

        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        // The server is authoritative; local drift only lasts until the next session.
        let info = self.service.info().await?;
        self.difficulty = info.difficulty;
        let starting_difficulty = self.difficulty;
        info!(
            "MINER - session {} started: {} block(s), difficulty={}",
            session_id, count, starting_difficulty
        );

        let mut found_blocks = Vec::new();
        let mut failed = 0u32;
        for iteration in 1..=count {
            let (block, rejected) = self.mine_one(session_id).await?;
            failed += rejected;
            info!(
                "MINER - [{}/{}] block #{} accepted after {} rejection(s) (hash={}, nonce={})",
                iteration,
                count,
                block.index,
                rejected,
                block.hash(),
                block.nonce()
            );
            self.emit(MiningEvent::BlockFound(block.clone()));
            found_blocks.push(block);
        }

        let result = SessionResult {
            session_id,
            found: found_blocks.len() as u32,
            failed,
            total: count,
            starting_difficulty,
            started_at,
            ended_at: Utc::now(),
            elapsed: clock.elapsed(),
            found_blocks,
        };
        info!(
            "MINER - session {} done: {}/{} found, {} rejected in {:?}",
            session_id, result.found, result.total, result.failed, result.elapsed
        );
        self.emit(MiningEvent::Sequence(result.clone()));
        Ok(result)
    }

    /// One iteration: draw offsets until a candidate is accepted.
    /// Returns the accepted block and the number of rejections.
    async fn mine_one(&mut self, session_id: Uuid) -> Result<(Block, u32)> {
        // Fresh metadata so we don't aim at already-claimed timestamps.
        let info = self.service.info().await?;
        let base = info.claim_base();
        let mut offsets = OffsetSampler::for_iteration(self.difficulty, info.total_blocks);
        let mut rejected = 0u32;

        loop {
            self.check_cancelled()?;

            let Some(offset) = offsets.draw(&mut self.rng) else {
                let (low, high) = offsets.bounds();
                return Err(MinerError::OffsetsExhausted {
                    low,
                    high,
                    tried: offsets.tried(),
                });
            };

            // Whole seconds: the hashed timestamp has no finer resolution.
            let timestamp = Duration::try_seconds(offset)
                .and_then(|delta| base.checked_add_signed(delta))
                .ok_or_else(|| {
                    MinerError::InvariantViolation(format!("offset {offset}s overflows {base}"))
                })?;
            let tail = self.chain.latest()?;
            let candidate = Block::new(
                tail.index + 1,
                timestamp,
                self.difficulty.to_string(),
                tail.hash(),
            );
            let candidate = self.search(candidate).await?;

            let previous_difficulty = self.difficulty;
            self.append(candidate.clone())?;

            match self.service.submit(candidate.hash()).await {
                Ok(Verdict::Accepted { .. }) => return Ok((candidate, rejected)),
                Ok(Verdict::Rejected { reason }) => {
                    debug!(
                        "MINER - session {} offset {} rejected: {}",
                        session_id, offset, reason
                    );
                    self.discard(&candidate, previous_difficulty)?;
                    rejected += 1;
                }
                Err(e) => {
                    warn!("MINER - submit of #{} failed: {}", candidate.index, e);
                    self.discard(&candidate, previous_difficulty)?;
                    return Err(e);
                }
            }
        }
    }

    /// Run proof-of-work off the async executor and wait for it.
    async fn search(&self, mut candidate: Block) -> Result<Block> {
        let difficulty = self.difficulty;
        let cancel = Arc::clone(&self.cancel);
        let started = Instant::now();
        let (candidate, attempts) = tokio::task::spawn_blocking(move || {
            let attempts = candidate.proof_of_work(difficulty, &cancel)?;
            Ok::<_, MinerError>((candidate, attempts))
        })
        .await??;

        debug!(
            "MINER - sealed #{} at difficulty {} in {} hashes ({:?})",
            candidate.index,
            difficulty,
            attempts,
            started.elapsed()
        );
        Ok(candidate)
    }

    /// Append and let the difficulty drift with the block gap.
    fn append(&mut self, block: Block) -> Result<()> {
        let preceding = self.chain.latest()?.clone();
        let appended = self.chain.append(block)?;
        self.difficulty = next_difficulty(self.difficulty, &preceding, appended);
        Ok(())
    }

    /// Drop a speculative tail block and undo its difficulty drift.
    fn discard(&mut self, block: &Block, previous_difficulty: u32) -> Result<()> {
        self.chain.rollback_last(block)?;
        self.difficulty = previous_difficulty;
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(MinerError::Cancelled);
        }
        Ok(())
    }

    fn emit(&mut self, event: MiningEvent) {
        debug!("MINER - emit {}", event.name());
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
