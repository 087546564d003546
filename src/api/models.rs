use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SubsecRound, Utc};

use crate::blockchain::block::has_leading_zeros;
use crate::blockchain::{Block, GENESIS_DATA, GENESIS_PRECEDING_HASH};
use crate::client::models::FirstBlock;
use crate::client::ChainInfo;
use crate::config::Credentials;

/// Knobs of the local verification service.
#[derive(Debug, Clone)]
pub struct MockSettings {
    pub credentials: Credentials,
    /// Difficulty reported by `info`.
    pub difficulty: u32,
    /// Leading zeros a submitted hash must carry to be accepted.
    pub min_leading_zeros: u32,
    /// Blocks that can be claimed before the service runs dry.
    pub capacity: u64,
    pub genesis_timestamp: DateTime<Utc>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            credentials: Credentials {
                id: "local".to_string(),
                key: "local".to_string(),
            },
            difficulty: 2,
            min_leading_zeros: 0,
            capacity: 100,
            genesis_timestamp: Utc::now().trunc_subsecs(0),
        }
    }
}

/// Why a claim was turned down.
#[derive(Debug, PartialEq, Eq)]
pub enum ClaimError {
    Unauthorized,
    MalformedHash,
    TooEasy,
    Exhausted,
    AlreadyClaimed,
}

impl ClaimError {
    pub fn detail(&self) -> &'static str {
        match self {
            ClaimError::Unauthorized => "Invalid credentials",
            ClaimError::MalformedHash => "Hash must be a hex string",
            ClaimError::TooEasy => "Hash does not meet difficulty",
            ClaimError::Exhausted => "No free blocks left",
            ClaimError::AlreadyClaimed => "Block already claimed",
        }
    }
}

/// Claimed-block bookkeeping behind the mock endpoints.
#[derive(Debug)]
pub struct MockLedger {
    settings: MockSettings,
    genesis: Block,
    claimed: HashSet<String>,
    last_claimed: Option<DateTime<Utc>>,
}

impl MockLedger {
    pub fn new(settings: MockSettings) -> Self {
        let genesis = Block::new(
            0,
            settings.genesis_timestamp,
            GENESIS_DATA,
            GENESIS_PRECEDING_HASH,
        );
        Self {
            settings,
            genesis,
            claimed: HashSet::new(),
            last_claimed: None,
        }
    }

    pub fn info(&self) -> ChainInfo {
        let owned = self.claimed.len() as u64;
        ChainInfo {
            free_blocks: self.settings.capacity.saturating_sub(owned),
            total_blocks: owned + 1,
            owned_blocks: owned,
            difficulty: self.settings.difficulty,
            last_claimed_timestamp: self.last_claimed,
            first_block: FirstBlock {
                index: self.genesis.index,
                hash: self.genesis.hash().to_string(),
                timestamp: self.genesis.timestamp,
            },
        }
    }

    /// Record a claim of `hash`; returns the claim's block number.
    pub fn claim(&mut self, id: &str, key: &str, hash: &str) -> Result<u64, ClaimError> {
        let creds = &self.settings.credentials;
        if creds.id != id || creds.key != key {
            return Err(ClaimError::Unauthorized);
        }
        if hash.is_empty() || hex::decode(hash).is_err() {
            return Err(ClaimError::MalformedHash);
        }
        if !has_leading_zeros(hash, self.settings.min_leading_zeros) {
            return Err(ClaimError::TooEasy);
        }
        if self.claimed.len() as u64 >= self.settings.capacity {
            return Err(ClaimError::Exhausted);
        }
        if !self.claimed.insert(hash.to_string()) {
            return Err(ClaimError::AlreadyClaimed);
        }
        self.last_claimed = Some(Utc::now());
        Ok(self.claimed.len() as u64)
    }
}

/// Shared application state of the mock verification service.
pub struct AppState {
    pub ledger: Mutex<MockLedger>,
}

impl AppState {
    pub fn new(settings: MockSettings) -> Self {
        Self {
            ledger: Mutex::new(MockLedger::new(settings)),
        }
    }

    pub fn ledger(&self) -> MutexGuard<'_, MockLedger> {
        // A panicked handler cannot leave the ledger half-updated.
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(MockSettings::default())
    }
}
