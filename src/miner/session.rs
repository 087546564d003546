use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::blockchain::Block;

/// Summary of one `mine(count)` run.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub session_id: Uuid,
    /// Blocks accepted by the verification service.
    pub found: u32,
    /// Candidates rejected along the way.
    pub failed: u32,
    /// Blocks requested.
    pub total: u32,
    pub starting_difficulty: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub found_blocks: Vec<Block>,
}

/// Notifications published by the miner, in emission order.
#[derive(Debug, Clone)]
pub enum MiningEvent {
    BlockFound(Block),
    Sequence(SessionResult),
}

impl MiningEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MiningEvent::BlockFound(_) => "block:found",
            MiningEvent::Sequence(_) => "mining:sequence",
        }
    }
}
