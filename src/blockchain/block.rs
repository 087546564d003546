use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::HASH_HEX_LEN;
use crate::error::{MinerError, Result};

/// A single block of the local speculative chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    /// Payload; for mined blocks this is the difficulty in force at creation.
    pub data: String,
    pub preceding_hash: String,
    nonce: u64,   // Proof-of-Work nonce
    hash: String, // Cached hash of the block
}

impl Block {
    /// Create a new block (not mined yet). Call `proof_of_work()` to search a nonce.
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        data: impl Into<String>,
        preceding_hash: impl Into<String>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            data: data.into(),
            preceding_hash: preceding_hash.into(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Compute the SHA-256 hash of this block using its fields
    /// (excluding the `hash` field itself). The payload is JSON encoded
    /// so it stays delimited from its neighbours in the preimage.
    pub fn compute_hash(&self) -> String {
        // Serializing a &str into JSON cannot fail.
        let data_json = serde_json::to_string(&self.data).unwrap_or_default();
        let preimage = format!(
            "{}{}{}{}{}",
            self.index,
            self.preceding_hash,
            utc_string(&self.timestamp),
            data_json,
            self.nonce
        );
        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)
    }

    /// Perform Proof-of-Work by incrementing the nonce until the hash starts
    /// with `difficulty` zeros (in hex). Returns the number of hashes tried.
    ///
    /// `cancel` is polled between increments; when raised the search stops
    /// with [`MinerError::Cancelled`] and the block keeps a consistent
    /// nonce/hash pair.
    pub fn proof_of_work(&mut self, difficulty: u32, cancel: &AtomicBool) -> Result<u64> {
        let difficulty = clamp_difficulty(difficulty);
        let mut attempts = 0u64;
        while !self.meets_difficulty(difficulty) {
            if cancel.load(Ordering::Relaxed) {
                return Err(MinerError::Cancelled);
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.compute_hash();
            attempts += 1;
        }
        Ok(attempts)
    }

    /// True when the cached hash has `difficulty` leading hex zeros.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        has_leading_zeros(&self.hash, difficulty)
    }

    /// Validate that the block's cached `hash` matches its content and
    /// satisfies the PoW difficulty. (Does NOT validate chain linkage.)
    pub fn is_valid(&self, difficulty: u32) -> bool {
        self.hash == self.compute_hash() && self.meets_difficulty(difficulty)
    }
}

/// True when `hash` starts with `difficulty` hex zeros.
pub fn has_leading_zeros(hash: &str, difficulty: u32) -> bool {
    let difficulty = clamp_difficulty(difficulty) as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|c| c == b'0')
}

/// Difficulties above the digest length can never be satisfied.
pub fn clamp_difficulty(difficulty: u32) -> u32 {
    if difficulty > HASH_HEX_LEN {
        log::warn!("BLOCK - difficulty {difficulty} clamped to {HASH_HEX_LEN}");
        HASH_HEX_LEN
    } else {
        difficulty
    }
}

/// US-English rendering of a UTC instant, e.g. `7/4/2020, 3:05:09 PM`.
/// The verification service hashes genesis with exactly this layout.
pub fn utc_string(ts: &DateTime<Utc>) -> String {
    ts.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}
