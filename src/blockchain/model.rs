use chrono::{DateTime, Utc};
use log::debug;

use super::Block;
use crate::error::{MinerError, Result};

/// In-memory speculative chain, seeded from the verification service's genesis.
#[derive(Debug, Default)]
pub struct Chain {
    chain: Vec<Block>,
}

impl Chain {
    /// An unseeded chain. `seed_genesis()` must succeed before anything is appended.
    pub fn new() -> Self {
        Self { chain: Vec::new() }
    }

    /// Rebuild the genesis block from public inputs and accept it only if it
    /// reproduces `reference_hash`. On mismatch the chain stays unseeded.
    pub fn seed_genesis(
        &mut self,
        index: u64,
        timestamp: DateTime<Utc>,
        payload: &str,
        preceding_hash: &str,
        reference_hash: &str,
    ) -> Result<&Block> {
        if !self.chain.is_empty() {
            return Err(MinerError::InvariantViolation(
                "genesis already seeded".to_string(),
            ));
        }

        let genesis = Block::new(index, timestamp, payload, preceding_hash);
        if genesis.hash() != reference_hash {
            return Err(MinerError::GenesisMismatch {
                expected: reference_hash.to_string(),
                computed: genesis.hash().to_string(),
            });
        }

        debug!("CHAIN - genesis #{} hash={}", genesis.index, genesis.hash());
        self.chain.push(genesis);
        self.latest()
    }

    /// Return the last block in the chain.
    pub fn latest(&self) -> Result<&Block> {
        self.chain.last().ok_or(MinerError::EmptyChain)
    }

    /// Append a block that extends the tail. Nothing is mutated on failure.
    pub fn append(&mut self, block: Block) -> Result<&Block> {
        let latest = self.latest()?;
        if block.index != latest.index + 1 {
            return Err(MinerError::BrokenLink(format!(
                "index {} does not follow {}",
                block.index, latest.index
            )));
        }
        if block.preceding_hash != latest.hash() {
            return Err(MinerError::BrokenLink(format!(
                "preceding hash {} != tail hash {}",
                block.preceding_hash,
                latest.hash()
            )));
        }
        if block.hash() != block.compute_hash() {
            return Err(MinerError::BrokenLink(format!(
                "stale hash on block #{}",
                block.index
            )));
        }

        self.chain.push(block);
        self.latest()
    }

    /// Remove `block` if and only if it is the current tail.
    pub fn rollback_last(&mut self, block: &Block) -> Result<Block> {
        let tail = self.latest()?;
        // Genesis is never speculative.
        if self.chain.len() < 2 || tail.index != block.index || tail.hash() != block.hash() {
            return Err(MinerError::InvariantViolation(format!(
                "block #{} ({}) is not a speculative chain tail (tail #{} {})",
                block.index,
                block.hash(),
                tail.index,
                tail.hash()
            )));
        }

        let removed = self.chain.pop().ok_or(MinerError::EmptyChain)?;
        debug!("CHAIN - rolled back #{} hash={}", removed.index, removed.hash());
        Ok(removed)
    }

    /// Validate the entire chain: linkage, hash integrity, and proof-of-work
    /// against the difficulty each mined block records in its payload.
    pub fn is_valid_chain(&self) -> bool {
        let Some(genesis) = self.chain.first() else {
            return false;
        };
        if genesis.hash() != genesis.compute_hash() {
            return false;
        }

        self.chain.windows(2).all(|pair| {
            let (prev, current) = (&pair[0], &pair[1]);
            current.index == prev.index + 1
                && current.preceding_hash == prev.hash()
                && current
                    .data
                    .parse::<u32>()
                    .is_ok_and(|difficulty| current.is_valid(difficulty))
        })
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{GENESIS_DATA, GENESIS_PRECEDING_HASH};
    use chrono::{Duration, TimeZone};

    const GENESIS_HASH: &str = "21513b2ea331aec049a63c9bb3a3c7e973eb7b580fd69ec177f3657fa9563d1f";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
    }

    fn seeded() -> Chain {
        let mut chain = Chain::new();
        chain
            .seed_genesis(0, t0(), GENESIS_DATA, GENESIS_PRECEDING_HASH, GENESIS_HASH)
            .unwrap();
        chain
    }

    fn next_for(chain: &Chain, offset_ms: i64) -> Block {
        let tail = chain.latest().unwrap();
        Block::new(
            tail.index + 1,
            tail.timestamp + Duration::milliseconds(offset_ms),
            "0",
            tail.hash(),
        )
    }

    #[test]
    fn empty_chain_has_no_latest() {
        let chain = Chain::new();
        assert!(matches!(chain.latest(), Err(MinerError::EmptyChain)));
        assert!(!chain.is_valid_chain());
    }

    #[test]
    fn genesis_matches_reference_hash() {
        let chain = seeded();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.latest().unwrap().hash(), GENESIS_HASH);
        assert!(chain.is_valid_chain());
    }

    #[test]
    fn genesis_mismatch_leaves_chain_unseeded() {
        let mut chain = Chain::new();
        let err = chain
            .seed_genesis(0, t0(), GENESIS_DATA, GENESIS_PRECEDING_HASH, "deadbeef")
            .unwrap_err();
        match err {
            MinerError::GenesisMismatch { expected, computed } => {
                assert_eq!(expected, "deadbeef");
                assert_eq!(computed, GENESIS_HASH);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(chain.is_empty());
    }

    #[test]
    fn append_links_blocks() {
        let mut chain = seeded();
        for i in 1..=3 {
            let block = next_for(&chain, i * 10);
            let prev_hash = chain.latest().unwrap().hash().to_string();
            let appended = chain.append(block).unwrap();
            assert_eq!(appended.index, i as u64);
            assert_eq!(appended.preceding_hash, prev_hash);
        }
        assert_eq!(chain.len(), 4);
        assert!(chain.is_valid_chain());
    }

    #[test]
    fn unsealed_block_fails_chain_audit() {
        let mut chain = seeded();
        let tail = chain.latest().unwrap().clone();
        // Claims difficulty 64 without the work to back it.
        chain
            .append(Block::new(1, tail.timestamp, "64", tail.hash()))
            .unwrap();
        assert!(!chain.is_valid_chain());

        let mut chain = seeded();
        chain
            .append(Block::new(1, tail.timestamp, "not a difficulty", tail.hash()))
            .unwrap();
        assert!(!chain.is_valid_chain());
    }

    #[test]
    fn append_rejects_wrong_index_or_link() {
        let mut chain = seeded();
        let tail = chain.latest().unwrap().clone();

        let skipped = Block::new(2, tail.timestamp, "4", tail.hash());
        assert!(matches!(chain.append(skipped), Err(MinerError::BrokenLink(_))));

        let orphan = Block::new(1, tail.timestamp, "4", "not-the-tail");
        assert!(matches!(chain.append(orphan), Err(MinerError::BrokenLink(_))));

        let mut tampered = next_for(&chain, 5);
        tampered.data = "changed".into();
        assert!(matches!(chain.append(tampered), Err(MinerError::BrokenLink(_))));

        assert_eq!(chain.len(), 1);
        assert_eq!(chain.latest().unwrap(), &tail);
    }

    #[test]
    fn rollback_restores_prior_state() {
        let mut chain = seeded();
        let accepted = next_for(&chain, 10);
        chain.append(accepted).unwrap();
        let before_tail = chain.latest().unwrap().clone();
        let before_len = chain.len();

        let speculative = next_for(&chain, 20);
        chain.append(speculative.clone()).unwrap();
        let removed = chain.rollback_last(&speculative).unwrap();

        assert_eq!(removed, speculative);
        assert_eq!(chain.len(), before_len);
        assert_eq!(chain.latest().unwrap(), &before_tail);
    }

    #[test]
    fn rollback_of_non_tail_is_an_invariant_violation() {
        let mut chain = seeded();
        let first = next_for(&chain, 10);
        chain.append(first.clone()).unwrap();
        let second = next_for(&chain, 20);
        chain.append(second).unwrap();

        let err = chain.rollback_last(&first).unwrap_err();
        assert!(matches!(err, MinerError::InvariantViolation(_)));
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn genesis_cannot_be_rolled_back() {
        let mut chain = seeded();
        let genesis = chain.latest().unwrap().clone();
        assert!(matches!(
            chain.rollback_last(&genesis),
            Err(MinerError::InvariantViolation(_))
        ));
        assert_eq!(chain.len(), 1);
    }
}
