use std::collections::HashSet;

use rand::Rng;

/// Uniform draws of timestamp offsets (whole seconds) from `[low, high]`,
/// never returning the same offset twice.
#[derive(Debug)]
pub struct OffsetSampler {
    low: i64,
    high: i64,
    tried: HashSet<i64>,
}

impl OffsetSampler {
    /// Range for one mining iteration: `[difficulty, difficulty + total_blocks²]`.
    /// It widens as more blocks get claimed.
    pub fn for_iteration(difficulty: u32, total_blocks: u64) -> Self {
        let low = i64::from(difficulty);
        let spread = i64::try_from(total_blocks)
            .unwrap_or(i64::MAX)
            .saturating_mul(i64::try_from(total_blocks).unwrap_or(i64::MAX));
        Self {
            low,
            high: low.saturating_add(spread),
            tried: HashSet::new(),
        }
    }

    pub fn bounds(&self) -> (i64, i64) {
        (self.low, self.high)
    }

    pub fn tried(&self) -> usize {
        self.tried.len()
    }

    /// Number of distinct offsets in the range (saturating).
    pub fn span(&self) -> u64 {
        (self.high - self.low).unsigned_abs().saturating_add(1)
    }

    /// Next untried offset, or `None` once the whole range has been used.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<i64> {
        if self.tried.len() as u64 >= self.span() {
            return None;
        }
        loop {
            let offset = rng.gen_range(self.low..=self.high);
            if self.tried.insert(offset) {
                return Some(offset);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn range_grows_with_claimed_blocks() {
        assert_eq!(OffsetSampler::for_iteration(4, 0).bounds(), (4, 4));
        assert_eq!(OffsetSampler::for_iteration(4, 3).bounds(), (4, 13));
        assert_eq!(OffsetSampler::for_iteration(0, 10).span(), 101);
    }

    #[test]
    fn never_repeats_an_offset() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut sampler = OffsetSampler::for_iteration(2, 3);
        let mut seen = HashSet::new();
        while let Some(o) = sampler.draw(&mut rng) {
            assert!((2..=11).contains(&o));
            assert!(seen.insert(o), "offset {o} drawn twice");
        }
        assert_eq!(seen.len(), 10);
        assert_eq!(sampler.tried(), 10);
        assert_eq!(sampler.draw(&mut rng), None);
    }

    #[test]
    fn single_offset_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut sampler = OffsetSampler::for_iteration(9, 0);
        assert_eq!(sampler.draw(&mut rng), Some(9));
        assert_eq!(sampler.draw(&mut rng), None);
    }

    #[test]
    fn huge_block_counts_saturate() {
        let sampler = OffsetSampler::for_iteration(1, u64::MAX);
        assert_eq!(sampler.bounds(), (1, i64::MAX));
    }
}
