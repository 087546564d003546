use super::{Block, DIFFICULTY_MODULUS};

/// Local difficulty drift applied after every append:
/// `(old + gap_ms) mod 63`, where `gap_ms` is the time between the new
/// block and the block it extends. Negative gaps wrap (Euclidean remainder).
///
/// This is only a heuristic between syncs; each session starts from the
/// difficulty reported by the verification service.
pub fn next_difficulty(old: u32, preceding: &Block, block: &Block) -> u32 {
    let gap_ms = (block.timestamp - preceding.timestamp).num_milliseconds();
    (i64::from(old) + gap_ms).rem_euclid(DIFFICULTY_MODULUS) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn pair(gap_ms: i64) -> (Block, Block) {
        let t = Utc.with_ymd_and_hms(2021, 5, 1, 10, 0, 0).unwrap();
        let prev = Block::new(0, t, "Initial block in chain", "0");
        let next = Block::new(1, t + Duration::milliseconds(gap_ms), "4", prev.hash());
        (prev, next)
    }

    #[test]
    fn drifts_with_block_gap() {
        let (prev, next) = pair(1000);
        assert_eq!(next_difficulty(4, &prev, &next), 14);
    }

    #[test]
    fn zero_gap_keeps_difficulty() {
        let (prev, next) = pair(0);
        assert_eq!(next_difficulty(5, &prev, &next), 5);
    }

    #[test]
    fn wraps_at_modulus() {
        let (prev, next) = pair(59);
        assert_eq!(next_difficulty(4, &prev, &next), 0);
    }

    #[test]
    fn negative_gap_stays_in_range() {
        let (prev, next) = pair(-10);
        assert_eq!(next_difficulty(4, &prev, &next), 57);
    }
}
