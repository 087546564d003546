pub mod block;
pub mod difficulty;
pub mod model;

pub use block::Block;
pub use difficulty::next_difficulty;
pub use model::Chain;

/// Length of a SHA-256 digest in hex characters; the highest satisfiable difficulty.
pub const HASH_HEX_LEN: u32 = 64;

/// Modulus of the local difficulty heuristic.
pub const DIFFICULTY_MODULUS: i64 = 63;

/// Difficulty used before the first server sync.
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Payload the verification service uses for its first block.
pub const GENESIS_DATA: &str = "Initial block in chain";

/// `preceding_hash` of the genesis block.
pub const GENESIS_PRECEDING_HASH: &str = "0";
