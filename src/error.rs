use thiserror::Error;

/// Everything that can go wrong while talking to the verification service
/// or while maintaining the local speculative chain.
#[derive(Error, Debug)]
pub enum MinerError {
    #[error("Invalid request path: {0}")]
    InvalidPath(String),

    #[error("Authentication options must be set for `{0}`")]
    AuthenticationRequired(String),

    #[error("Invalid response type (expected `{expected}`): {detail}")]
    ProtocolEnvelope {
        expected: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error("Failed to recreate genesis block (server {expected}, local {computed})")]
    GenesisMismatch { expected: String, computed: String },

    #[error("Chain invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Chain is empty, genesis block has not been seeded")]
    EmptyChain,

    #[error("Block does not link to chain tail: {0}")]
    BrokenLink(String),

    #[error("Miner is not initialized, call init() first")]
    NotInitialized,

    #[error("Mining cancelled")]
    Cancelled,

    #[error("All {tried} timestamp offsets in [{low}, {high}] were rejected")]
    OffsetsExhausted { low: i64, high: i64, tried: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Proof-of-work worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MinerError>;
