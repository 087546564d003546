pub mod http;
pub mod models;

use async_trait::async_trait;

use crate::error::Result;

pub use http::{Endpoint, HttpVerifier};
pub use models::ChainInfo;

/// Outcome of submitting a candidate hash.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted { data: Option<serde_json::Value> },
    /// The service said no; the candidate should be discarded.
    Rejected { reason: String },
}

/// The remote authority that accepts or rejects block hashes.
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Current chain metadata (`GET info`).
    async fn info(&self) -> Result<ChainInfo>;

    /// Submit a candidate block hash (`POST mine`).
    async fn submit(&self, hash: &str) -> Result<Verdict>;
}
