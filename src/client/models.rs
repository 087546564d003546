use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/* ---------- Envelope tags ---------- */

pub const INFO_TAG: &str = "general:info";
pub const MINE_TAG: &str = "user:mine";

/// Every response body is an object tagged by `type`, payload fields beside it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(kind: &str, body: T) -> Self {
        Self {
            kind: kind.to_string(),
            body,
        }
    }
}

/// Body the service attaches to non-2xx responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    #[serde(rename = "type")]
    pub kind: String,
    pub detail: String,
}

/* ---------- info ---------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstBlock {
    pub index: u64,
    pub hash: String,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Chain metadata reported by `GET info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    #[serde(default)]
    pub free_blocks: u64,
    #[serde(default)]
    pub total_blocks: u64,
    #[serde(default, alias = "ownerBlocks")]
    pub owned_blocks: u64,
    pub difficulty: u32,
    #[serde(default, deserialize_with = "flexible_timestamp_opt")]
    pub last_claimed_timestamp: Option<DateTime<Utc>>,
    pub first_block: FirstBlock,
}

impl ChainInfo {
    /// Base instant candidate offsets are added to.
    pub fn claim_base(&self) -> DateTime<Utc> {
        self.last_claimed_timestamp.unwrap_or(self.first_block.timestamp)
    }
}

/* ---------- mine ---------- */

#[derive(Debug, Serialize, Deserialize)]
pub struct MineRequest {
    pub hash: String,
    pub id: String,
    pub key: String,
}

/// `data` is opaque; a matching envelope tag is what signals acceptance.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MineResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/* ---------- Timestamp helpers ---------- */

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl RawTimestamp {
    fn into_utc<E: serde::de::Error>(self) -> Result<DateTime<Utc>, E> {
        match self {
            RawTimestamp::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| E::custom(format!("timestamp out of range: {ms}"))),
            RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| E::custom(format!("invalid timestamp {s:?}: {e}"))),
        }
    }
}

/// Accepts RFC 3339 strings or epoch milliseconds.
fn flexible_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    RawTimestamp::deserialize(deserializer)?.into_utc()
}

fn flexible_timestamp_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawTimestamp>::deserialize(deserializer)?
        .map(RawTimestamp::into_utc)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn info_decodes_string_and_millis_timestamps() {
        let body = json!({
            "type": INFO_TAG,
            "freeBlocks": 90,
            "totalBlocks": 10,
            "ownerBlocks": 3,
            "difficulty": 4,
            "lastClaimedTimestamp": 1_609_459_200_500i64,
            "firstBlock": {
                "index": 0,
                "hash": "abc",
                "timestamp": "2021-01-01T00:00:00.000Z"
            }
        });
        let env: Envelope<ChainInfo> = serde_json::from_value(body).unwrap();
        assert_eq!(env.kind, INFO_TAG);
        assert_eq!(env.body.owned_blocks, 3);
        assert_eq!(
            env.body.first_block.timestamp,
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            env.body.claim_base().timestamp_millis(),
            1_609_459_200_500
        );
    }

    #[test]
    fn missing_last_claim_falls_back_to_genesis() {
        let body = json!({
            "difficulty": 2,
            "lastClaimedTimestamp": null,
            "firstBlock": { "index": 0, "hash": "abc", "timestamp": 1_609_459_200_000i64 }
        });
        let info: ChainInfo = serde_json::from_value(body).unwrap();
        assert_eq!(info.last_claimed_timestamp, None);
        assert_eq!(info.claim_base(), info.first_block.timestamp);
    }
}
