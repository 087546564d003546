use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::models::{ChainInfo, Envelope, INFO_TAG, MINE_TAG, MineResponse};
use super::{VerificationService, Verdict};
use crate::config::{Credentials, MinerConfig};
use crate::error::{MinerError, Result};

/// The only paths the verification service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Info,
    Mine,
}

impl Endpoint {
    /// Resolve a request path (`"info"`, `"/mine"`, ...).
    pub fn from_path(path: &str) -> Result<Self> {
        match path.strip_prefix('/').unwrap_or(path) {
            "info" => Ok(Endpoint::Info),
            "mine" => Ok(Endpoint::Mine),
            _ => Err(MinerError::InvalidPath(path.to_string())),
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Info => "info",
            Endpoint::Mine => "mine",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Endpoint::Info => Method::GET,
            Endpoint::Mine => Method::POST,
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Endpoint::Mine)
    }

    /// Envelope tag a successful response must carry.
    pub fn expected_tag(&self) -> &'static str {
        match self {
            Endpoint::Info => INFO_TAG,
            Endpoint::Mine => MINE_TAG,
        }
    }
}

/// reqwest-backed client of the verification service.
pub struct HttpVerifier {
    http: Client,
    base_url: String,
    auth: Option<Credentials>,
}

impl HttpVerifier {
    pub fn new(cfg: &MinerConfig) -> Result<Self> {
        let http = Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            http,
            base_url: cfg.instance.trim_end_matches('/').to_string(),
            auth: cfg.auth.clone(),
        })
    }

    /// Send `body` to `path` and decode the tagged response.
    ///
    /// Credentials are merged into the body only for authenticated paths.
    /// Error responses carrying a `status` and a foreign `type` tag are
    /// rewritten into [`MinerError::ProtocolEnvelope`] with the server's detail.
    pub async fn request<T: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> Result<T> {
        let endpoint = Endpoint::from_path(path)?;
        let url = format!("{}/{}", self.base_url, endpoint.path());

        let mut req = self.http.request(endpoint.method(), &url);
        if endpoint.method() != Method::GET || body.is_some() {
            let json = self.with_credentials(endpoint, body.unwrap_or_else(|| json!({})))?;
            req = req.json(&json);
        }

        debug!("VERIFIER - {} {}", endpoint.method(), url);
        let resp = req.send().await?;
        let status = resp.status();
        let http_error = resp.error_for_status_ref().err();
        let payload: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => Value::Null,
        };

        if let Some(http_error) = http_error {
            return Err(rewrite_error(endpoint, status, &payload).unwrap_or(http_error.into()));
        }

        let tag = payload.get("type").and_then(Value::as_str);
        if tag != Some(endpoint.expected_tag()) {
            warn!(
                "VERIFIER - {} answered with tag {:?}",
                endpoint.path(),
                tag.unwrap_or("<none>")
            );
            return Err(MinerError::ProtocolEnvelope {
                expected: endpoint.expected_tag(),
                status: None,
                detail: detail_of(&payload).unwrap_or_else(|| "Invalid response type".to_string()),
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_value(payload).map_err(|e| MinerError::ProtocolEnvelope {
                expected: endpoint.expected_tag(),
                status: None,
                detail: format!("malformed {} body: {e}", endpoint.path()),
            })?;
        Ok(envelope.body)
    }

    fn with_credentials(&self, endpoint: Endpoint, mut body: Value) -> Result<Value> {
        if !endpoint.requires_auth() {
            return Ok(body);
        }
        let auth = self
            .auth
            .as_ref()
            .ok_or_else(|| MinerError::AuthenticationRequired(endpoint.path().to_string()))?;
        match body.as_object_mut() {
            Some(map) => {
                map.insert("id".into(), Value::String(auth.id.clone()));
                map.insert("key".into(), Value::String(auth.key.clone()));
                Ok(body)
            }
            None => Err(MinerError::Config(format!(
                "{} body must be a JSON object",
                endpoint.path()
            ))),
        }
    }
}

#[async_trait]
impl VerificationService for HttpVerifier {
    async fn info(&self) -> Result<ChainInfo> {
        self.request("info", None).await
    }

    async fn submit(&self, hash: &str) -> Result<Verdict> {
        match self
            .request::<MineResponse>("mine", Some(json!({ "hash": hash })))
            .await
        {
            Ok(resp) => Ok(Verdict::Accepted { data: resp.data }),
            Err(MinerError::ProtocolEnvelope {
                status: Some(code),
                detail,
                ..
            }) if is_rejection(code) => Ok(Verdict::Rejected { reason: detail }),
            Err(e) => Err(e),
        }
    }
}

/// Client errors other than auth failures mean "this hash was not accepted".
fn is_rejection(code: u16) -> bool {
    StatusCode::from_u16(code)
        .map(|s| {
            s.is_client_error() && s != StatusCode::UNAUTHORIZED && s != StatusCode::FORBIDDEN
        })
        .unwrap_or(false)
}

fn detail_of(payload: &Value) -> Option<String> {
    payload
        .get("detail")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn rewrite_error(endpoint: Endpoint, status: StatusCode, payload: &Value) -> Option<MinerError> {
    let has_status = payload.get("status").is_some_and(|s| !s.is_null());
    let tag = payload.get("type").and_then(Value::as_str);
    if !has_status || tag == Some(endpoint.expected_tag()) {
        return None;
    }
    Some(MinerError::ProtocolEnvelope {
        expected: endpoint.expected_tag(),
        status: Some(status.as_u16()),
        detail: detail_of(payload).unwrap_or_else(|| format!("HTTP {status}")),
    })
}
