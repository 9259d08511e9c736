//! Common types used across the dispatcher
//!
//! This module defines the queued [`Request`], the per-key [`Channel`], and
//! the call/response pair exchanged with a [`Transport`](crate::transport::Transport).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// A unit of backlog waiting to be sent
///
/// Requests are created by the [`RequestSource`](crate::source::RequestSource)
/// with strictly increasing ids and never change afterwards. A request is
/// consumed once: it is either sent or dropped, never requeued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Sequence number assigned by the source
    pub id: u64,
    /// Creation time on the runtime's monotonic clock
    pub created_at: Instant,
}

impl Request {
    /// Create a request stamped with the current time
    pub fn new(id: u64) -> Self {
        Self::at(id, Instant::now())
    }

    /// Create a request with an explicit creation time
    pub fn at(id: u64, created_at: Instant) -> Self {
        Request { id, created_at }
    }

    /// Age of the request at `now`
    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// One credentialed path to the remote API
///
/// The key is opaque. Logs only ever show its [`label`](Channel::label).
#[derive(Clone, PartialEq, Eq)]
pub struct Channel {
    api_key: String,
}

impl Channel {
    pub fn new(api_key: impl Into<String>) -> Self {
        Channel {
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Short form of the key that is safe to log
    pub fn label(&self) -> String {
        let prefix: String = self.api_key.chars().take(4).collect();
        format!("{prefix}***")
    }
}

// Keeps the credential out of `{:?}` output as well
impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("api_key", &self.label())
            .finish()
    }
}

/// Parameters sent with every outbound call
///
/// Serialized as the query string: `api_key`, `nonce`, `req_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCall {
    /// Channel credential
    pub api_key: String,
    /// Freshness token: wall-clock milliseconds when the call was issued
    pub nonce: u64,
    /// Id of the request being served
    pub req_id: u64,
}

impl ApiCall {
    /// Build the call for `request` on `channel`, stamping a fresh nonce
    pub fn new(channel: &Channel, request: &Request) -> Self {
        ApiCall {
            api_key: channel.api_key().to_string(),
            nonce: timestamp_ms(),
            req_id: request.id,
        }
    }
}

/// Response returned by the remote API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Parsed JSON payload
    pub body: Value,
}

impl ApiResponse {
    /// Whether the payload reports success (`"status": "OK"`)
    ///
    /// The HTTP status alone is not trusted: a remote may answer 200 with an
    /// error payload.
    pub fn is_ok(&self) -> bool {
        self.body.get("status").and_then(Value::as_str) == Some("OK")
    }
}

/// Where a stale request was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropStage {
    /// Expired while waiting in the shared queue
    Queue,
    /// Expired while waiting for the rate limiter to admit it
    Limiter,
}

impl fmt::Display for DropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropStage::Queue => write!(f, "from queue"),
            DropStage::Limiter => write!(f, "in limiter"),
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
