//! HTTP transport for the remote API
//!
//! Every call is a `GET` to the configured URL with the call parameters in
//! the query string:
//!
//! ```text
//! GET /api/request?api_key=UT4N...&nonce=1700000000000&req_id=42
//! ```
//!
//! The response body must be JSON. Its HTTP status code is passed through
//! untouched, so a `429` from the remote arrives as a normal response.

use super::Transport;
use crate::error::DispatchError;
use crate::types::{ApiCall, ApiResponse};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// reqwest-backed transport
///
/// The underlying client keeps a connection pool, so one instance should be
/// shared (behind an `Arc`) by all channels.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for `url` whose calls give up after `timeout`
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_error(&self, err: reqwest::Error) -> DispatchError {
        if err.is_timeout() {
            DispatchError::TransportTimeout {
                after: self.timeout,
            }
        } else {
            DispatchError::TransportFailure(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, call: ApiCall) -> Result<ApiResponse, DispatchError> {
        let response = self
            .client
            .get(&self.url)
            .query(&call)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status_code = response.status().as_u16();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| self.map_error(e))?;

        Ok(ApiResponse { status_code, body })
    }
}
