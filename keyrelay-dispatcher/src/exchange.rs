//! Mock exchange: a stand-in for the remote API
//!
//! Enforces its own per-key rate cap with the same sliding-window rule the
//! dispatcher uses, so a run against it shows whether the client side ever
//! exceeds the contract.
//!
//! # API Endpoints
//!
//! ## GET /api/request
//!
//! Query parameters: `api_key`, `nonce`, `req_id`.
//!
//! ```json
//! {"status": "OK", "req_id": 42, "nonce": 1700000000000}
//! ```
//!
//! A key that exceeds its rate gets a `429`:
//!
//! ```json
//! {"status": "error", "error_msg": "rate limit exceeded", "req_id": 43}
//! ```
//!
//! ## GET /health
//!
//! Health check endpoint. Returns "OK" with 200 status.

use crate::types::{ApiCall, ApiResponse};
use anyhow::Result;
use axum::{Router, extract::Query, extract::State, http::StatusCode, response::Json, routing::get};
use keyrelay::{AdmissionError, RateLimiter};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;

/// Per-key admission state shared by all exchange handlers
#[derive(Clone)]
pub struct ExchangeState {
    limiters: Arc<Mutex<HashMap<String, RateLimiter>>>,
    template: RateLimiter,
}

impl ExchangeState {
    /// Accept at most `per_second_rate` calls per key in any trailing second
    ///
    /// The exchange applies no spacing rule; bursts are fine as long as the
    /// window is respected.
    pub fn new(per_second_rate: usize) -> Result<Self, AdmissionError> {
        let template = RateLimiter::builder()
            .per_second(per_second_rate)
            .min_spacing(Duration::ZERO)
            .build()?;

        Ok(ExchangeState {
            limiters: Arc::new(Mutex::new(HashMap::new())),
            template,
        })
    }

    /// Answer one call
    pub fn handle(&self, call: &ApiCall) -> ApiResponse {
        let now = Instant::now().into_std();
        let admitted = {
            let mut limiters = self.limiters.lock();
            limiters
                .entry(call.api_key.clone())
                .or_insert_with(|| self.template.clone())
                .try_admit(now)
                .is_admit()
        };

        if admitted {
            ApiResponse {
                status_code: StatusCode::OK.as_u16(),
                body: json!({"status": "OK", "req_id": call.req_id, "nonce": call.nonce}),
            }
        } else {
            ApiResponse {
                status_code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
                body: json!({
                    "status": "error",
                    "error_msg": "rate limit exceeded",
                    "req_id": call.req_id,
                }),
            }
        }
    }

    /// Number of distinct keys seen so far
    pub fn keys_seen(&self) -> usize {
        self.limiters.lock().len()
    }
}

/// HTTP server exposing [`ExchangeState`]
pub struct MockExchange {
    addr: SocketAddr,
    state: ExchangeState,
}

impl MockExchange {
    pub fn new(host: &str, port: u16, per_second_rate: usize) -> Result<Self> {
        let addr: SocketAddr = format!("{host}:{port}").parse()?;
        let state = ExchangeState::new(per_second_rate)?;
        Ok(Self { addr, state })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    /// Serve on a bound listener until the task is dropped
    pub async fn serve(listener: TcpListener, state: ExchangeState) -> Result<()> {
        tracing::info!("Mock exchange listening on {}", listener.local_addr()?);
        axum::serve(listener, router(state)).await?;
        Ok(())
    }
}

pub fn router(state: ExchangeState) -> Router {
    Router::new()
        .route("/api/request", get(handle_request))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}

async fn handle_request(
    State(state): State<ExchangeState>,
    Query(call): Query<ApiCall>,
) -> (StatusCode, Json<Value>) {
    let response = state.handle(&call);
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::OK);
    (status, Json(response.body))
}
