//! In-process transport
//!
//! Answers calls with an [`ExchangeState`] instead of going over the network,
//! after an optional simulated latency. Useful for dry runs of a strategy and
//! for tests that run on a paused clock.

use super::Transport;
use crate::error::DispatchError;
use crate::exchange::ExchangeState;
use crate::types::{ApiCall, ApiResponse};
use async_trait::async_trait;
use std::time::Duration;

pub struct LoopbackTransport {
    exchange: ExchangeState,
    latency: Duration,
}

impl LoopbackTransport {
    pub fn new(exchange: ExchangeState) -> Self {
        LoopbackTransport {
            exchange,
            latency: Duration::ZERO,
        }
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn exchange(&self) -> &ExchangeState {
        &self.exchange
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, call: ApiCall) -> Result<ApiResponse, DispatchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.exchange.handle(&call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_loopback_latency() {
        let transport = LoopbackTransport::new(ExchangeState::new(5).unwrap())
            .with_latency(Duration::from_millis(30));

        let start = Instant::now();
        let response = transport
            .send(ApiCall {
                api_key: "k".into(),
                nonce: 0,
                req_id: 1,
            })
            .await
            .unwrap();

        assert!(response.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(start.elapsed() < Duration::from_millis(32));
    }
}
