#[cfg(test)]
mod tests {
    use crate::error::DispatchError;
    use crate::exchange::{ExchangeState, MockExchange};
    use crate::transport::{HttpTransport, Transport};
    use crate::types::ApiCall;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn spawn_exchange(rate: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = ExchangeState::new(rate).unwrap();
        tokio::spawn(MockExchange::serve(listener, state));
        format!("http://{addr}/api/request")
    }

    fn call(req_id: u64) -> ApiCall {
        ApiCall {
            api_key: "test_key".to_string(),
            nonce: 1_700_000_000_000,
            req_id,
        }
    }

    #[tokio::test]
    async fn test_http_transport_round_trip() {
        let url = spawn_exchange(5).await;
        let transport = HttpTransport::new(&url, Duration::from_secs(1)).unwrap();

        let response = transport.send(call(42)).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert!(response.is_ok());
        assert_eq!(response.body["req_id"], 42);
        assert_eq!(response.body["nonce"], 1_700_000_000_000u64);
    }

    #[tokio::test]
    async fn test_http_transport_passes_rejections_through() {
        let url = spawn_exchange(1).await;
        let transport = HttpTransport::new(&url, Duration::from_secs(1)).unwrap();

        assert!(transport.send(call(1)).await.unwrap().is_ok());

        // Second call inside the same second is over the exchange's cap
        let response = transport.send(call(2)).await.unwrap();
        assert_eq!(response.status_code, 429);
        assert_eq!(response.body["status"], "error");
    }

    #[tokio::test]
    async fn test_http_transport_connection_failure() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport =
            HttpTransport::new(&format!("http://{addr}/api/request"), Duration::from_secs(1))
                .unwrap();
        let err = transport.send(call(1)).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::TransportFailure(_) | DispatchError::TransportTimeout { .. }
        ));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let url = spawn_exchange(5).await;
        let health = url.replace("/api/request", "/health");
        let body = reqwest::get(&health).await.unwrap().text().await.unwrap();
        assert_eq!(body, "OK");
    }
}
