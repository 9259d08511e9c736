//! Per-request outcome recording
//!
//! Both dispatch strategies end every request here: the outcome is counted
//! in [`Metrics`] and logged in the line shapes the log analyzer expects.

use crate::error::DispatchError;
use crate::metrics::Metrics;
use crate::types::{ApiResponse, DropStage};
use tracing::{info, warn};

/// Decide whether a response counts as a success
///
/// # Errors
///
/// [`DispatchError::RemoteRejection`] when the payload does not report `OK`,
/// whatever the HTTP status.
pub fn classify(response: &ApiResponse) -> Result<(), DispatchError> {
    if response.is_ok() {
        Ok(())
    } else {
        Err(DispatchError::RemoteRejection {
            status_code: response.status_code,
        })
    }
}

/// Record the result of one call for request `req_id`
pub fn record(metrics: &Metrics, req_id: u64, result: Result<ApiResponse, DispatchError>) {
    match result {
        Ok(response) => record_response(metrics, &response),
        Err(err) => record_error(metrics, req_id, err),
    }
}

/// Record a response from the remote
pub fn record_response(metrics: &Metrics, response: &ApiResponse) {
    metrics.record_sent();

    match classify(response) {
        Ok(()) => info!(
            "API response: status {}, resp {}",
            response.status_code, response.body
        ),
        Err(_) => {
            metrics.record_rejected();
            warn!(
                "API response: status {}, resp {}",
                response.status_code, response.body
            );
        }
    }
}

/// Record a request that never produced a response
pub fn record_error(metrics: &Metrics, req_id: u64, err: DispatchError) {
    match err {
        DispatchError::StaleRequest { stage, .. } => {
            match stage {
                DropStage::Queue => metrics.record_dropped_queue(),
                DropStage::Limiter => metrics.record_dropped_limiter(),
            }
            warn!("{err}");
        }
        DispatchError::LimiterTimeout { .. } => {
            record_error(metrics, req_id, err.into_stale(req_id));
        }
        DispatchError::RemoteRejection { .. } => {
            metrics.record_rejected();
            warn!("request {req_id} failed: {err}");
        }
        DispatchError::TransportTimeout { .. } | DispatchError::TransportFailure(_) => {
            metrics.record_failed();
            warn!("request {req_id} failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture;
    use serde_json::json;
    use std::time::Duration;

    fn message(line: &str) -> &str {
        line.splitn(4, " - ").nth(3).unwrap()
    }

    fn level(line: &str) -> &str {
        line.splitn(4, " - ").nth(2).unwrap()
    }

    #[test]
    fn test_success_is_info() {
        let metrics = Metrics::new();
        let lines = capture::lines(|| {
            record(
                &metrics,
                1,
                Ok(ApiResponse {
                    status_code: 200,
                    body: json!({"status": "OK"}),
                }),
            )
        });

        assert_eq!(lines.len(), 1);
        assert_eq!(level(&lines[0]), "INFO");
        assert_eq!(message(&lines[0]), r#"API response: status 200, resp {"status":"OK"}"#);
        assert_eq!(metrics.totals().sent, 1);
        assert_eq!(metrics.totals().rejected, 0);
    }

    #[test]
    fn test_rejection_is_warning_and_still_sent() {
        let metrics = Metrics::new();
        let lines = capture::lines(|| {
            record(
                &metrics,
                2,
                Ok(ApiResponse {
                    status_code: 429,
                    body: json!({"status": "error"}),
                }),
            )
        });

        assert_eq!(level(&lines[0]), "WARNING");
        assert!(message(&lines[0]).starts_with("API response: status 429, resp "));
        assert_eq!(metrics.totals().sent, 1);
        assert_eq!(metrics.totals().rejected, 1);
    }

    #[test]
    fn test_drops_name_their_stage() {
        let metrics = Metrics::new();
        let lines = capture::lines(|| {
            record_error(
                &metrics,
                3,
                DispatchError::StaleRequest {
                    id: 3,
                    stage: DropStage::Queue,
                },
            );
            record_error(
                &metrics,
                4,
                DispatchError::LimiterTimeout {
                    waited: Duration::from_millis(900),
                },
            );
        });

        assert_eq!(message(&lines[0]), "ignoring request 3 from queue due to TTL");
        assert_eq!(message(&lines[1]), "ignoring request 4 in limiter due to TTL");
        assert!(lines.iter().all(|line| level(line) == "WARNING"));

        let totals = metrics.totals();
        assert_eq!(totals.dropped_queue, 1);
        assert_eq!(totals.dropped_limiter, 1);
        assert_eq!(totals.sent, 0);
    }

    #[test]
    fn test_transport_failures_are_counted() {
        let metrics = Metrics::new();
        let lines = capture::lines(|| {
            record(
                &metrics,
                5,
                Err(DispatchError::TransportTimeout {
                    after: Duration::from_secs(1),
                }),
            );
            record(
                &metrics,
                6,
                Err(DispatchError::TransportFailure("connection refused".into())),
            );
        });

        assert_eq!(message(&lines[0]), "request 5 failed: call timed out after 1s");
        assert_eq!(
            message(&lines[1]),
            "request 6 failed: transport failure: connection refused"
        );
        assert_eq!(metrics.totals().failed, 2);
        assert_eq!(metrics.totals().sent, 0);
    }
}
