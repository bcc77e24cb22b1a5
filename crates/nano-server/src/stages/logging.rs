use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;

use crate::stage::{Next, RequestStage};

/// Emits one structured event per request once the response is known.
pub struct LoggingStage;

#[async_trait]
impl RequestStage for LoggingStage {
    fn name(&self) -> &str {
        "logging"
    }

    async fn handle(&self, request: Request, next: Next<'_>) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        let started = Instant::now();

        let response = next.run(request).await;

        let status = response.status();
        let elapsed_ms = whole_millis(started.elapsed());
        if status.is_server_error() {
            tracing::warn!(%method, %path, status = status.as_u16(), elapsed_ms, "request failed");
        } else {
            tracing::info!(%method, %path, status = status.as_u16(), elapsed_ms, "request completed");
        }
        response
    }
}

/// Milliseconds in `elapsed`, saturating at `u64::MAX`.
fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::test_support::*;
    use crate::stage::Pipeline;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn passes_response_through() {
        let pipeline = Pipeline::new().with_stage(LoggingStage);
        let response = pipeline.run(request("/files"), ok_endpoint()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn elapsed_saturates_instead_of_wrapping() {
        assert_eq!(whole_millis(Duration::from_micros(2_500)), 2);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }
}
