use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;

use crate::stage::{Next, RequestStage};

/// Turns a panic in any later stage or handler into a 500 response.
pub struct RecoveryStage;

#[async_trait]
impl RequestStage for RecoveryStage {
    fn name(&self) -> &str {
        "recovery"
    }

    async fn handle(&self, request: Request, next: Next<'_>) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();

        match AssertUnwindSafe(next.run(request)).catch_unwind().await {
            Ok(response) => response,
            Err(payload) => {
                tracing::error!(
                    %method,
                    %path,
                    panic = panic_message(payload.as_ref()),
                    "request handler panicked"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error\n").into_response()
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
