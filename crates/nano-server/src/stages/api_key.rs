use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};

use crate::auth::{AuthProvider, Credentials};
use crate::error::HttpError;
use crate::stage::{Next, RequestStage};

/// Rejects requests whose credentials the provider does not accept.
///
/// The accepted [`crate::auth::Identity`] is stored in the request
/// extensions for later stages and handlers.
pub struct ApiKeyStage {
    provider: Arc<dyn AuthProvider>,
}

impl ApiKeyStage {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RequestStage for ApiKeyStage {
    fn name(&self) -> &str {
        "api-key"
    }

    async fn handle(&self, mut request: Request, next: Next<'_>) -> Response {
        let credentials = Credentials::from_headers(request.headers());
        match self.provider.authenticate(&credentials) {
            Some(identity) => {
                request.extensions_mut().insert(identity);
                next.run(request).await
            }
            None => {
                tracing::debug!(path = %request.uri().path(), "rejected request without valid api key");
                HttpError::unauthorized().into_response()
            }
        }
    }
}
