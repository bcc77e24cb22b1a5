use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use nano_store::ObjectStore;
use tower_http::trace::TraceLayer;

use crate::auth::{ApiKeyAuth, AuthProvider};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{self, AppState};
use crate::stage::Pipeline;
use crate::stages::{ApiKeyStage, LoggingStage, RecoveryStage};

/// Stages in front of routes anyone may call.
pub fn public_pipeline() -> Pipeline {
    Pipeline::new()
        .with_stage(LoggingStage)
        .with_stage(RecoveryStage)
}

/// Stages in front of the object routes.
pub fn protected_pipeline(provider: Arc<dyn AuthProvider>) -> Pipeline {
    public_pipeline().with_stage(ApiKeyStage::new(provider))
}

/// Build the axum router with all nanocloud endpoints.
///
/// `/health` is public. Every object route requires the configured API key.
pub fn build_router(store: Arc<dyn ObjectStore>, config: &ServerConfig) -> ServerResult<Router> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| ServerError::Config("api_key is not configured".into()))?;
    let provider: Arc<dyn AuthProvider> = Arc::new(ApiKeyAuth::new(api_key));

    let objects = Router::new()
        .route("/upload", post(handler::upload))
        .route("/download/", get(handler::download))
        .route("/download/*key", get(handler::download))
        .route("/stream/", get(handler::stream))
        .route("/stream/*key", get(handler::stream))
        .route("/files", get(handler::list))
        .route("/files/", delete(handler::delete))
        .route("/files/*key", delete(handler::delete))
        .layer(DefaultBodyLimit::max(config.max_request_body_size));
    let objects = protected_pipeline(provider)
        .apply(objects)
        .with_state(AppState::new(store));

    let public = public_pipeline().apply(Router::new().route("/health", get(handler::health)));

    Ok(public.merge(objects).layer(TraceLayer::new_for_http()))
}
