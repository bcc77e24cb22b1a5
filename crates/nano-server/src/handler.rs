use std::io::Cursor;
use std::sync::Arc;

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::{Path, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nano_store::{ObjectStore, StoreResult};
use serde::Serialize;

use crate::error::HttpError;
use crate::serve::serve_content;

/// Multipart field that carries the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Shared state for the object routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

/// Health check payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /upload
///
/// The object key is the filename of the `file` part.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, HttpError> {
    let mut multipart = multipart.map_err(|_| HttpError::bad_request("invalid multipart form"))?;

    let (key, data) = loop {
        let field = multipart.next_field().await.map_err(multipart_error)?;
        let Some(field) = field else {
            return Err(HttpError::bad_request("file required"));
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let key = field.file_name().unwrap_or_default().to_owned();
        let data = field.bytes().await.map_err(multipart_error)?;
        break (key, data);
    };

    let key = required(key)?;
    let store = Arc::clone(&state.store);
    let target = key.clone();
    let written = blocking(
        move || store.save(&target, &mut Cursor::new(data)),
        "upload failed",
    )
    .await?;

    tracing::debug!(%key, bytes = written, "object stored");
    Ok(format!("uploaded: {key}\n"))
}

/// GET /download/*key
pub async fn download(
    State(state): State<AppState>,
    key: Option<Path<String>>,
) -> Result<Response, HttpError> {
    let key = required_path(key)?;
    let store = Arc::clone(&state.store);
    let target = key.clone();
    let data = blocking(move || store.read(&target), "failed to open file").await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename={key:?}"))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    Ok((
        [
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(data.len())),
        ],
        data,
    )
        .into_response())
}

/// GET /stream/*key
pub async fn stream(
    State(state): State<AppState>,
    key: Option<Path<String>>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let key = required_path(key)?;
    let store = Arc::clone(&state.store);
    let handle = blocking(move || store.open(&key), "failed to stream file").await?;
    Ok(serve_content(handle, &headers))
}

/// DELETE /files/*key
pub async fn delete(
    State(state): State<AppState>,
    key: Option<Path<String>>,
) -> Result<String, HttpError> {
    let key = required_path(key)?;
    let store = Arc::clone(&state.store);
    let target = key.clone();
    blocking(move || store.delete(&target), "failed to delete file").await?;
    Ok(format!("deleted: {key}\n"))
}

/// GET /files
pub async fn list(State(state): State<AppState>) -> Result<Response, HttpError> {
    let store = Arc::clone(&state.store);
    let objects = blocking(move || store.list(), "failed to list files").await?;

    let body = serde_json::to_string_pretty(&objects).map_err(|err| {
        tracing::warn!(error = %err, "cannot encode listing");
        HttpError::internal("failed to encode list")
    })?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

fn required(key: String) -> Result<String, HttpError> {
    if key.is_empty() {
        Err(HttpError::bad_request("filepath required"))
    } else {
        Ok(key)
    }
}

fn required_path(key: Option<Path<String>>) -> Result<String, HttpError> {
    required(key.map(|Path(key)| key).unwrap_or_default())
}

fn multipart_error(err: MultipartError) -> HttpError {
    tracing::debug!(error = %err, "rejected multipart body");
    HttpError::bad_request("invalid multipart form")
}

/// Run a store call on the blocking pool and translate its failure.
///
/// A panic inside the call is resumed on the request task.
async fn blocking<T, F>(call: F, io_message: &'static str) -> Result<T, HttpError>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result.map_err(|err| HttpError::from_store(err, io_message)),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => {
            tracing::error!(error = %err, "blocking store call was cancelled");
            Err(HttpError::internal(io_message))
        }
    }
}
