//! HTTP server for nanocloud.
//!
//! Exposes a [`nano_store::ObjectStore`] over HTTP: multipart upload,
//! attachment download, range-aware streaming, listing and deletion. Every
//! request passes through an ordered [`stage::Pipeline`] of logging, panic
//! recovery and (for object routes) API-key checks.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod serve;
pub mod server;
pub mod stage;
pub mod stages;

pub use auth::{ApiKeyAuth, AuthProvider, Credentials, Identity, API_KEY_HEADER};
pub use config::{ApiKey, ServerConfig};
pub use error::{HttpError, ServerError, ServerResult};
pub use handler::AppState;
pub use stage::{Next, Pipeline, RequestStage};
pub use server::NanoServer;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use axum::routing::get;
    use axum::Router;
    use nano_store::ObjectMetadata;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    const KEY: &str = "s3cret";
    const BOUNDARY: &str = "nanocloud-test-boundary";

    fn app() -> (TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            storage_root: dir.path().to_path_buf(),
            api_key: Some(ApiKey::new(KEY)),
            ..Default::default()
        };
        let router = NanoServer::new(config).unwrap().router().unwrap();
        (dir, router)
    }

    fn request(method: Method, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(API_KEY_HEADER, KEY)
    }

    fn get_req(uri: &str) -> Request<Body> {
        request(Method::GET, uri).body(Body::empty()).unwrap()
    }

    fn multipart(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        request(Method::POST, "/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn upload(app: &Router, key: &str, content: &[u8]) {
        let response = send(app, multipart("file", key, content)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, format!("uploaded: {key}\n"));
    }

    #[tokio::test]
    async fn health_is_public() {
        let (_dir, app) = app();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn object_routes_require_api_key() {
        let (_dir, app) = app();

        let req = Request::builder().uri("/files").body(Body::empty()).unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(text(response).await, "unauthorized\n");

        let req = Request::builder()
            .uri("/files")
            .header(API_KEY_HEADER, "wrong")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upload_then_download() {
        let (dir, app) = app();
        upload(&app, "docs/readme.txt", b"hello nanocloud").await;
        assert_eq!(
            std::fs::read(dir.path().join("docs/readme.txt")).unwrap(),
            b"hello nanocloud"
        );

        let response = send(&app, get_req("/download/docs/readme.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"docs/readme.txt\""
        );
        assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(headers[header::CONTENT_LENGTH], "15");
        assert_eq!(text(response).await, "hello nanocloud");
    }

    #[tokio::test]
    async fn upload_rejections() {
        let (_dir, app) = app();

        let response = send(&app, multipart("other", "a.txt", b"x")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text(response).await, "file required\n");

        let response = send(&app, multipart("file", "", b"x")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text(response).await, "filepath required\n");

        let response = send(&app, multipart("file", "../escape.txt", b"x")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text(response).await, "invalid filepath\n");

        let req = request(Method::POST, "/upload")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("not a form"))
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text(response).await, "invalid multipart form\n");
    }

    #[tokio::test]
    async fn traversal_is_bad_request() {
        let (_dir, app) = app();
        for uri in [
            "/download/../etc/passwd",
            "/download/%2e%2e/etc/passwd",
            "/stream/a/../../b",
        ] {
            let response = send(&app, get_req(uri)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(text(response).await, "invalid filepath\n");
        }
    }

    #[tokio::test]
    async fn empty_key_is_bad_request() {
        let (_dir, app) = app();
        for (method, uri) in [
            (Method::GET, "/download/"),
            (Method::GET, "/stream/"),
            (Method::DELETE, "/files/"),
        ] {
            let req = request(method, uri).body(Body::empty()).unwrap();
            let response = send(&app, req).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(text(response).await, "filepath required\n");
        }
    }

    #[tokio::test]
    async fn missing_objects_are_not_found() {
        let (_dir, app) = app();
        for uri in ["/download/nope.txt", "/stream/nope.txt"] {
            let response = send(&app, get_req(uri)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
        let req = request(Method::DELETE, "/files/nope.txt")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_object() {
        let (_dir, app) = app();
        upload(&app, "tmp/gone.bin", b"bye").await;

        let req = request(Method::DELETE, "/files/tmp/gone.bin")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "deleted: tmp/gone.bin\n");

        let response = send(&app, get_req("/download/tmp/gone.bin")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_returns_json() {
        let (_dir, app) = app();

        let response = send(&app, get_req("/files")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "[]");

        upload(&app, "b.txt", b"bbb").await;
        upload(&app, "a/one.txt", b"1").await;

        let response = send(&app, get_req("/files")).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let listed: Vec<ObjectMetadata> = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(
            listed,
            vec![
                ObjectMetadata {
                    path: "a/one.txt".into(),
                    name: "one.txt".into(),
                    size: 1,
                },
                ObjectMetadata {
                    path: "b.txt".into(),
                    name: "b.txt".into(),
                    size: 3,
                },
            ]
        );
    }

    #[tokio::test]
    async fn stream_honours_range() {
        let (_dir, app) = app();
        upload(&app, "media/clip.txt", b"0123456789").await;

        let response = send(&app, get_req("/stream/media/clip.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
        assert_eq!(text(response).await, "0123456789");

        let req = request(Method::GET, "/stream/media/clip.txt")
            .header(header::RANGE, "bytes=3-6")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 3-6/10");
        assert_eq!(text(response).await, "3456");
    }

    #[tokio::test]
    async fn stream_conditional_get() {
        let (_dir, app) = app();
        upload(&app, "page.html", b"<p>hi</p>").await;

        let response = send(&app, get_req("/stream/page.html")).await;
        let last_modified = response.headers()[header::LAST_MODIFIED].clone();

        let req = request(Method::GET, "/stream/page.html")
            .header(header::IF_MODIFIED_SINCE, last_modified)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.status(), StatusCode::NOT_MODIFIED);
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn panics_are_recovered() {
        let auth = Arc::new(ApiKeyAuth::new(ApiKey::new(KEY)));
        let app = router::protected_pipeline(auth).apply(Router::new().route("/boom", get(explode)));

        let response = send(&app, get_req("/boom")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text(response).await, "internal server error\n");
    }
}
