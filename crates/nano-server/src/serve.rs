//! Conditional and byte-range responses over an open [`StreamHandle`].
//!
//! Handles `If-Modified-Since`, `Range` and `If-Range` for a single range.
//! Multi-range and malformed `Range` headers are ignored and the full
//! content is served.

use std::io::{self, Read, Seek, SeekFrom};
use std::time::SystemTime;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use httpdate::HttpDate;
use nano_store::{ObjectReader, StreamHandle};
use tokio::sync::mpsc;

/// Bytes read from the handle per body chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks buffered between the reading thread and the connection.
const CHANNEL_DEPTH: usize = 4;

/// Outcome of interpreting a `Range` header against an object size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteRange {
    /// No usable range: serve everything.
    Full,
    /// Inclusive `start..=end`.
    Partial { start: u64, end: u64 },
    /// Well-formed, but no byte of the object falls inside it.
    Unsatisfiable,
}

/// Parse a single `bytes=` range.
pub fn parse_range(value: &str, size: u64) -> ByteRange {
    let Some(ranges) = value.trim().strip_prefix("bytes=") else {
        return ByteRange::Full;
    };
    if ranges.contains(',') || size == 0 {
        return ByteRange::Full;
    }
    let Some((first, last)) = ranges.trim().split_once('-') else {
        return ByteRange::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix form: the final `n` bytes.
        return match last.parse::<u64>() {
            Ok(0) => ByteRange::Unsatisfiable,
            Ok(n) => ByteRange::Partial {
                start: size.saturating_sub(n),
                end: size - 1,
            },
            Err(_) => ByteRange::Full,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return ByteRange::Full;
    };
    let end = if last.is_empty() {
        size - 1
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end.min(size - 1),
            _ => return ByteRange::Full,
        }
    };
    if start >= size {
        ByteRange::Unsatisfiable
    } else {
        ByteRange::Partial { start, end }
    }
}

/// Build the response for `handle` given the request headers.
///
/// The handle moves into a blocking task that pumps its bytes into the
/// body and drops it when the body is finished or abandoned.
pub fn serve_content(handle: StreamHandle, request: &HeaderMap) -> Response {
    let (reader, info) = handle.into_parts();
    let last_modified = HttpDate::from(info.modified);
    // HTTP dates carry whole seconds; compare at that precision.
    let modified = SystemTime::from(last_modified);
    let content_type = mime_guess::from_path(&info.name).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    set(&mut headers, header::LAST_MODIFIED, last_modified.to_string());
    set(&mut headers, header::ACCEPT_RANGES, "bytes".to_string());

    if let Some(since) = header_date(request, header::IF_MODIFIED_SINCE) {
        if modified <= since {
            return (StatusCode::NOT_MODIFIED, headers).into_response();
        }
    }

    set(&mut headers, header::CONTENT_TYPE, content_type.to_string());

    let range = match request.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        Some(value) if if_range_allows(request, modified) => parse_range(value, info.size),
        _ => ByteRange::Full,
    };

    match range {
        ByteRange::Full => {
            set(&mut headers, header::CONTENT_LENGTH, info.size.to_string());
            (StatusCode::OK, headers, pump(reader, 0, info.size)).into_response()
        }
        ByteRange::Partial { start, end } => {
            let len = end - start + 1;
            set(
                &mut headers,
                header::CONTENT_RANGE,
                format!("bytes {start}-{end}/{}", info.size),
            );
            set(&mut headers, header::CONTENT_LENGTH, len.to_string());
            (StatusCode::PARTIAL_CONTENT, headers, pump(reader, start, len)).into_response()
        }
        ByteRange::Unsatisfiable => {
            set(
                &mut headers,
                header::CONTENT_RANGE,
                format!("bytes */{}", info.size),
            );
            (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response()
        }
    }
}

fn set(headers: &mut HeaderMap, name: HeaderName, value: String) {
    if let Ok(value) = HeaderValue::try_from(value) {
        headers.insert(name, value);
    }
}

fn header_date(headers: &HeaderMap, name: HeaderName) -> Option<SystemTime> {
    let value = headers.get(name)?.to_str().ok()?;
    value.trim().parse::<HttpDate>().ok().map(SystemTime::from)
}

/// `If-Range` only ever matches a date here; entity tags are never issued.
fn if_range_allows(headers: &HeaderMap, modified: SystemTime) -> bool {
    if !headers.contains_key(header::IF_RANGE) {
        return true;
    }
    header_date(headers, header::IF_RANGE) == Some(modified)
}

/// Stream `len` bytes starting at `start` out of `reader`.
fn pump(mut reader: Box<dyn ObjectReader>, start: u64, len: u64) -> Body {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_DEPTH);

    tokio::task::spawn_blocking(move || {
        if let Err(err) = reader.seek(SeekFrom::Start(start)) {
            let _ = tx.blocking_send(Err(err));
            return;
        }
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut remaining = len;
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            match reader.read(&mut buf[..want]) {
                Ok(0) => {
                    let _ = tx.blocking_send(Err(io::ErrorKind::UnexpectedEof.into()));
                    return;
                }
                Ok(n) => {
                    remaining -= n as u64;
                    if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                        // Client went away.
                        return;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "read failed while streaming object");
                    let _ = tx.blocking_send(Err(err));
                    return;
                }
            }
        }
    });

    let chunks = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    Body::from_stream(chunks)
}
