use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::config::ApiKey;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
}

impl Identity {
    pub fn api_client() -> Self {
        Self {
            name: "api-key".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    Anonymous,
}

impl Credentials {
    /// Credentials presented by a request. An empty header counts as none.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
            Some(key) if !key.is_empty() => Self::ApiKey(key.to_string()),
            _ => Self::Anonymous,
        }
    }
}

pub trait AuthProvider: Send + Sync {
    /// `None` means the request must be rejected.
    fn authenticate(&self, credentials: &Credentials) -> Option<Identity>;
}

/// Accepts exactly one shared secret, handed over at construction.
pub struct ApiKeyAuth {
    expected: ApiKey,
}

impl ApiKeyAuth {
    pub fn new(expected: ApiKey) -> Self {
        Self { expected }
    }
}

impl AuthProvider for ApiKeyAuth {
    fn authenticate(&self, credentials: &Credentials) -> Option<Identity> {
        let expected = self.expected.expose();
        match credentials {
            Credentials::ApiKey(presented)
                if !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) =>
            {
                Some(Identity::api_client())
            }
            _ => None,
        }
    }
}
