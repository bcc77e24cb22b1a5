use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Environment variables consulted once, at load time.
pub const ENV_BIND: &str = "NANOCLOUD_BIND";
pub const ENV_ROOT: &str = "NANOCLOUD_ROOT";
pub const ENV_API_KEY: &str = "NANOCLOUD_API_KEY";
pub const ENV_MAX_BODY: &str = "NANOCLOUD_MAX_BODY";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub storage_root: PathBuf,
    /// Shared secret expected in the `X-API-Key` header.
    pub api_key: Option<ApiKey>,
    /// Upper bound for an upload request body, in bytes.
    pub max_request_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            storage_root: PathBuf::from("data"),
            api_key: None,
            max_request_body_size: 32 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Defaults, overlaid by `path` when given, overlaid by the process
    /// environment.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    ServerError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `NANOCLOUD_*` overrides obtained through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ServerResult<()> {
        if let Some(bind) = lookup(ENV_BIND) {
            self.bind_addr = bind
                .parse()
                .map_err(|e| ServerError::Config(format!("{ENV_BIND}: {e}")))?;
        }
        if let Some(root) = lookup(ENV_ROOT) {
            self.storage_root = PathBuf::from(root);
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api_key = Some(ApiKey::new(key));
        }
        if let Some(max) = lookup(ENV_MAX_BODY) {
            self.max_request_body_size = max
                .parse()
                .map_err(|e| ServerError::Config(format!("{ENV_MAX_BODY}: {e}")))?;
        }
        Ok(())
    }

    /// A server without a usable secret would refuse every protected request.
    pub fn validate(&self) -> ServerResult<()> {
        match &self.api_key {
            Some(key) if !key.expose().is_empty() => {}
            _ => {
                return Err(ServerError::Config(format!(
                    "api_key must be set (config file or {ENV_API_KEY})"
                )))
            }
        }
        if self.max_request_body_size == 0 {
            return Err(ServerError::Config(
                "max_request_body_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Shared-secret API key. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
