//! Client configuration — backend base addresses and HTTP timeouts.
//!
//! The HTTP base comes from `PERSPECTIVE_HTTP_BASE`; the stream base
//! from `PERSPECTIVE_WS_BASE`, or is derived from the HTTP base by
//! swapping the protocol (`http` → `ws`, `https` → `wss`) with the
//! host preserved.

use std::time::Duration;

use reqwest::Url;

/// Env var for the backend HTTP base address.
pub const HTTP_BASE_ENV: &str = "PERSPECTIVE_HTTP_BASE";
/// Env var for the backend stream base address.
pub const WS_BASE_ENV: &str = "PERSPECTIVE_WS_BASE";

const DEFAULT_HTTP_BASE: &str = "http://127.0.0.1:8080";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var} URL {value:?}: {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} must use {expected}, got {scheme:?}")]
    UnsupportedScheme {
        var: &'static str,
        expected: &'static str,
        scheme: String,
    },

    #[error("{var} URL {value:?} has no host")]
    MissingHost { var: &'static str, value: String },
}

/// Resolved backend addresses.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP base, no trailing slash.
    pub http_base: String,
    /// Stream base, no trailing slash.
    pub ws_base: String,
    /// Connect timeout for the HTTP client.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Resolve from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let http = std::env::var(HTTP_BASE_ENV).ok();
        let ws = std::env::var(WS_BASE_ENV).ok();
        Self::from_parts(http.as_deref(), ws.as_deref())
    }

    /// Resolve from explicit values; `None` means "use the default".
    pub fn from_parts(http: Option<&str>, ws: Option<&str>) -> Result<Self, ConfigError> {
        let http_raw = http.unwrap_or(DEFAULT_HTTP_BASE);
        let http_url = parse_base(HTTP_BASE_ENV, http_raw, "http or https", &["http", "https"])?;

        let ws_base = match ws {
            Some(raw) => {
                parse_base(WS_BASE_ENV, raw, "ws or wss", &["ws", "wss"])?;
                raw.trim_end_matches('/').to_string()
            }
            None => derive_ws_base(&http_url)?,
        };

        Ok(Self {
            http_base: http_raw.trim_end_matches('/').to_string(),
            ws_base,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn init_url(&self) -> String {
        format!("{}/api/chat/init", self.http_base)
    }

    pub fn clarify_url(&self) -> String {
        format!("{}/api/chat/clarify", self.http_base)
    }

    pub fn history_url(&self, session_id: &str) -> String {
        format!("{}/api/chat/{}", self.http_base, session_id)
    }

    pub fn stream_url(&self, session_id: &str) -> String {
        format!("{}/api/ws/{}", self.ws_base, session_id)
    }
}

fn parse_base(
    var: &'static str,
    raw: &str,
    expected: &'static str,
    schemes: &[&str],
) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::UnsupportedScheme {
            var,
            expected,
            scheme: url.scheme().to_string(),
        });
    }
    Ok(url)
}

/// Swap the HTTP base's protocol to its streaming equivalent, keeping
/// host and port.
fn derive_ws_base(http_url: &Url) -> Result<String, ConfigError> {
    let scheme = if http_url.scheme() == "https" {
        "wss"
    } else {
        "ws"
    };
    let host = http_url.host_str().ok_or_else(|| ConfigError::MissingHost {
        var: HTTP_BASE_ENV,
        value: http_url.to_string(),
    })?;
    Ok(match http_url.port() {
        Some(port) => format!("{}://{}:{}", scheme, host, port),
        None => format!("{}://{}", scheme, host),
    })
}
