//! Client configuration.
//!
//! Everything the client needs is carried in an explicit [`ClientOptions`]
//! value. Nothing is read from process-wide state unless the caller asks for
//! it with [`ClientOptions::from_env`].

use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;
use crate::settings::Settings;

/// Server address used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Environment variable holding the server address.
pub const ENV_BASE_URL: &str = "ACCOUNT_HUB_URL";

/// Environment variable holding the passkey.
pub const ENV_PASSKEY: &str = "ACCOUNT_HUB_PASSKEY";

/// Environment variable holding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "ACCOUNT_HUB_TIMEOUT_SECS";

/// A secret string type for the passkey.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Connection settings for [`HubClient`](crate::client::HubClient).
///
/// # Example
/// ```rust
/// use account_hub::options::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::new("http://hub.internal:8080")
///     .with_passkey("s3cret")
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(options.api_url("/stats"), "http://hub.internal:8080/api/stats");
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Server address without the `/api` suffix
    pub base_url: String,

    /// Value sent in the `X-Passkey` header; no header when `None`
    pub passkey: Option<SecretString>,

    /// Request timeout; also bounds how long a delete stream may run
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientOptions {
    /// Create options pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            passkey: None,
            timeout: None,
            proxy: None,
            extra_headers: None,
        }
    }

    /// Read options from `ACCOUNT_HUB_URL`, `ACCOUNT_HUB_PASSKEY` and
    /// `ACCOUNT_HUB_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut options = Self::new(base_url);

        if let Some(passkey) = lookup(ENV_PASSKEY).filter(|key| !key.is_empty()) {
            options.passkey = Some(SecretString::new(passkey));
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ClientError::Config(format!("{} must be a whole number of seconds, got {:?}", ENV_TIMEOUT_SECS, raw))
            })?;
            options.timeout = Some(Duration::from_secs(secs));
        }

        Ok(options)
    }

    /// Build options from persisted settings.
    pub fn from_settings(base_url: impl Into<String>, settings: &Settings) -> Self {
        Self {
            passkey: settings.passkey(),
            ..Self::new(base_url)
        }
    }

    /// Set the passkey.
    pub fn with_passkey(mut self, passkey: impl Into<SecretString>) -> Self {
        self.passkey = Some(passkey.into());
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Full URL of an API path such as `/accounts`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url.trim_end_matches('/'), path)
    }
}
