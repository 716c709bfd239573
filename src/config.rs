//! Client configuration.
//!
//! `ClientConfig` is passed to [`MpClient::new`](crate::MpClient::new) and replaces any
//! process-wide switches: the raw-response debug flag, the provider base URLs (overridable
//! for proxies and tests), token lifetime defaults and the HTTP timeout.
//!
//! Environment (read by [`ClientConfig::from_env`]):
//! - `WXMP_DEBUG`: `1`/`true` enables raw response logging
//! - `WXMP_API_BASE`, `WXMP_MP_BASE`, `WXMP_FILE_BASE`, `WXMP_PAY_BASE`: base URL overrides
//! - `WXMP_TIMEOUT_SECS`: HTTP request timeout in seconds

use std::env;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com";
pub const DEFAULT_MP_BASE: &str = "https://mp.weixin.qq.com";
pub const DEFAULT_FILE_BASE: &str = "http://file.api.weixin.qq.com";
pub const DEFAULT_PAY_BASE: &str = "https://api.mch.weixin.qq.com";

/// Token lifetime assumed when the provider omits `expires_in` (seconds)
pub const DEFAULT_EXPIRES_IN: u32 = 7200;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Log every raw response body (access_token redacted) at info level
    pub debug: bool,
    /// Base for `cgi-bin` JSON APIs
    pub api_base: String,
    /// Base for `showqrcode` ticket redemption
    pub mp_base: String,
    /// Base for media upload/download
    pub file_base: String,
    /// Base for merchant payment APIs
    pub pay_base: String,
    /// Lifetime used when the token response carries no `expires_in`
    pub default_expires_in: u32,
    /// Seconds subtracted from the provider lifetime when computing `expires_at`
    pub safety_margin_secs: u32,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            debug: false,
            api_base: DEFAULT_API_BASE.to_string(),
            mp_base: DEFAULT_MP_BASE.to_string(),
            file_base: DEFAULT_FILE_BASE.to_string(),
            pay_base: DEFAULT_PAY_BASE.to_string(),
            default_expires_in: DEFAULT_EXPIRES_IN,
            safety_margin_secs: 0,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Build from `WXMP_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("WXMP_DEBUG") {
            cfg.debug = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = env::var("WXMP_API_BASE") {
            cfg.api_base = v;
        }
        if let Ok(v) = env::var("WXMP_MP_BASE") {
            cfg.mp_base = v;
        }
        if let Ok(v) = env::var("WXMP_FILE_BASE") {
            cfg.file_base = v;
        }
        if let Ok(v) = env::var("WXMP_PAY_BASE") {
            cfg.pay_base = v;
        }
        if let Ok(v) = env::var("WXMP_TIMEOUT_SECS") {
            match v.trim().parse::<u64>() {
                Ok(secs) => cfg.timeout = Duration::from_secs(secs),
                Err(_) => warn!("ignoring WXMP_TIMEOUT_SECS={v:?}: not an integer"),
            }
        }
        cfg
    }

    /// Point every endpoint family at one base URL (mock servers, reverse proxies).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.api_base = base.clone();
        self.mp_base = base.clone();
        self.file_base = base.clone();
        self.pay_base = base;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_safety_margin(mut self, secs: u32) -> Self {
        self.safety_margin_secs = secs;
        self
    }

    pub fn with_default_expires_in(mut self, secs: u32) -> Self {
        self.default_expires_in = secs;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
