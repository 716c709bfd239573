//! Official Account token lifecycle.
//!
//! `MpClient` owns one session: the application identity (appid + appsecret) and the current
//! access_token with its absolute expiry. Every credentialed operation first passes through
//! [`MpClient::ensure_authorized`], which returns the cached token while it is valid and
//! transparently re-runs the token exchange once it has expired.
//!
//! Endpoint:
//! - GET https://api.weixin.qq.com/cgi-bin/token?grant_type=client_credential&appid=APPID&secret=APPSECRET
//!
//! Concurrency:
//! - The session sits behind an async mutex that is held across check-then-refresh, so callers
//!   racing on an expired token coalesce onto a single refresh request.
//! - Clones of `MpClient` share the session.
//!
//! Example:
//! ```ignore
//! use wxmp_rs::{ClientConfig, MpClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = MpClient::new(ClientConfig::default())?;
//!     let cred = client.login("wx_appid", "appsecret").await?;
//!     println!("expires_in: {}", cred.expires_in);
//!     let user = client.get_user_info("OPENID", None).await?;
//!     println!("{:?}", user.map(|u| u.nickname));
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;

/// Grant type for the server-side token flow
pub const CLIENT_CREDENTIAL: &str = "client_credential";

/// Unified error type
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied argument failed local validation; nothing was sent
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not authenticated: call login/init first")]
    NotAuthenticated,

    /// Token exchange rejected by the provider
    #[error("authentication failed {code}: {message}")]
    AuthenticationFailed { code: i64, message: String },

    /// Any other endpoint returned a non-zero errcode
    #[error("weixin error {code}: {cause}")]
    Provider { code: i64, cause: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected response (status {status}): {error}; body: {body}")]
    UnexpectedResponse {
        status: u16,
        error: String,
        body: String,
    },

    #[error("xml error: {0}")]
    Xml(String),
}

impl Error {
    /// Network, URL or file IO failure (as opposed to a provider or argument error)
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::InvalidUrl(_) | Error::Io { .. })
    }

    /// Provider errcode carried by this error, if any
    pub fn code(&self) -> Option<i64> {
        match self {
            Error::AuthenticationFailed { code, .. } | Error::Provider { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Application identity used only to obtain tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub appid: String,
    pub secret: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("appid", &self.appid)
            .field("secret", &"[redacted]")
            .finish()
    }
}

/// Bearer token with its absolute expiry (epoch seconds).
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    /// Lifetime reported by the provider (or the configured default)
    pub expires_in: u32,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Credential {
    fn issue(access_token: String, expires_in: u32, safety_margin_secs: u32) -> Self {
        let issued_at = epoch();
        let lifetime = expires_in.saturating_sub(safety_margin_secs);
        Self {
            access_token,
            expires_in,
            issued_at,
            expires_at: issued_at + i64::from(lifetime),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(epoch())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Seconds left before expiry, zero once expired
    pub fn remaining(&self) -> i64 {
        (self.expires_at - epoch()).max(0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &format_args!("[redacted; len={}]", self.access_token.len()))
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenOk {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u32>,
}

#[derive(Default)]
struct Session {
    identity: Option<Identity>,
    credential: Option<Credential>,
}

/// Client for the Official Account platform.
///
/// - Wraps `reqwest::Client` and a shared session
/// - One request per operation; nothing is retried
#[derive(Clone)]
pub struct MpClient {
    pub(crate) http: reqwest::Client,
    pub(crate) config: Arc<ClientConfig>,
    session: Arc<Mutex<Session>>,
}

impl fmt::Debug for MpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .gzip(true)
            .timeout(config.timeout)
            .build()?;
        Ok(Self::with_http(http, config))
    }

    /// Use a custom `reqwest::Client`
    pub fn with_http(http: reqwest::Client, config: ClientConfig) -> Self {
        Self {
            http,
            config: Arc::new(config),
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Appid of the current session, if logged in
    pub async fn appid(&self) -> Option<String> {
        self.session.lock().await.identity.as_ref().map(|i| i.appid.clone())
    }

    /// Snapshot of the current credential, if any
    pub async fn credential(&self) -> Option<Credential> {
        self.session.lock().await.credential.clone()
    }

    /// Seed the session with a previously issued token; no network call.
    ///
    /// `expires_in` is the remaining lifetime of that token in seconds.
    pub async fn init(
        &self,
        access_token: &str,
        appid: &str,
        secret: &str,
        expires_in: u32,
    ) -> Result<()> {
        if access_token.is_empty() {
            return Err(Error::InvalidArgument("access_token is empty".into()));
        }
        let mut session = self.session.lock().await;
        session.identity = Some(Identity {
            appid: appid.to_string(),
            secret: secret.to_string(),
        });
        session.credential = Some(Credential::issue(
            access_token.to_string(),
            expires_in,
            self.config.safety_margin_secs,
        ));
        Ok(())
    }

    /// Token exchange with the `client_credential` grant.
    pub async fn login(&self, appid: &str, secret: &str) -> Result<Credential> {
        self.authenticate(appid, secret, CLIENT_CREDENTIAL).await
    }

    /// Obtain an access_token, reusing the current one when it is still valid and was
    /// issued for the same appid/secret.
    #[instrument(level = "debug", skip(self, secret))]
    pub async fn authenticate(
        &self,
        appid: &str,
        secret: &str,
        grant_type: &str,
    ) -> Result<Credential> {
        if appid.is_empty() || secret.is_empty() || grant_type.is_empty() {
            return Err(Error::InvalidArgument(
                "appid, secret and grant_type must not be empty".into(),
            ));
        }
        let identity = Identity {
            appid: appid.to_string(),
            secret: secret.to_string(),
        };

        let mut session = self.session.lock().await;
        if let (Some(current), Some(cred)) = (&session.identity, &session.credential) {
            if *current == identity && !cred.is_expired() {
                debug!(remaining = cred.remaining(), "reusing unexpired access_token");
                return Ok(cred.clone());
            }
        }

        let cred = self.exchange(&identity, grant_type).await?;
        session.identity = Some(identity);
        session.credential = Some(cred.clone());
        Ok(cred)
    }

    /// Authorization gate: returns a valid access_token, refreshing it at most once.
    #[instrument(level = "debug", skip(self))]
    pub async fn ensure_authorized(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        let Some(cred) = &session.credential else {
            return Err(Error::NotAuthenticated);
        };
        if !cred.is_expired() {
            return Ok(cred.access_token.clone());
        }
        let Some(identity) = session.identity.clone() else {
            return Err(Error::NotAuthenticated);
        };

        debug!("access_token expired; re-authenticating");
        let fresh = self.exchange(&identity, CLIENT_CREDENTIAL).await?;
        let token = fresh.access_token.clone();
        session.credential = Some(fresh);
        Ok(token)
    }

    async fn exchange(&self, identity: &Identity, grant_type: &str) -> Result<Credential> {
        let url = self.endpoint(
            &self.config.api_base,
            "/cgi-bin/token",
            None,
            &[
                ("grant_type", grant_type),
                ("appid", &identity.appid),
                ("secret", &identity.secret),
            ],
        )?;

        if identity.appid.starts_with("ww") {
            warn!(
                "appid starts with 'ww' (looks like a WeCom corpid); Official Account APIs expect an appid starting with 'wx'"
            );
        }
        debug!(appid = %redact_id(&identity.appid), "requesting access_token");

        let reply = match self.get("login", url).await {
            Ok(reply) => reply,
            Err(Error::Provider { code, cause }) => {
                return Err(Error::AuthenticationFailed {
                    code,
                    message: cause,
                });
            }
            Err(e) => return Err(e),
        };
        let status = reply.status;
        let ok: TokenOk = reply.into_typed()?;
        let Some(access_token) = ok.access_token.filter(|t| !t.is_empty()) else {
            return Err(Error::UnexpectedResponse {
                status,
                error: "missing access_token".into(),
                body: String::new(),
            });
        };
        let expires_in = ok.expires_in.unwrap_or(self.config.default_expires_in);
        Ok(Credential::issue(
            access_token,
            expires_in,
            self.config.safety_margin_secs,
        ))
    }
}

/// Current epoch seconds
pub(crate) fn epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Keep first 2 and last 2 chars of an id for logs
pub(crate) fn redact_id(id: &str) -> String {
    if id.len() <= 4 || !id.is_ascii() {
        format!("{}***", id.chars().take(2).collect::<String>())
    } else {
        format!("{}***{}", &id[..2], &id[id.len() - 2..])
    }
}
