//! Parametric QR codes.
//!
//! Endpoints:
//! - POST https://api.weixin.qq.com/cgi-bin/qrcode/create?access_token=ACCESS_TOKEN
//!   body: {"expire_seconds": 604800, "action_name": "QR_SCENE", "action_info": {"scene": {"scene_id": 123}}}
//!   resp: {"ticket": "...", "expire_seconds": 60, "url": "http://weixin.qq.com/q/..."}
//! - GET  https://mp.weixin.qq.com/cgi-bin/showqrcode?ticket=TICKET  (image/jpg, no access_token)
//!
//! Limits:
//! - temporary (QR_SCENE): scene_id > 0, expire_seconds 1..=2592000 (30 days)
//! - permanent (QR_LIMIT_SCENE): scene_id 1..=100000, no expiry

use std::path::Path;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::envelope::provider_error;
use crate::errors;
use crate::token::{Error, MpClient, Result};

pub const MAX_TEMPORARY_EXPIRE_SECS: u32 = 2_592_000;
pub const MAX_PERMANENT_SCENE_ID: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketType {
    /// Temporary code with expiry
    #[serde(rename = "QR_SCENE")]
    Temporary,
    /// Permanent code, limited count per account
    #[serde(rename = "QR_LIMIT_SCENE")]
    Permanent,
}

impl TicketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::Temporary => "QR_SCENE",
            TicketType::Permanent => "QR_LIMIT_SCENE",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct QrTicket {
    pub ticket: String,
    /// Absent for permanent codes
    #[serde(default)]
    pub expire_seconds: Option<u32>,
    /// Decoded content of the QR image
    #[serde(default)]
    pub url: Option<String>,
}

fn validate(kind: TicketType, scene_id: u32, expire_seconds: u32) -> Result<()> {
    match kind {
        TicketType::Temporary => {
            if scene_id == 0 {
                return Err(Error::InvalidArgument("scene_id must be > 0".into()));
            }
            if expire_seconds == 0 || expire_seconds > MAX_TEMPORARY_EXPIRE_SECS {
                return Err(Error::InvalidArgument(format!(
                    "expire_seconds must be within 1..={MAX_TEMPORARY_EXPIRE_SECS}"
                )));
            }
        }
        TicketType::Permanent => {
            if scene_id == 0 || scene_id > MAX_PERMANENT_SCENE_ID {
                return Err(Error::InvalidArgument(format!(
                    "permanent scene_id must be within 1..={MAX_PERMANENT_SCENE_ID}"
                )));
            }
        }
    }
    Ok(())
}

fn ticket_body(kind: TicketType, scene_id: u32, expire_seconds: u32) -> serde_json::Value {
    let mut body = json!({
        "action_name": kind.as_str(),
        "action_info": { "scene": { "scene_id": scene_id } },
    });
    if kind == TicketType::Temporary {
        body["expire_seconds"] = json!(expire_seconds);
    }
    body
}

impl MpClient {
    /// Create a QR ticket. `expire_seconds` is ignored for permanent codes.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_qrcode_ticket(
        &self,
        kind: TicketType,
        scene_id: u32,
        expire_seconds: u32,
    ) -> Result<QrTicket> {
        validate(kind, scene_id, expire_seconds)?;
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/qrcode/create", Some(&token), &[])?;
        let body = ticket_body(kind, scene_id, expire_seconds);
        self.post_json("create_qrcode_ticket", url, &body)
            .await?
            .into_typed()
    }

    /// Redeem a ticket for the QR image bytes.
    #[instrument(level = "debug", skip(self, ticket))]
    pub async fn show_qrcode(&self, ticket: &str) -> Result<Bytes> {
        if ticket.is_empty() {
            return Err(Error::InvalidArgument("ticket is empty".into()));
        }
        let url = self.endpoint(&self.config.mp_base, "/cgi-bin/showqrcode", None, &[("ticket", ticket)])?;
        debug!(path = url.path(), "GET showqrcode");
        let resp = self.http.get(url).send().await?.error_for_status()?;
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        let bytes = resp.bytes().await?;

        if is_json {
            if let Ok(v) = serde_json::from_slice::<serde_json::Value>(&bytes) {
                if let Some((code, errmsg)) = provider_error(&v) {
                    return Err(Error::Provider {
                        code,
                        cause: errors::cause(code, &errmsg),
                    });
                }
            }
        }
        Ok(bytes)
    }

    /// Create a ticket, redeem it, and write the image to `path`.
    #[instrument(level = "debug", skip(self, path))]
    pub async fn create_qrcode(
        &self,
        kind: TicketType,
        scene_id: u32,
        expire_seconds: u32,
        path: impl AsRef<Path>,
    ) -> Result<QrTicket> {
        let ticket = self.create_qrcode_ticket(kind, scene_id, expire_seconds).await?;
        let image = self.show_qrcode(&ticket.ticket).await?;
        let path = path.as_ref();
        tokio::fs::write(path, &image)
            .await
            .map_err(|source| Error::Io {
                context: format!("writing QR image to {}", path.display()),
                source,
            })?;
        debug!(bytes = image.len(), "QR image written");
        Ok(ticket)
    }
}
