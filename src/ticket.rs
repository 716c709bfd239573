//! JS-SDK ticket and page signature.
//!
//! Endpoint:
//! - GET https://api.weixin.qq.com/cgi-bin/ticket/getticket?access_token=ACCESS_TOKEN&type=jsapi
//!   resp: {"errcode":0,"errmsg":"ok","ticket":"bxLdikRXVbTPdHSM05e5u5sUoXNKd8-41ZO3MhKoyN5OfkWITDGgnr2fwJ0m9E8NYzWKVZvdVtaUgWvsdshFKA","expires_in":7200}
//!
//! Signature: SHA-1 over `jsapi_ticket=T&noncestr=N&timestamp=TS&url=URL` (keys in ASCII order,
//! `url` without the `#fragment`), lowercase hex.

use sha1::{Digest, Sha1};
use tracing::instrument;

use crate::token::{MpClient, Result, epoch};

/// Signed parameters for `wx.config` on a web page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsSdkSignature {
    pub appid: String,
    pub noncestr: String,
    pub timestamp: i64,
    pub url: String,
    pub signature: String,
}

/// SHA-1 signature for a page URL.
pub fn jsapi_signature(ticket: &str, noncestr: &str, timestamp: i64, url: &str) -> String {
    let url = url.split('#').next().unwrap_or(url);
    let plain = format!("jsapi_ticket={ticket}&noncestr={noncestr}&timestamp={timestamp}&url={url}");
    let digest = Sha1::digest(plain.as_bytes());
    let mut s = String::with_capacity(digest.len() * 2);
    for b in digest {
        use core::fmt::Write;
        let _ = write!(&mut s, "{:02x}", b);
    }
    s
}

impl MpClient {
    /// Fetch the jsapi_ticket; `None` if the response carries no ticket.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_jsapi_ticket(&self) -> Result<Option<String>> {
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(
            &self.config.api_base,
            "/cgi-bin/ticket/getticket",
            Some(&token),
            &[("type", "jsapi")],
        )?;
        let reply = self.get("get_jsapi_ticket", url).await?;
        Ok(reply.str_field("ticket").filter(|t| !t.is_empty()))
    }

    /// Fetch a ticket and sign `url` for `wx.config`. Returns `None` when no ticket was issued.
    pub async fn sign_jsapi_url(&self, url: &str, noncestr: &str) -> Result<Option<JsSdkSignature>> {
        let Some(ticket) = self.get_jsapi_ticket().await? else {
            return Ok(None);
        };
        let appid = self.appid().await.unwrap_or_default();
        let timestamp = epoch();
        Ok(Some(JsSdkSignature {
            appid,
            noncestr: noncestr.to_string(),
            timestamp,
            url: url.to_string(),
            signature: jsapi_signature(&ticket, noncestr, timestamp, url),
        }))
    }
}
