//! Shared request/response handling for JSON endpoints.
//!
//! Every provider response is either `{ "errcode": N, "errmsg": "..." }` on failure or an
//! endpoint-specific payload on success (sometimes also carrying `errcode: 0`). `errcode` may
//! arrive as a number or as a numeric string.

use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::errors;
use crate::token::{Error, MpClient, Result};

const MAX_BODY_IN_ERROR: usize = 2048;

/// Decoded JSON body with its HTTP status
pub(crate) struct Reply {
    pub status: u16,
    pub value: Value,
}

impl Reply {
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value::<T>(self.value.clone()).map_err(|e| Error::UnexpectedResponse {
            status: self.status,
            error: e.to_string(),
            body: redact_body(&self.value.to_string()),
        })
    }

    /// String field of a success payload, `None` when absent or not a string
    pub fn str_field(&self, name: &str) -> Option<String> {
        match self.value.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Provider error carried by a JSON body: `errcode` present and non-zero.
pub(crate) fn provider_error(value: &Value) -> Option<(i64, String)> {
    let code = match value.get("errcode")? {
        Value::Number(n) => n.as_i64().unwrap_or(-1),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(-1),
        Value::Null => return None,
        _ => -1,
    };
    if code == 0 {
        return None;
    }
    let errmsg = value
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some((code, errmsg))
}

/// Replace `access_token` / `ticket` values and truncate for safe logging.
pub(crate) fn redact_body(body: &str) -> String {
    let mut out = body.to_string();
    if let Ok(mut v) = serde_json::from_str::<Value>(body) {
        if let Some(obj) = v.as_object_mut() {
            for key in ["access_token", "ticket"] {
                if obj.contains_key(key) {
                    obj.insert(key.to_string(), Value::String("[redacted]".into()));
                }
            }
        }
        if let Ok(s) = serde_json::to_string(&v) {
            out = s;
        }
    }
    if out.len() > MAX_BODY_IN_ERROR {
        let mut cut = MAX_BODY_IN_ERROR;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
        out.push_str("...");
    }
    out
}

impl MpClient {
    /// Build `{base}{path}?access_token=..&k=v..`
    pub(crate) fn endpoint(
        &self,
        base: &str,
        path: &str,
        access_token: Option<&str>,
        params: &[(&str, &str)],
    ) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        {
            let mut qp = url.query_pairs_mut();
            if let Some(token) = access_token {
                qp.append_pair("access_token", token);
            }
            for (k, v) in params {
                qp.append_pair(k, v);
            }
        }
        Ok(url)
    }

    pub(crate) async fn get(&self, op: &'static str, url: Url) -> Result<Reply> {
        debug!(op, path = url.path(), "GET");
        let resp = self.http.get(url).send().await?;
        self.read_json(op, resp).await
    }

    pub(crate) async fn post_json<B: Serialize + ?Sized>(
        &self,
        op: &'static str,
        url: Url,
        body: &B,
    ) -> Result<Reply> {
        debug!(op, path = url.path(), "POST");
        // Provider rejects \uXXXX escapes (40033); serde_json keeps non-ASCII as UTF-8.
        let body = serde_json::to_vec(body).map_err(|e| Error::InvalidArgument(e.to_string()))?;
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body)
            .send()
            .await?;
        self.read_json(op, resp).await
    }

    /// POST without a body (e.g. groups/get)
    pub(crate) async fn post_empty(&self, op: &'static str, url: Url) -> Result<Reply> {
        debug!(op, path = url.path(), "POST");
        let resp = self.http.post(url).send().await?;
        self.read_json(op, resp).await
    }

    pub(crate) async fn read_json(&self, op: &'static str, resp: reqwest::Response) -> Result<Reply> {
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        self.decode(op, status, &bytes)
    }

    pub(crate) fn decode(&self, op: &'static str, status: u16, bytes: &[u8]) -> Result<Reply> {
        let text = String::from_utf8_lossy(bytes);
        self.log_raw(op, &text);

        let value: Value = serde_json::from_slice(bytes).map_err(|e| Error::UnexpectedResponse {
            status,
            error: e.to_string(),
            body: redact_body(&text),
        })?;
        if let Some((code, errmsg)) = provider_error(&value) {
            debug!(op, code, %errmsg, "provider error");
            return Err(Error::Provider {
                code,
                cause: errors::cause(code, &errmsg),
            });
        }
        Ok(Reply { status, value })
    }

    pub(crate) fn log_raw(&self, op: &'static str, body: &str) {
        if self.config.debug {
            info!(target: "wxmp_rs::raw", op, body = %redact_body(body), "raw response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn errcode_forms() {
        assert_eq!(provider_error(&json!({"errcode": 0, "errmsg": "ok"})), None);
        assert_eq!(provider_error(&json!({"errcode": "0"})), None);
        assert_eq!(provider_error(&json!({"groups": []})), None);
        assert_eq!(
            provider_error(&json!({"errcode": 40013, "errmsg": "invalid appid"})),
            Some((40013, "invalid appid".to_string()))
        );
        assert_eq!(
            provider_error(&json!({"errcode": "45009"})),
            Some((45009, String::new()))
        );
    }

    #[test]
    fn redact_hides_token_and_truncates() {
        let s = redact_body(r#"{"access_token":"SECRET","expires_in":7200}"#);
        assert!(!s.contains("SECRET"));
        assert!(s.contains("7200"));

        let long = "x".repeat(5000);
        let s = redact_body(&long);
        assert_eq!(s.len(), MAX_BODY_IN_ERROR + 3);
    }
}
