//! Temporary media: upload, news (article set) upload and download.
//!
//! Endpoints:
//! - POST http://file.api.weixin.qq.com/cgi-bin/media/upload?access_token=ACCESS_TOKEN&type=TYPE
//!   multipart form field "media"; resp: {"type":"image","media_id":"MEDIA_ID","created_at":123456789}
//!   (thumb uploads answer with "thumb_media_id" instead of "media_id")
//! - POST https://api.weixin.qq.com/cgi-bin/media/uploadnews?access_token=ACCESS_TOKEN
//!   body: {"articles":[{...}]}; resp: {"type":"news","media_id":"...","created_at":...}
//! - GET  http://file.api.weixin.qq.com/cgi-bin/media/get?access_token=ACCESS_TOKEN&media_id=MEDIA_ID
//!   binary body with Content-Disposition on success, JSON {errcode, errmsg} on failure
//!
//! Notes
//! - media_id of temporary media is valid for 3 days
//! - Size limits (at time of writing): image 2MB (jpg/png), voice 2MB (amr/mp3, <=60s),
//!   video 10MB (mp4), thumb 64KB (jpg)

use std::path::Path;

use bytes::Bytes;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::envelope::{provider_error, redact_body};
use crate::errors;
use crate::message::MAX_NEWS_ARTICLES;
use crate::token::{Error, MpClient, Result};

/// Media type for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Voice,
    Video,
    Thumb,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Voice => "voice",
            MediaType::Video => "video",
            MediaType::Thumb => "thumb",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct MediaUpload {
    #[serde(rename = "type", default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub thumb_media_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl MediaUpload {
    /// `media_id`, or `thumb_media_id` for thumb uploads
    pub fn id(&self) -> Option<&str> {
        self.media_id
            .as_deref()
            .or(self.thumb_media_id.as_deref())
    }
}

/// Article for `media/uploadnews`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Article {
    /// Cover image, uploaded as `thumb`
    pub thumb_media_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub title: String,
    /// "Read more" link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_source_url: Option<String>,
    /// HTML body
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// 1 shows the cover inside the article body
    #[serde(default)]
    pub show_cover_pic: u8,
}

/// Downloaded media
#[derive(Debug, Clone)]
pub struct Attachment {
    /// File name suggested by Content-Disposition
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub bytes: Bytes,
}

impl Attachment {
    /// Extension of `file_name`, lowercase, without the dot
    pub fn suffix(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }
}

impl MpClient {
    /// Upload temporary media from memory.
    #[instrument(level = "debug", skip(self, data))]
    pub async fn upload_media(
        &self,
        media_type: MediaType,
        filename: &str,
        data: impl Into<Bytes>,
    ) -> Result<MediaUpload> {
        let data: Bytes = data.into();
        if filename.is_empty() {
            return Err(Error::InvalidArgument("filename is empty".into()));
        }
        if data.is_empty() {
            return Err(Error::InvalidArgument("media data is empty".into()));
        }
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(
            &self.config.file_base,
            "/cgi-bin/media/upload",
            Some(&token),
            &[("type", media_type.as_str())],
        )?;

        let len = data.len();
        let part = Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_str(guess_mime_from_filename(filename))?;
        let form = Form::new().part("media", part);
        debug!(path = url.path(), len, "POST media upload");

        let resp = self.http.post(url).multipart(form).send().await?;
        self.read_json("upload_media", resp).await?.into_typed()
    }

    /// Read a file and upload it; the file name is taken from the path.
    pub async fn upload_media_file(
        &self,
        media_type: MediaType,
        path: impl AsRef<Path>,
    ) -> Result<MediaUpload> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidArgument(format!("no file name in {}", path.display())))?
            .to_string();
        let data = tokio::fs::read(path).await.map_err(|source| Error::Io {
            context: format!("reading media file {}", path.display()),
            source,
        })?;
        self.upload_media(media_type, &filename, data).await
    }

    /// Upload an article set for mass sending; returns its media_id.
    #[instrument(level = "debug", skip(self, articles), fields(count = articles.len()))]
    pub async fn upload_news(&self, articles: &[Article]) -> Result<MediaUpload> {
        if articles.is_empty() || articles.len() > MAX_NEWS_ARTICLES {
            return Err(Error::InvalidArgument(format!(
                "news requires 1..={MAX_NEWS_ARTICLES} articles, got {}",
                articles.len()
            )));
        }
        if let Some(a) = articles
            .iter()
            .find(|a| a.title.is_empty() || a.content.is_empty() || a.thumb_media_id.is_empty())
        {
            return Err(Error::InvalidArgument(format!(
                "article '{}' needs title, content and thumb_media_id",
                a.title
            )));
        }
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/media/uploadnews", Some(&token), &[])?;
        self.post_json("upload_news", url, &json!({ "articles": articles }))
            .await?
            .into_typed()
    }

    /// Download temporary media.
    #[instrument(level = "debug", skip(self))]
    pub async fn download_media(&self, media_id: &str) -> Result<Attachment> {
        if media_id.is_empty() {
            return Err(Error::InvalidArgument("media_id is empty".into()));
        }
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(
            &self.config.file_base,
            "/cgi-bin/media/get",
            Some(&token),
            &[("media_id", media_id)],
        )?;
        debug!(path = url.path(), "GET media");

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await?;

        let content_type = header_string(&headers, CONTENT_TYPE.as_str());
        let is_json = content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("json") || ct.starts_with("text/plain"))
            .unwrap_or(false)
            || starts_like_json(&bytes);

        if is_json {
            self.log_raw("download_media", &String::from_utf8_lossy(&bytes));
            if let Ok(v) = serde_json::from_slice::<serde_json::Value>(&bytes) {
                if let Some((code, errmsg)) = provider_error(&v) {
                    return Err(Error::Provider {
                        code,
                        cause: errors::cause(code, &errmsg),
                    });
                }
            }
        }
        if !status.is_success() {
            return Err(Error::UnexpectedResponse {
                status: status.as_u16(),
                error: "media download failed".into(),
                body: redact_body(&String::from_utf8_lossy(&bytes)),
            });
        }

        Ok(Attachment {
            file_name: header_string(&headers, CONTENT_DISPOSITION.as_str())
                .and_then(|cd| disposition_filename(&cd)),
            content_type,
            content_length: header_string(&headers, CONTENT_LENGTH.as_str())
                .and_then(|s| s.parse::<u64>().ok()),
            bytes,
        })
    }
}

/* -------------------- helpers -------------------- */

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn starts_like_json(b: &[u8]) -> bool {
    let s = std::str::from_utf8(b).unwrap_or("");
    s.trim_start().starts_with('{')
}

/// `attachment; filename="MEDIA_ID.jpg"` -> `MEDIA_ID.jpg`
fn disposition_filename(cd: &str) -> Option<String> {
    cd.split(';')
        .map(str::trim)
        .find_map(|p| p.strip_prefix("filename="))
        .map(|v| v.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

fn guess_mime_from_filename(name: &str) -> &'static str {
    let lower = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match lower.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "amr" => "audio/amr",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_parsing() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="abc.jpg""#).as_deref(),
            Some("abc.jpg")
        );
        assert_eq!(disposition_filename("attachment").as_deref(), None);
    }

    #[test]
    fn upload_id_falls_back_to_thumb() {
        let u: MediaUpload =
            serde_json::from_str(r#"{"type":"thumb","thumb_media_id":"T1","created_at":1}"#)
                .unwrap();
        assert_eq!(u.id(), Some("T1"));
    }

    #[test]
    fn attachment_suffix() {
        let a = Attachment {
            file_name: Some("X.JPG".into()),
            content_type: None,
            content_length: None,
            bytes: Bytes::new(),
        };
        assert_eq!(a.suffix().as_deref(), Some("jpg"));
    }

    #[test]
    fn mime_guess() {
        assert_eq!(guess_mime_from_filename("a.PNG"), "image/png");
        assert_eq!(guess_mime_from_filename("noext"), "application/octet-stream");
    }
}
