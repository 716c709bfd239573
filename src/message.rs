//! Mass messages and customer-service (custom) messages.
//!
//! Endpoints:
//! - POST https://api.weixin.qq.com/cgi-bin/message/mass/send?access_token=ACCESS_TOKEN
//!   body: {"touser": ["OPENID1", "OPENID2"], "msgtype": "text", "text": {"content": "hello"}}
//!   resp: {"errcode": 0, "errmsg": "send job submission success", "msg_id": 34182}
//! - POST https://api.weixin.qq.com/cgi-bin/message/custom/send?access_token=ACCESS_TOKEN
//!   body: {"touser": "OPENID", "msgtype": "news", "news": {"articles": [...]}}
//!
//! Custom messages can only reach users who interacted with the account in the last 48 hours
//! (errcode 45015 otherwise). Mass sends are queued; `msg_id` identifies the job.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::token::{Error, MpClient, Result};

pub const MAX_MASS_RECIPIENTS: usize = 10_000;
pub const MAX_NEWS_ARTICLES: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct TextContent {
    pub content: String,
}

/// Reference to uploaded media (image/voice/mpnews)
#[derive(Debug, Clone, Serialize)]
pub struct MediaRef {
    pub media_id: String,
}

/// News (link card) article for custom messages
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsArticle {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Jump target when the card is tapped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Cover picture URL (JPG/PNG; 360x200 large, 200x200 small)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picurl: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsContent {
    pub articles: Vec<NewsArticle>,
}

/// Mass send payloads, tagged by "msgtype"
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "msgtype")]
pub enum MassPayload {
    #[serde(rename = "text")]
    Text { text: TextContent },

    /// Article set uploaded via `media/uploadnews`
    #[serde(rename = "mpnews")]
    MpNews { mpnews: MediaRef },

    #[serde(rename = "image")]
    Image { image: MediaRef },

    #[serde(rename = "voice")]
    Voice { voice: MediaRef },
}

#[derive(Debug, Clone, Serialize)]
struct MassSendRequest<'a> {
    touser: &'a [String],
    #[serde(flatten)]
    payload: &'a MassPayload,
}

/// Custom message payloads, tagged by "msgtype"
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "msgtype")]
pub enum CustomPayload {
    #[serde(rename = "text")]
    Text { text: TextContent },

    #[serde(rename = "image")]
    Image { image: MediaRef },

    #[serde(rename = "voice")]
    Voice { voice: MediaRef },

    #[serde(rename = "news")]
    News { news: NewsContent },
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomMessage {
    pub touser: String,
    #[serde(flatten)]
    pub payload: CustomPayload,
}

/// Queued mass send job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MassSendResult {
    pub msg_id: Option<String>,
    /// Present for article (mpnews) sends
    pub msg_data_id: Option<String>,
}

fn non_empty(field: &str, v: &str) -> Result<()> {
    if v.is_empty() {
        return Err(Error::InvalidArgument(format!("{field} is empty")));
    }
    Ok(())
}

fn check_articles(articles: &[NewsArticle]) -> Result<()> {
    if articles.is_empty() || articles.len() > MAX_NEWS_ARTICLES {
        return Err(Error::InvalidArgument(format!(
            "news requires 1..={MAX_NEWS_ARTICLES} articles, got {}",
            articles.len()
        )));
    }
    if articles.iter().any(|a| a.title.is_empty()) {
        return Err(Error::InvalidArgument("article title is empty".into()));
    }
    Ok(())
}

impl MassPayload {
    fn validate(&self) -> Result<()> {
        match self {
            MassPayload::Text { text } => non_empty("content", &text.content),
            MassPayload::MpNews { mpnews: m }
            | MassPayload::Image { image: m }
            | MassPayload::Voice { voice: m } => non_empty("media_id", &m.media_id),
        }
    }
}

impl CustomPayload {
    fn validate(&self) -> Result<()> {
        match self {
            CustomPayload::Text { text } => non_empty("content", &text.content),
            CustomPayload::Image { image: m } | CustomPayload::Voice { voice: m } => {
                non_empty("media_id", &m.media_id)
            }
            CustomPayload::News { news } => check_articles(&news.articles),
        }
    }
}

impl MpClient {
    /// Mass send to an explicit openid list.
    #[instrument(level = "debug", skip(self, openids, payload), fields(recipients = openids.len()))]
    pub async fn mass_send(&self, openids: &[String], payload: &MassPayload) -> Result<MassSendResult> {
        if openids.is_empty() || openids.len() > MAX_MASS_RECIPIENTS {
            return Err(Error::InvalidArgument(format!(
                "mass send requires 1..={MAX_MASS_RECIPIENTS} openids, got {}",
                openids.len()
            )));
        }
        if openids.iter().any(String::is_empty) {
            return Err(Error::InvalidArgument("openid list contains an empty id".into()));
        }
        payload.validate()?;

        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/message/mass/send", Some(&token), &[])?;
        let req = MassSendRequest {
            touser: openids,
            payload,
        };
        let reply = self.post_json("mass_send", url, &req).await?;
        Ok(MassSendResult {
            msg_id: reply.str_field("msg_id"),
            msg_data_id: reply.str_field("msg_data_id"),
        })
    }

    pub async fn mass_send_text(&self, openids: &[String], content: &str) -> Result<MassSendResult> {
        let payload = MassPayload::Text {
            text: TextContent {
                content: content.to_string(),
            },
        };
        self.mass_send(openids, &payload).await
    }

    /// Mass send an article set previously uploaded with `upload_news`.
    pub async fn mass_send_news(&self, openids: &[String], media_id: &str) -> Result<MassSendResult> {
        let payload = MassPayload::MpNews {
            mpnews: MediaRef {
                media_id: media_id.to_string(),
            },
        };
        self.mass_send(openids, &payload).await
    }

    #[instrument(level = "debug", skip(self, msg))]
    pub async fn custom_send(&self, msg: &CustomMessage) -> Result<()> {
        non_empty("touser", &msg.touser)?;
        msg.payload.validate()?;
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/message/custom/send", Some(&token), &[])?;
        self.post_json("custom_send", url, msg).await?;
        Ok(())
    }

    pub async fn custom_send_text(&self, openid: &str, content: &str) -> Result<()> {
        self.custom_send(&CustomMessage {
            touser: openid.to_string(),
            payload: CustomPayload::Text {
                text: TextContent {
                    content: content.to_string(),
                },
            },
        })
        .await
    }

    pub async fn custom_send_news(&self, openid: &str, articles: Vec<NewsArticle>) -> Result<()> {
        self.custom_send(&CustomMessage {
            touser: openid.to_string(),
            payload: CustomPayload::News {
                news: NewsContent { articles },
            },
        })
        .await
    }
}
