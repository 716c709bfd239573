//! User management: basic user info and follower listing.
//!
//! Endpoints:
//! - GET https://api.weixin.qq.com/cgi-bin/user/info?access_token=ACCESS_TOKEN&openid=OPENID&lang=zh_CN
//! - GET https://api.weixin.qq.com/cgi-bin/user/get?access_token=ACCESS_TOKEN&next_openid=NEXT_OPENID
//!
//! `user/get` returns at most 10000 openids per page. `next_openid` is the cursor for the next
//! page; an empty cursor means the listing is complete.
//!
//! Response example (user/get):
//! {
//!   "total": 2,
//!   "count": 2,
//!   "data": { "openid": ["OPENID1", "OPENID2"] },
//!   "next_openid": "NEXT_OPENID"
//! }

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::token::{Error, MpClient, Result};

/// Language for localized user fields (country/province/city)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lang {
    #[default]
    ZhCn,
    ZhTw,
    En,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::ZhCn => "zh_CN",
            Lang::ZhTw => "zh_TW",
            Lang::En => "en",
        }
    }
}

/// Subscriber profile from `user/info`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct User {
    /// 0 means the user is not (or no longer) subscribed; other fields are then absent
    #[serde(default)]
    pub subscribe: i32,
    pub openid: String,
    #[serde(default)]
    pub nickname: Option<String>,
    /// 1 male, 2 female, 0 unknown
    #[serde(default)]
    pub sex: Option<i32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub headimgurl: Option<String>,
    /// Epoch seconds of the latest subscription
    #[serde(default)]
    pub subscribe_time: Option<i64>,
    #[serde(default)]
    pub unionid: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub groupid: Option<i64>,
}

impl User {
    pub fn is_subscribed(&self) -> bool {
        self.subscribe != 0
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FollowerData {
    #[serde(default)]
    pub openid: Vec<String>,
}

/// One page (or the aggregate) of the follower list
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Followers {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub data: Option<FollowerData>,
    #[serde(default)]
    pub next_openid: String,
}

impl Followers {
    pub fn openids(&self) -> &[String] {
        self.data.as_ref().map(|d| d.openid.as_slice()).unwrap_or(&[])
    }
}

impl MpClient {
    /// Fetch a subscriber's profile. `lang` defaults to zh_CN.
    ///
    /// Returns `None` when the provider answers with an empty payload.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_user_info(&self, openid: &str, lang: Option<Lang>) -> Result<Option<User>> {
        if openid.is_empty() {
            return Err(Error::InvalidArgument("openid is empty".into()));
        }
        let token = self.ensure_authorized().await?;
        let lang = lang.unwrap_or_default();
        let url = self.endpoint(
            &self.config.api_base,
            "/cgi-bin/user/info",
            Some(&token),
            &[("openid", openid), ("lang", lang.as_str())],
        )?;
        let reply = self.get("get_user_info", url).await?;
        if reply.value.get("openid").is_none() {
            return Ok(None);
        }
        reply.into_typed().map(Some)
    }

    /// Fetch one page of followers starting after `next_openid` (empty: from the beginning).
    #[instrument(level = "debug", skip(self))]
    pub async fn get_followers(&self, next_openid: &str) -> Result<Followers> {
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(
            &self.config.api_base,
            "/cgi-bin/user/get",
            Some(&token),
            &[("next_openid", next_openid)],
        )?;
        self.get("get_followers", url).await?.into_typed()
    }

    /// Follow the `next_openid` cursor until it is exhausted and return all openids.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_all_followers(&self) -> Result<Followers> {
        let mut all = Vec::new();
        let mut total = 0;
        let mut cursor = String::new();
        let mut pages = 0usize;
        let mut seen = HashSet::new();

        loop {
            let page = self.get_followers(&cursor).await?;
            pages += 1;
            total = page.total;
            let ids = page.data.map(|d| d.openid).unwrap_or_default();
            let fetched = ids.len();
            all.extend(ids);

            // The last page repeats the final openid as cursor with count 0.
            if page.next_openid.is_empty() || fetched == 0 || page.next_openid == cursor {
                break;
            }
            seen.insert(std::mem::take(&mut cursor));
            if seen.contains(&page.next_openid) {
                warn!(cursor = %page.next_openid, "follower cursor revisited; stopping");
                break;
            }
            cursor = page.next_openid;
        }
        debug!(pages, collected = all.len(), "follower listing complete");

        Ok(Followers {
            total,
            count: all.len() as u64,
            data: Some(FollowerData { openid: all }),
            next_openid: String::new(),
        })
    }
}
