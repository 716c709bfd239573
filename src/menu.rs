//! Custom menu.
//!
//! Endpoints:
//! - POST https://api.weixin.qq.com/cgi-bin/menu/create?access_token=ACCESS_TOKEN  body: Menu
//! - GET  https://api.weixin.qq.com/cgi-bin/menu/get?access_token=ACCESS_TOKEN     -> {"menu": Menu}
//! - GET  https://api.weixin.qq.com/cgi-bin/menu/delete?access_token=ACCESS_TOKEN
//!
//! A menu has 1..=3 top-level buttons; a top-level button either performs an action itself
//! or opens up to 5 sub-buttons. `menu/get` echoes leaf buttons with an empty `sub_button`
//! array, which decodes to the same structure as a leaf built locally.
//!
//! Wire example:
//! {
//!   "button": [
//!     {"type": "click", "name": "今日歌曲", "key": "V1001_TODAY_MUSIC"},
//!     {"name": "菜单", "sub_button": [
//!       {"type": "view", "name": "搜索", "url": "http://www.soso.com/"}
//!     ]}
//!   ]
//! }

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::token::{Error, MpClient, Result};

pub const MAX_TOP_BUTTONS: usize = 3;
pub const MAX_SUB_BUTTONS: usize = 5;

/// Button action type, tagged by "type" on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonType {
    Click,
    View,
    ScancodePush,
    ScancodeWaitmsg,
    PicSysphoto,
    PicPhotoOrAlbum,
    PicWeixin,
    LocationSelect,
    MediaId,
    ViewLimited,
}

impl ButtonType {
    /// Event types that report back with the button `key`
    fn needs_key(&self) -> bool {
        !matches!(self, ButtonType::View | ButtonType::MediaId | ButtonType::ViewLimited)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ButtonType>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_button: Vec<Button>,
}

impl Button {
    fn leaf(kind: ButtonType, name: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            name: name.into(),
            key: None,
            url: None,
            media_id: None,
            sub_button: Vec::new(),
        }
    }

    /// Event button reporting `key` (click, scancode_*, pic_*, location_select)
    pub fn event(kind: ButtonType, name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::leaf(kind, name)
        }
    }

    pub fn click(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::event(ButtonType::Click, name, key)
    }

    pub fn view(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::leaf(ButtonType::View, name)
        }
    }

    /// Button delivering permanent material (`media_id` or `view_limited`)
    pub fn media(kind: ButtonType, name: impl Into<String>, media_id: impl Into<String>) -> Self {
        Self {
            media_id: Some(media_id.into()),
            ..Self::leaf(kind, name)
        }
    }

    /// Top-level button that only opens a sub-menu
    pub fn parent(name: impl Into<String>, sub_button: Vec<Button>) -> Self {
        Self {
            kind: None,
            name: name.into(),
            key: None,
            url: None,
            media_id: None,
            sub_button,
        }
    }

    fn validate(&self, depth: usize) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidArgument("button name is empty".into()));
        }
        if !self.sub_button.is_empty() {
            if depth > 0 {
                return Err(Error::InvalidArgument(format!(
                    "sub-button '{}' cannot have its own sub-menu",
                    self.name
                )));
            }
            if self.sub_button.len() > MAX_SUB_BUTTONS {
                return Err(Error::InvalidArgument(format!(
                    "button '{}' has more than {MAX_SUB_BUTTONS} sub-buttons",
                    self.name
                )));
            }
            return self.sub_button.iter().try_for_each(|b| b.validate(depth + 1));
        }

        let Some(kind) = self.kind else {
            return Err(Error::InvalidArgument(format!(
                "button '{}' has neither a type nor sub-buttons",
                self.name
            )));
        };
        let missing = match kind {
            ButtonType::View => self.url.as_deref().is_none_or(str::is_empty).then_some("url"),
            ButtonType::MediaId | ButtonType::ViewLimited => self
                .media_id
                .as_deref()
                .is_none_or(str::is_empty)
                .then_some("media_id"),
            k if k.needs_key() => self.key.as_deref().is_none_or(str::is_empty).then_some("key"),
            _ => None,
        };
        match missing {
            Some(field) => Err(Error::InvalidArgument(format!(
                "button '{}' requires '{field}'",
                self.name
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    #[serde(default)]
    pub button: Vec<Button>,
}

impl Menu {
    pub fn new(button: Vec<Button>) -> Self {
        Self { button }
    }

    pub fn validate(&self) -> Result<()> {
        if self.button.is_empty() {
            return Err(Error::InvalidArgument("menu has no buttons".into()));
        }
        if self.button.len() > MAX_TOP_BUTTONS {
            return Err(Error::InvalidArgument(format!(
                "menu has more than {MAX_TOP_BUTTONS} top-level buttons"
            )));
        }
        self.button.iter().try_for_each(|b| b.validate(0))
    }
}

#[derive(Deserialize)]
struct MenuEnvelope {
    #[serde(default)]
    menu: Option<Menu>,
}

impl MpClient {
    /// Publish a custom menu, replacing the current one.
    #[instrument(level = "debug", skip(self, menu))]
    pub async fn create_menu(&self, menu: &Menu) -> Result<()> {
        menu.validate()?;
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/menu/create", Some(&token), &[])?;
        self.post_json("create_menu", url, menu).await?;
        Ok(())
    }

    /// Current menu, `None` when the response carries no `menu` object.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_menu(&self) -> Result<Option<Menu>> {
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/menu/get", Some(&token), &[])?;
        let env: MenuEnvelope = self.get("get_menu", url).await?.into_typed()?;
        Ok(env.menu)
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn delete_menu(&self) -> Result<()> {
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/menu/delete", Some(&token), &[])?;
        self.get("delete_menu", url).await?;
        Ok(())
    }
}
