//! User group management.
//!
//! Endpoints (all POST with `?access_token=ACCESS_TOKEN`):
//! - groups/create          body: {"group":{"name":"test"}}
//! - groups/get             no body; returns {"groups":[{"id":0,"name":"未分组","count":72596}, ...]}
//! - groups/getid           body: {"openid":"OPENID"}; returns {"groupid":102}
//! - groups/update          body: {"group":{"id":108,"name":"test2_modify2"}}
//! - groups/delete          body: {"group":{"id":108}}
//! - groups/members/update  body: {"openid":"OPENID","to_groupid":108}
//!
//! Ids 0, 1 and 2 are system groups (default, blacklist, starred) and cannot be modified.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::token::{Error, MpClient, Result};

/// Maximum group name length in characters
pub const MAX_GROUP_NAME_CHARS: usize = 30;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub name: String,
    /// Member count, only present in `groups/get`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

#[derive(Deserialize)]
struct GroupEnvelope {
    #[serde(default)]
    group: Option<Group>,
}

#[derive(Deserialize)]
struct GroupList {
    #[serde(default)]
    groups: Vec<Group>,
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("group name is empty".into()));
    }
    if name.chars().count() > MAX_GROUP_NAME_CHARS {
        return Err(Error::InvalidArgument(format!(
            "group name longer than {MAX_GROUP_NAME_CHARS} characters"
        )));
    }
    Ok(())
}

fn check_id(field: &str, id: i64) -> Result<()> {
    if id < 0 {
        return Err(Error::InvalidArgument(format!("{field} must be >= 0, got {id}")));
    }
    Ok(())
}

impl MpClient {
    /// Create a group; returns it with the id assigned by the provider.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_group(&self, name: &str) -> Result<Option<Group>> {
        check_name(name)?;
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/groups/create", Some(&token), &[])?;
        let body = json!({ "group": { "name": name } });
        let env: GroupEnvelope = self.post_json("create_group", url, &body).await?.into_typed()?;
        Ok(env.group)
    }

    /// List all groups (at most 500 exist per account).
    #[instrument(level = "debug", skip(self))]
    pub async fn get_groups(&self) -> Result<Vec<Group>> {
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/groups/get", Some(&token), &[])?;
        let list: GroupList = self.post_empty("get_groups", url).await?.into_typed()?;
        Ok(list.groups)
    }

    /// Group id the user belongs to; `None` if the provider reports none.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_group_id(&self, openid: &str) -> Result<Option<i64>> {
        if openid.is_empty() {
            return Err(Error::InvalidArgument("openid is empty".into()));
        }
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/groups/getid", Some(&token), &[])?;
        let reply = self
            .post_json("get_group_id", url, &json!({ "openid": openid }))
            .await?;
        Ok(reply.value.get("groupid").and_then(serde_json::Value::as_i64))
    }

    /// Rename a group.
    #[instrument(level = "debug", skip(self))]
    pub async fn update_group(&self, id: i64, name: &str) -> Result<()> {
        check_id("id", id)?;
        check_name(name)?;
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/groups/update", Some(&token), &[])?;
        let body = json!({ "group": { "id": id, "name": name } });
        self.post_json("update_group", url, &body).await?;
        Ok(())
    }

    /// Delete a group; its members move back to the default group.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete_group(&self, id: i64) -> Result<()> {
        check_id("id", id)?;
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(&self.config.api_base, "/cgi-bin/groups/delete", Some(&token), &[])?;
        let body = json!({ "group": { "id": id } });
        self.post_json("delete_group", url, &body).await?;
        Ok(())
    }

    /// Move a user into another group.
    #[instrument(level = "debug", skip(self))]
    pub async fn move_member(&self, openid: &str, to_groupid: i64) -> Result<()> {
        if openid.is_empty() {
            return Err(Error::InvalidArgument("openid is empty".into()));
        }
        check_id("to_groupid", to_groupid)?;
        let token = self.ensure_authorized().await?;
        let url = self.endpoint(
            &self.config.api_base,
            "/cgi-bin/groups/members/update",
            Some(&token),
            &[],
        )?;
        let body = json!({ "openid": openid, "to_groupid": to_groupid });
        self.post_json("move_member", url, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_rules() {
        assert!(check_name("vip").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name(&"分".repeat(30)).is_ok());
        assert!(check_name(&"分".repeat(31)).is_err());
    }

    #[test]
    fn negative_ids_rejected() {
        assert!(matches!(check_id("id", -1), Err(Error::InvalidArgument(_))));
        assert!(check_id("id", 0).is_ok());
    }
}
