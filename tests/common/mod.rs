#![allow(dead_code)]

use httpmock::prelude::*;
use serde_json::json;
use wxmp_rs::{ClientConfig, MpClient};

pub const APPID: &str = "wx0123456789abcdef";
pub const SECRET: &str = "test-secret";
pub const TOKEN: &str = "ACCESS_TOKEN_1";

pub fn client(server: &MockServer) -> MpClient {
    MpClient::new(ClientConfig::default().with_base_url(server.base_url())).expect("client")
}

/// Client whose session already holds a valid `TOKEN`
pub async fn authorized_client(server: &MockServer) -> MpClient {
    let c = client(server);
    c.init(TOKEN, APPID, SECRET, 7200).await.expect("init");
    c
}

pub fn ok_body() -> serde_json::Value {
    json!({"errcode": 0, "errmsg": "ok"})
}
