#![doc = r#"
wxmp-rs

Client for the WeChat Official Account (公众平台) HTTP APIs.

`MpClient` owns one session (appid/secret plus the current access_token). Call `login` (or
`init` with a token you already hold) once; every other operation checks the token first and
refreshes it transparently after it expires.

Included:
- token: token exchange, expiry tracking and the authorization gate
- user: user info, follower paging
- group: group CRUD and member moves
- menu: custom menu create/get/delete
- qrcode: QR tickets and image redemption
- message: mass and custom (customer-service) messages
- media: temporary media upload/download, article (news) upload
- ticket: JS-SDK ticket and page signature
- pay: unified order (XML, merchant-key signed)
- errors: errcode table and classification helpers

Quick usage:

```ignore
use wxmp_rs::{ClientConfig, MpClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = MpClient::new(ClientConfig::from_env())?;
    client.login("your_appid", "your_appsecret").await?;

    for g in client.get_groups().await? {
        println!("group {} {} ({:?} members)", g.id, g.name, g.count);
    }
    let followers = client.get_all_followers().await?;
    println!("{} followers", followers.openids().len());
    Ok(())
}
```
"#]

pub mod config;
mod envelope;
pub mod errors;
pub mod group;
pub mod media;
pub mod menu;
pub mod message;
pub mod pay;
pub mod qrcode;
pub mod ticket;
pub mod token;
pub mod user;

pub use config::ClientConfig;
pub use token::*;
