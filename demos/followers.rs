/*!
Example: list followers, their groups and a few profiles

Run:
  WX_APPID=wx... \
  WX_APPSECRET=your_secret \
  [optional] WX_PROFILE_LIMIT=5 \
  cargo run --example followers
*/

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use wxmp_rs::user::Lang;
use wxmp_rs::{ClientConfig, MpClient};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let appid = env::var("WX_APPID").context("set WX_APPID (official account appid)")?;
    let secret = env::var("WX_APPSECRET").context("set WX_APPSECRET")?;
    let limit: usize = env::var("WX_PROFILE_LIMIT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);

    let client = MpClient::new(ClientConfig::from_env())?;
    client.login(&appid, &secret).await?;

    for g in client.get_groups().await? {
        println!("group {:>4} {} ({} members)", g.id, g.name, g.count.unwrap_or(0));
    }

    let followers = client.get_all_followers().await?;
    println!("{} of {} followers fetched", followers.count, followers.total);

    for openid in followers.openids().iter().take(limit) {
        match client.get_user_info(openid, Some(Lang::ZhCn)).await? {
            Some(u) => println!(
                "{openid}: {} group={:?} city={}",
                u.nickname.as_deref().unwrap_or("-"),
                u.groupid,
                u.city.as_deref().unwrap_or("-"),
            ),
            None => println!("{openid}: no profile"),
        }
    }
    Ok(())
}
