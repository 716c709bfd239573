/*!
Example: publish, read back and optionally delete the custom menu

Run:
  WX_APPID=wx... \
  WX_APPSECRET=your_secret \
  [optional] WX_MENU_URL=https://example.com \
  [optional] WX_MENU_DELETE=1 \
  cargo run --example menu
*/

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use wxmp_rs::menu::{Button, ButtonType, Menu};
use wxmp_rs::{ClientConfig, MpClient};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let appid = env::var("WX_APPID").context("set WX_APPID (official account appid)")?;
    let secret = env::var("WX_APPSECRET").context("set WX_APPSECRET")?;
    let site = env::var("WX_MENU_URL").unwrap_or_else(|_| "https://mp.weixin.qq.com".into());

    let client = MpClient::new(ClientConfig::from_env())?;
    client.login(&appid, &secret).await?;

    let menu = Menu::new(vec![
        Button::click("今日推荐", "V1001_TODAY"),
        Button::view("官网", site),
        Button::parent(
            "服务",
            vec![
                Button::event(ButtonType::ScancodePush, "扫码", "rselfmenu_0_1"),
                Button::event(ButtonType::LocationSelect, "发送位置", "rselfmenu_2_0"),
            ],
        ),
    ]);

    client.create_menu(&menu).await.context("create_menu")?;
    println!("menu published");

    match client.get_menu().await? {
        Some(current) => println!("{}", serde_json::to_string_pretty(&current)?),
        None => println!("provider returned no menu"),
    }

    if env::var("WX_MENU_DELETE").is_ok_and(|v| v == "1") {
        client.delete_menu().await?;
        println!("menu deleted");
    }
    Ok(())
}
