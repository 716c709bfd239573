use dotenvy::dotenv;
use std::env;
use wxmp_rs::{ClientConfig, MpClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 运行方式：
    //   cargo run --example get_token
    //
    // 环境变量：WX_APPID, WX_APPSECRET
    // 可选：WXMP_DEBUG=1 打印原始响应（access_token 已脱敏）

    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (Ok(appid), Ok(secret)) = (env::var("WX_APPID"), env::var("WX_APPSECRET")) else {
        println!("请设置环境变量 WX_APPID 与 WX_APPSECRET 后重试。");
        return Ok(());
    };

    let appid_hint = if appid.len() <= 4 {
        format!("{}***", appid)
    } else {
        format!("{}***{}", &appid[..2], &appid[appid.len().saturating_sub(2)..])
    };
    println!("请求公众号 access_token...");
    println!("appid 提示: {}", appid_hint);

    let client = MpClient::new(ClientConfig::from_env())?;
    match client.login(&appid, &secret).await {
        Ok(cred) => {
            println!(
                "[OK] access_token 获取成功：{}\n有效期：{} 秒，剩余：{} 秒",
                cred.access_token,
                cred.expires_in,
                cred.remaining()
            );
        }
        Err(e) => {
            eprintln!("[ERR] access_token 获取失败: {e}");
            if let Some(code) = e.code() {
                eprintln!("{}", wxmp_rs::errors::explain(code, ""));
            }
        }
    }

    // 同一身份再次登录会复用未过期的 token，不会产生新的网络请求
    let again = client.login(&appid, &secret).await?;
    println!("再次登录（缓存）：剩余 {} 秒", again.remaining());

    Ok(())
}
