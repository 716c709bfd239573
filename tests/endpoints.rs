//! Endpoint behavior against a mock provider, with a pre-seeded valid token.

mod common;

use common::{APPID, TOKEN, authorized_client, ok_body};
use httpmock::prelude::*;
use serde_json::json;
use wxmp_rs::Error;
use wxmp_rs::media::MediaType;
use wxmp_rs::menu::{Button, ButtonType, Menu};
use wxmp_rs::message::NewsArticle;
use wxmp_rs::pay::{self, TradeType, UnifiedOrder};
use wxmp_rs::qrcode::TicketType;
use wxmp_rs::ticket::jsapi_signature;
use wxmp_rs::user::Lang;

#[tokio::test]
async fn followers_are_paged_until_cursor_is_empty() {
    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/user/get")
                .query_param("access_token", TOKEN)
                .query_param("next_openid", "");
            then.status(200).json_body(json!({
                "total": 3, "count": 2,
                "data": {"openid": ["o1", "o2"]},
                "next_openid": "A"
            }));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/user/get")
                .query_param("next_openid", "A");
            then.status(200).json_body(json!({
                "total": 3, "count": 1,
                "data": {"openid": ["o3"]},
                "next_openid": ""
            }));
        })
        .await;

    let c = authorized_client(&server).await;
    let all = c.get_all_followers().await.unwrap();
    assert_eq!(all.openids(), ["o1", "o2", "o3"]);
    assert_eq!(all.total, 3);
    first.assert_calls_async(1).await;
    second.assert_calls_async(1).await;
}

#[tokio::test]
async fn user_info_decodes_profile() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/user/info")
                .query_param("openid", "o1")
                .query_param("lang", "en");
            then.status(200).json_body(json!({
                "subscribe": 1, "openid": "o1", "nickname": "Band",
                "sex": 1, "language": "en", "city": "Guangzhou",
                "subscribe_time": 1382694957, "groupid": 0
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/user/info")
                .query_param("openid", "gone");
            then.status(200).json_body(json!({"subscribe": 0}));
        })
        .await;

    let c = authorized_client(&server).await;
    let user = c.get_user_info("o1", Some(Lang::En)).await.unwrap().unwrap();
    assert!(user.is_subscribed());
    assert_eq!(user.nickname.as_deref(), Some("Band"));
    assert_eq!(user.groupid, Some(0));
    assert!(c.get_user_info("gone", None).await.unwrap().is_none());
}

#[tokio::test]
async fn group_operations() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cgi-bin/groups/create")
                .json_body(json!({"group": {"name": "vip"}}));
            then.status(200)
                .json_body(json!({"group": {"id": 107, "name": "vip"}}));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cgi-bin/groups/update")
                .json_body(json!({"group": {"id": 107, "name": "gold"}}));
            then.status(200).json_body(ok_body());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/cgi-bin/groups/getid");
            then.status(200).json_body(json!({"groupid": 107}));
        })
        .await;

    let c = authorized_client(&server).await;
    let g = c.create_group("vip").await.unwrap().unwrap();
    assert_eq!(g.id, 107);
    c.update_group(107, "gold").await.unwrap();
    assert_eq!(c.get_group_id("o1").await.unwrap(), Some(107));

    assert!(matches!(
        c.update_group(-1, "x").await,
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(c.create_group("").await, Err(Error::InvalidArgument(_))));
    create.assert_calls_async(1).await;
    update.assert_calls_async(1).await;
}

#[tokio::test]
async fn provider_errors_are_reported_with_cause() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/cgi-bin/groups/delete");
            then.status(200)
                .json_body(json!({"errcode": "40050", "errmsg": ""}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/cgi-bin/groups/members/update");
            then.status(200)
                .json_body(json!({"errcode": 40003, "errmsg": "invalid openid"}));
        })
        .await;

    let c = authorized_client(&server).await;
    match c.delete_group(3).await {
        Err(Error::Provider { code, cause }) => {
            assert_eq!(code, 40050);
            assert!(!cause.is_empty());
        }
        other => panic!("unexpected: {other:?}"),
    }
    let err = c.move_member("bad", 3).await.unwrap_err();
    assert_eq!(err.code(), Some(40003));
}

#[tokio::test]
async fn menu_round_trip() {
    let server = MockServer::start_async().await;
    let menu = Menu::new(vec![
        Button::click("Today", "V1001_TODAY_MUSIC"),
        Button::parent(
            "More",
            vec![
                Button::view("Search", "http://www.soso.com/"),
                Button::event(ButtonType::ScancodePush, "Scan", "rselfmenu_0_1"),
            ],
        ),
    ]);
    let wire = serde_json::to_value(&menu).unwrap();
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cgi-bin/menu/create")
                .json_body(wire.clone());
            then.status(200).json_body(ok_body());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/cgi-bin/menu/get");
            then.status(200).json_body(json!({ "menu": wire }));
        })
        .await;

    let c = authorized_client(&server).await;
    c.create_menu(&menu).await.unwrap();
    assert_eq!(c.get_menu().await.unwrap(), Some(menu));
    create.assert_calls_async(1).await;

    let too_wide = Menu::new((0..4).map(|i| Button::click(format!("b{i}"), "k")).collect());
    assert!(matches!(
        c.create_menu(&too_wide).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn qrcode_is_written_to_file() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cgi-bin/qrcode/create")
                .json_body(json!({
                    "expire_seconds": 600,
                    "action_name": "QR_SCENE",
                    "action_info": {"scene": {"scene_id": 42}}
                }));
            then.status(200).json_body(json!({
                "ticket": "TICKET42", "expire_seconds": 600, "url": "http://weixin.qq.com/q/x"
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/showqrcode")
                .query_param("ticket", "TICKET42");
            then.status(200)
                .header("content-type", "image/jpeg")
                .body([0xFFu8, 0xD8, 0xFF, 0xE0]);
        })
        .await;

    let c = authorized_client(&server).await;
    let path = std::env::temp_dir().join(format!("wxmp-qr-{}.jpg", std::process::id()));
    let ticket = c
        .create_qrcode(TicketType::Temporary, 42, 600, &path)
        .await
        .unwrap();
    assert_eq!(ticket.ticket, "TICKET42");
    assert_eq!(std::fs::read(&path).unwrap(), [0xFF, 0xD8, 0xFF, 0xE0]);
    let _ = std::fs::remove_file(&path);

    assert!(matches!(
        c.create_qrcode_ticket(TicketType::Permanent, 0, 0).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn media_upload_and_download() {
    let server = MockServer::start_async().await;
    let upload = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cgi-bin/media/upload")
                .query_param("access_token", TOKEN)
                .query_param("type", "image");
            then.status(200).json_body(json!({
                "type": "image", "media_id": "MEDIA1", "created_at": 1700000000
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/media/get")
                .query_param("media_id", "MEDIA1");
            then.status(200)
                .header("content-type", "image/jpeg")
                .header("content-disposition", "attachment; filename=\"MEDIA1.jpg\"")
                .body(b"jpegbytes".to_vec());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/media/get")
                .query_param("media_id", "EXPIRED");
            then.status(200)
                .header("content-type", "text/plain")
                .json_body(json!({"errcode": 40007, "errmsg": "invalid media_id"}));
        })
        .await;

    let c = authorized_client(&server).await;
    let up = c
        .upload_media(MediaType::Image, "logo.jpg", b"jpegbytes".to_vec())
        .await
        .unwrap();
    assert_eq!(up.id(), Some("MEDIA1"));
    upload.assert_calls_async(1).await;

    let file = c.download_media("MEDIA1").await.unwrap();
    assert_eq!(&file.bytes[..], b"jpegbytes");
    assert_eq!(file.suffix().as_deref(), Some("jpg"));

    let err = c.download_media("EXPIRED").await.unwrap_err();
    assert_eq!(err.code(), Some(40007));
}

#[tokio::test]
async fn mass_and_custom_messages() {
    let server = MockServer::start_async().await;
    let mass = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cgi-bin/message/mass/send")
                .json_body(json!({
                    "touser": ["o1", "o2"],
                    "msgtype": "text",
                    "text": {"content": "hello"}
                }));
            then.status(200).json_body(json!({
                "errcode": 0, "errmsg": "send job submission success", "msg_id": 34182
            }));
        })
        .await;
    let custom = server
        .mock_async(|when, then| {
            when.method(POST).path("/cgi-bin/message/custom/send");
            then.status(200).json_body(ok_body());
        })
        .await;

    let c = authorized_client(&server).await;
    let ids = vec!["o1".to_string(), "o2".to_string()];
    let res = c.mass_send_text(&ids, "hello").await.unwrap();
    assert_eq!(res.msg_id.as_deref(), Some("34182"));
    mass.assert_calls_async(1).await;

    c.custom_send_text("o1", "hi").await.unwrap();
    c.custom_send_news(
        "o1",
        vec![NewsArticle {
            title: "Happy Day".into(),
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    custom.assert_calls_async(2).await;

    assert!(matches!(
        c.mass_send_text(&[], "hello").await,
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        c.custom_send_news("o1", Vec::new()).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn jsapi_ticket_signs_page_url() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/ticket/getticket")
                .query_param("type", "jsapi");
            then.status(200).json_body(json!({
                "errcode": 0, "errmsg": "ok", "ticket": "JSTICKET", "expires_in": 7200
            }));
        })
        .await;

    let c = authorized_client(&server).await;
    let url = "http://example.com/page?x=1#top";
    let sig = c.sign_jsapi_url(url, "nonce").await.unwrap().unwrap();
    assert_eq!(sig.appid, APPID);
    assert_eq!(
        sig.signature,
        jsapi_signature("JSTICKET", "nonce", sig.timestamp, url)
    );
}

#[tokio::test]
async fn unified_order_returns_prepay() {
    const KEY: &str = "192006250b4c09247ec02edce69f6a2d";
    let server = MockServer::start_async().await;

    let mut fields = vec![
        ("return_code", "SUCCESS"),
        ("return_msg", "OK"),
        ("appid", APPID),
        ("mch_id", "10000100"),
        ("nonce_str", "IITRi8Iabbblz1Jc"),
        ("result_code", "SUCCESS"),
        ("prepay_id", "wx201411101639507cbf6ffd8b0779950874"),
        ("trade_type", "NATIVE"),
        ("code_url", "weixin://wxpay/bizpayurl?pr=abc"),
    ];
    let signature = pay::sign(fields.iter().copied(), KEY);
    fields.push(("sign", signature.as_str()));
    let reply = pay::to_xml(fields.iter().copied());

    let order_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/pay/unifiedorder");
            then.status(200).header("content-type", "text/xml").body(reply.clone());
        })
        .await;

    let c = common::client(&server);
    let mut order = UnifiedOrder::new(
        APPID,
        "10000100",
        "test goods",
        "1217752501201407033233368018",
        1,
        "127.0.0.1",
        "http://example.com/notify",
        TradeType::Native,
    );
    order.product_id = Some("P1".into());

    let res = c.unified_order(&order, KEY).await.unwrap();
    assert!(res.is_success());
    assert_eq!(res.code_url.as_deref(), Some("weixin://wxpay/bizpayurl?pr=abc"));
    order_mock.assert_calls_async(1).await;

    order.product_id = None;
    assert!(matches!(
        c.unified_order(&order, KEY).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn unified_order_transport_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/pay/unifiedorder");
            then.status(200).body(
                "<xml><return_code><![CDATA[FAIL]]></return_code>\
                 <return_msg><![CDATA[appid not exist]]></return_msg></xml>",
            );
        })
        .await;

    let c = common::client(&server);
    let mut order = UnifiedOrder::new(
        APPID, "10000100", "goods", "T1", 100, "127.0.0.1", "http://example.com/n", TradeType::Jsapi,
    );
    order.openid = Some("o1".into());
    match c.unified_order(&order, "key").await {
        Err(Error::Provider { code, cause }) => {
            assert_eq!(code, -1);
            assert_eq!(cause, "appid not exist");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn media_download_gateway_error_is_not_a_file() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/media/get")
                .query_param("media_id", "M1");
            then.status(502)
                .header("content-type", "text/html")
                .body("<html>bad gateway</html>");
        })
        .await;

    let c = authorized_client(&server).await;
    match c.download_media("M1").await {
        Err(Error::UnexpectedResponse { status, body, .. }) => {
            assert_eq!(status, 502);
            assert!(body.contains("bad gateway"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn follower_cursor_cycle_terminates() {
    let server = MockServer::start_async().await;
    let start = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/user/get")
                .query_param("next_openid", "");
            then.status(200).json_body(json!({
                "total": 4, "count": 1, "data": {"openid": ["o1"]}, "next_openid": "A"
            }));
        })
        .await;
    let a = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/user/get")
                .query_param("next_openid", "A");
            then.status(200).json_body(json!({
                "total": 4, "count": 1, "data": {"openid": ["o2"]}, "next_openid": "B"
            }));
        })
        .await;
    let b = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cgi-bin/user/get")
                .query_param("next_openid", "B");
            then.status(200).json_body(json!({
                "total": 4, "count": 1, "data": {"openid": ["o3"]}, "next_openid": "A"
            }));
        })
        .await;

    let c = authorized_client(&server).await;
    let all = c.get_all_followers().await.unwrap();
    assert_eq!(all.openids(), ["o1", "o2", "o3"]);
    start.assert_calls_async(1).await;
    a.assert_calls_async(1).await;
    b.assert_calls_async(1).await;
}
