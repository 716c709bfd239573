//! WeChat Pay unified order (merchant API, XML over HTTPS).
//!
//! Endpoint:
//! - POST https://api.mch.weixin.qq.com/pay/unifiedorder   body: <xml>...</xml>
//!
//! Signing (MD5):
//! 1. take every non-empty parameter except `sign`
//! 2. sort by key (ASCII) and join as `k1=v1&k2=v2...`
//! 3. append `&key=MERCHANT_KEY`, MD5, uppercase hex
//!
//! This API authenticates with the merchant key, not the access_token, so it does not go through
//! the authorization gate.
//!
//! Response handling
//! - `return_code != SUCCESS`: communication/signature level failure, mapped to `Error::Provider`
//!   with code -1 and the provider's `return_msg`
//! - `result_code == FAIL`: business failure, returned as data (`err_code`, `err_code_des`)

use std::collections::BTreeMap;

use rand::RngCore;
use tracing::{debug, instrument, warn};

use crate::token::{Error, MpClient, Result};

pub const SUCCESS: &str = "SUCCESS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeType {
    /// In-app web page / official account payment; requires `openid`
    Jsapi,
    /// Scan-to-pay; requires `product_id`
    Native,
    App,
    MWeb,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Jsapi => "JSAPI",
            TradeType::Native => "NATIVE",
            TradeType::App => "APP",
            TradeType::MWeb => "MWEB",
        }
    }
}

/// Unified order request. `sign` is computed by [`MpClient::unified_order`].
#[derive(Debug, Clone)]
pub struct UnifiedOrder {
    pub appid: String,
    pub mch_id: String,
    pub device_info: Option<String>,
    pub nonce_str: String,
    pub body: String,
    pub detail: Option<String>,
    pub attach: Option<String>,
    pub out_trade_no: String,
    pub fee_type: Option<String>,
    /// Amount in fen (1/100 CNY)
    pub total_fee: u64,
    pub spbill_create_ip: String,
    /// yyyyMMddHHmmss
    pub time_start: Option<String>,
    pub time_expire: Option<String>,
    pub goods_tag: Option<String>,
    pub notify_url: String,
    pub trade_type: TradeType,
    pub product_id: Option<String>,
    pub openid: Option<String>,
}

impl UnifiedOrder {
    /// Order with the required fields; optional ones start empty and `nonce_str` is generated.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        appid: impl Into<String>,
        mch_id: impl Into<String>,
        body: impl Into<String>,
        out_trade_no: impl Into<String>,
        total_fee: u64,
        spbill_create_ip: impl Into<String>,
        notify_url: impl Into<String>,
        trade_type: TradeType,
    ) -> Self {
        Self {
            appid: appid.into(),
            mch_id: mch_id.into(),
            device_info: None,
            nonce_str: nonce_str(),
            body: body.into(),
            detail: None,
            attach: None,
            out_trade_no: out_trade_no.into(),
            fee_type: None,
            total_fee,
            spbill_create_ip: spbill_create_ip.into(),
            time_start: None,
            time_expire: None,
            goods_tag: None,
            notify_url: notify_url.into(),
            trade_type,
            product_id: None,
            openid: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("appid", self.appid.as_str()),
            ("mch_id", self.mch_id.as_str()),
            ("nonce_str", self.nonce_str.as_str()),
            ("body", self.body.as_str()),
            ("out_trade_no", self.out_trade_no.as_str()),
            ("spbill_create_ip", self.spbill_create_ip.as_str()),
            ("notify_url", self.notify_url.as_str()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.is_empty()) {
            return Err(Error::InvalidArgument(format!("{name} is required")));
        }
        if self.total_fee == 0 {
            return Err(Error::InvalidArgument("total_fee must be > 0".into()));
        }
        let empty = |v: &Option<String>| v.as_deref().is_none_or(str::is_empty);
        match self.trade_type {
            TradeType::Jsapi if empty(&self.openid) => Err(Error::InvalidArgument(
                "openid is required for JSAPI".into(),
            )),
            TradeType::Native if empty(&self.product_id) => Err(Error::InvalidArgument(
                "product_id is required for NATIVE".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Non-empty parameters keyed by wire name, excluding `sign`
    pub fn params(&self) -> BTreeMap<&'static str, String> {
        let mut m = BTreeMap::new();
        let mut put = |k: &'static str, v: Option<&str>| {
            if let Some(v) = v.filter(|v| !v.is_empty()) {
                m.insert(k, v.to_string());
            }
        };
        put("appid", Some(self.appid.as_str()));
        put("mch_id", Some(self.mch_id.as_str()));
        put("device_info", self.device_info.as_deref());
        put("nonce_str", Some(self.nonce_str.as_str()));
        put("body", Some(self.body.as_str()));
        put("detail", self.detail.as_deref());
        put("attach", self.attach.as_deref());
        put("out_trade_no", Some(self.out_trade_no.as_str()));
        put("fee_type", self.fee_type.as_deref());
        let total_fee = self.total_fee.to_string();
        put("total_fee", Some(total_fee.as_str()));
        put("spbill_create_ip", Some(self.spbill_create_ip.as_str()));
        put("time_start", self.time_start.as_deref());
        put("time_expire", self.time_expire.as_deref());
        put("goods_tag", self.goods_tag.as_deref());
        put("notify_url", Some(self.notify_url.as_str()));
        put("trade_type", Some(self.trade_type.as_str()));
        put("product_id", self.product_id.as_deref());
        put("openid", self.openid.as_deref());
        m
    }

    /// Signed XML body
    pub fn to_xml(&self, key: &str) -> String {
        let mut params = self.params();
        let signature = sign(params.iter().map(|(k, v)| (*k, v.as_str())), key);
        params.insert("sign", signature);
        to_xml(params.iter().map(|(k, v)| (*k, v.as_str())))
    }
}

/// Unified order result; every field is optional on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedOrderResult {
    pub return_code: Option<String>,
    pub return_msg: Option<String>,
    pub appid: Option<String>,
    pub mch_id: Option<String>,
    pub device_info: Option<String>,
    pub nonce_str: Option<String>,
    pub sign: Option<String>,
    pub result_code: Option<String>,
    pub err_code: Option<String>,
    pub err_code_des: Option<String>,
    pub trade_type: Option<String>,
    /// Prepay session id for JSAPI/APP, valid 2 hours
    pub prepay_id: Option<String>,
    /// QR content for NATIVE
    pub code_url: Option<String>,
    pub mweb_url: Option<String>,
}

impl UnifiedOrderResult {
    fn from_fields(mut f: BTreeMap<String, String>) -> Self {
        let mut take = |k: &str| f.remove(k);
        Self {
            return_code: take("return_code"),
            return_msg: take("return_msg"),
            appid: take("appid"),
            mch_id: take("mch_id"),
            device_info: take("device_info"),
            nonce_str: take("nonce_str"),
            sign: take("sign"),
            result_code: take("result_code"),
            err_code: take("err_code"),
            err_code_des: take("err_code_des"),
            trade_type: take("trade_type"),
            prepay_id: take("prepay_id"),
            code_url: take("code_url"),
            mweb_url: take("mweb_url"),
        }
    }

    /// Both the transport (`return_code`) and the business result (`result_code`) succeeded
    pub fn is_success(&self) -> bool {
        self.return_code.as_deref() == Some(SUCCESS) && self.result_code.as_deref() == Some(SUCCESS)
    }
}

/// MD5 signature over `k=v` pairs (empty values and `sign` skipped), uppercase hex.
pub fn sign<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>, key: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = params
        .into_iter()
        .filter(|(k, v)| *k != "sign" && !v.is_empty())
        .collect();
    pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));
    let mut plain = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    plain.push_str("&key=");
    plain.push_str(key);
    format!("{:x}", md5::compute(plain.as_bytes())).to_ascii_uppercase()
}

/// Check the `sign` field of a response map.
pub fn verify_sign(fields: &BTreeMap<String, String>, key: &str) -> bool {
    let Some(expected) = fields.get("sign") else {
        return false;
    };
    let actual = sign(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())), key);
    actual.eq_ignore_ascii_case(expected)
}

/// 32-char lowercase hex nonce from the OS-seeded thread RNG.
pub fn nonce_str() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// `<xml><k><![CDATA[v]]></k>...</xml>`
pub fn to_xml<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::from("<xml>");
    for (k, v) in params {
        let v = v.replace("]]>", "]]]]><![CDATA[>");
        out.push_str(&format!("<{k}><![CDATA[{v}]]></{k}>"));
    }
    out.push_str("</xml>");
    out
}

/// Flat `<xml>` document to a map; values may be plain text or CDATA.
pub fn parse_xml(xml: &str) -> Result<BTreeMap<String, String>> {
    let start = xml
        .find("<xml>")
        .ok_or_else(|| Error::Xml("missing <xml> root".into()))?;
    let body = &xml[start + "<xml>".len()..];
    let end = body
        .rfind("</xml>")
        .ok_or_else(|| Error::Xml("missing </xml> end".into()))?;
    let mut rest = &body[..end];
    let mut fields = BTreeMap::new();

    while let Some(open) = rest.find('<') {
        rest = &rest[open + 1..];
        let close = rest
            .find('>')
            .ok_or_else(|| Error::Xml("unterminated tag".into()))?;
        let tag = rest[..close].trim();
        if tag.is_empty() || tag.starts_with('/') || tag.starts_with('!') || tag.starts_with('?') {
            return Err(Error::Xml(format!("unexpected markup <{tag}>")));
        }
        rest = &rest[close + 1..];
        if let Some(name) = tag.strip_suffix('/') {
            fields.insert(name.trim().to_string(), String::new());
            continue;
        }
        let name = tag.to_string();
        let end_tag = format!("</{name}>");
        let value_end = rest
            .find(&end_tag)
            .ok_or_else(|| Error::Xml(format!("missing {end_tag}")))?;
        let raw = &rest[..value_end];
        fields.insert(name, xml_text(raw));
        rest = &rest[value_end + end_tag.len()..];
    }
    Ok(fields)
}

/// Concatenate CDATA sections or unescape plain text.
fn xml_text(raw: &str) -> String {
    let raw = raw.trim();
    if !raw.contains("<![CDATA[") {
        return raw
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&");
    }
    let mut out = String::new();
    let mut rest = raw;
    while let Some(s) = rest.find("<![CDATA[") {
        let body = &rest[s + "<![CDATA[".len()..];
        match body.find("]]>") {
            Some(e) => {
                out.push_str(&body[..e]);
                rest = &body[e + 3..];
            }
            None => {
                out.push_str(body);
                break;
            }
        }
    }
    out
}

impl MpClient {
    /// Place a unified order signed with the merchant `key`.
    #[instrument(level = "debug", skip(self, order, key), fields(out_trade_no = %order.out_trade_no))]
    pub async fn unified_order(&self, order: &UnifiedOrder, key: &str) -> Result<UnifiedOrderResult> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("merchant key is empty".into()));
        }
        order.validate()?;

        let url = self.endpoint(&self.config.pay_base, "/pay/unifiedorder", None, &[])?;
        let body = order.to_xml(key);
        if self.config.debug {
            debug!(target: "wxmp_rs::raw", op = "unified_order", %body, "request xml");
        }

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        self.log_raw("unified_order", &text);

        let fields = parse_xml(&text).map_err(|e| Error::UnexpectedResponse {
            status,
            error: e.to_string(),
            body: text.chars().take(2048).collect(),
        })?;
        if fields.get("return_code").map(String::as_str) != Some(SUCCESS) {
            let msg = fields.get("return_msg").cloned().unwrap_or_default();
            return Err(Error::Provider {
                code: -1,
                cause: if msg.is_empty() {
                    "unified order failed".to_string()
                } else {
                    msg
                },
            });
        }
        if fields.contains_key("sign") && !verify_sign(&fields, key) {
            warn!("unified order response signature mismatch");
            return Err(Error::UnexpectedResponse {
                status,
                error: "response signature mismatch".into(),
                body: String::new(),
            });
        }
        Ok(UnifiedOrderResult::from_fields(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_known_vector() {
        let params = [
            ("appid", "wxd930ea5d5a258f4f"),
            ("mch_id", "10000100"),
            ("device_info", "1000"),
            ("body", "test"),
            ("nonce_str", "ibuaiVcKdpRxkhJA"),
            ("detail", ""),
        ];
        assert_eq!(
            sign(params, "192006250b4c09247ec02edce69f6a2d"),
            "9A0A8659F005D6984697E2CA0A9CF3B7"
        );
    }

    #[test]
    fn parse_cdata_and_plain() {
        let xml = "<xml><return_code><![CDATA[SUCCESS]]></return_code>\n\
                   <return_msg><![CDATA[OK]]></return_msg><total_fee>1</total_fee>\
                   <note>a &amp; b</note></xml>";
        let f = parse_xml(xml).unwrap();
        assert_eq!(f["return_code"], "SUCCESS");
        assert_eq!(f["return_msg"], "OK");
        assert_eq!(f["total_fee"], "1");
        assert_eq!(f["note"], "a & b");
    }

    #[test]
    fn parse_rejects_non_xml() {
        assert!(matches!(parse_xml("{\"errcode\":1}"), Err(Error::Xml(_))));
    }

    #[test]
    fn closing_tag_before_root_is_an_error() {
        assert!(matches!(parse_xml("</xml><xml>"), Err(Error::Xml(_))));
        assert!(matches!(parse_xml("</xml>junk<xml>"), Err(Error::Xml(_))));
        assert!(parse_xml("<xml></xml>").unwrap().is_empty());
    }

    #[test]
    fn xml_written_then_read_keeps_values() {
        let mut order = UnifiedOrder::new(
            "wx1", "m1", "商品]]>描述", "T1", 100, "127.0.0.1", "http://n", TradeType::Native,
        );
        order.product_id = Some("p1".into());
        let xml = order.to_xml("k");
        let f = parse_xml(&xml).unwrap();
        assert_eq!(f["body"], "商品]]>描述");
        assert_eq!(f["trade_type"], "NATIVE");
        assert!(verify_sign(&f, "k"));
    }

    #[test]
    fn validation() {
        let order = UnifiedOrder::new(
            "wx1", "m1", "b", "T1", 100, "127.0.0.1", "http://n", TradeType::Jsapi,
        );
        assert!(order.validate().is_err());
        let mut ok = order.clone();
        ok.openid = Some("o1".into());
        assert!(ok.validate().is_ok());
        let mut zero = ok.clone();
        zero.total_fee = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn nonce_is_32_hex_and_varies() {
        let a = nonce_str();
        let b = nonce_str();
        assert_eq!(a.len(), 32);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }
}
