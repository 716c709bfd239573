//! Official Account global error codes
//!
//! Purpose
//! - Resolve a provider `errcode` to a stable, human-readable cause (`describe`, `cause`)
//! - Classify codes so callers can decide whether to refresh the token or fix the request
//!
//! Notes
//! - Program logic should depend on `errcode`, never on `errmsg`; `errmsg` is diagnostic text
//!   and is only used as a fallback cause for codes missing from the table.
//! - `Error::Provider` carries the cause produced by [`cause`].

/// High-level classification for an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Success,
    /// System busy; safe to try again later
    TemporarySystem,
    /// Credential, appid/secret or access_token problems
    Auth,
    /// Invalid or missing parameter, wrong type/size/length
    InvalidParam,
    /// Referenced media/menu/user does not exist
    NotFound,
    /// Quota, frequency or count limit
    Limit,
    /// Method, scheme or permission not allowed for this account
    Unsupported,
    /// Timing constraints (e.g. 48-hour reply window)
    InvalidState,
    Unknown,
}

/// Static cause for a known errcode, `None` when the code is not in the table.
pub fn describe(code: i64) -> Option<&'static str> {
    let s = match code {
        -1 => "system busy, try again later",
        0 => "ok",
        40001 => "invalid credential: wrong appsecret or invalid access_token",
        40002 => "invalid grant_type",
        40003 => "invalid openid",
        40004 => "invalid media type",
        40005 => "invalid file type",
        40006 => "invalid file size",
        40007 => "invalid media_id",
        40008 => "invalid message type",
        40009 => "invalid image size",
        40010 => "invalid voice size",
        40011 => "invalid video size",
        40012 => "invalid thumbnail size",
        40013 => "invalid appid",
        40014 => "invalid access_token",
        40015 => "invalid menu type",
        40016 => "invalid button count",
        40017 => "invalid button count",
        40018 => "invalid button name length",
        40019 => "invalid button key length",
        40020 => "invalid button url length",
        40021 => "invalid menu version",
        40022 => "invalid sub-menu level",
        40023 => "invalid sub-button count",
        40024 => "invalid sub-button type",
        40025 => "invalid sub-button name length",
        40026 => "invalid sub-button key length",
        40027 => "invalid sub-button url length",
        40028 => "invalid custom menu user",
        40029 => "invalid oauth_code",
        40030 => "invalid refresh_token",
        40031 => "invalid openid list",
        40032 => "invalid openid list length",
        40033 => "invalid request characters: \\uxxxx escapes are not allowed",
        40035 => "invalid parameter",
        40038 => "invalid request format",
        40039 => "invalid url length",
        40050 => "invalid group id",
        40051 => "invalid group name",
        40125 => "invalid appsecret",
        40164 => "caller ip is not in the whitelist",
        41001 => "missing access_token parameter",
        41002 => "missing appid parameter",
        41003 => "missing refresh_token parameter",
        41004 => "missing secret parameter",
        41005 => "missing media data",
        41006 => "missing media_id parameter",
        41007 => "missing sub-menu data",
        42001 => "access_token expired",
        42002 => "refresh_token expired",
        43001 => "GET request required",
        43002 => "POST request required",
        43003 => "HTTPS request required",
        43004 => "receiver has not subscribed",
        44001 => "media file is empty",
        44002 => "POST body is empty",
        44003 => "news message content is empty",
        44004 => "text message content is empty",
        45001 => "media file size exceeds limit",
        45002 => "message content exceeds limit",
        45003 => "title exceeds limit",
        45004 => "description exceeds limit",
        45005 => "link exceeds limit",
        45006 => "picture url exceeds limit",
        45007 => "voice play time exceeds limit",
        45008 => "article count exceeds limit",
        45009 => "api call frequency exceeds limit",
        45010 => "menu creation count exceeds limit",
        45015 => "reply time exceeds the 48-hour window",
        45016 => "system groups cannot be modified",
        45017 => "group name too long",
        45018 => "group count exceeds limit",
        46001 => "media data does not exist",
        46002 => "menu version does not exist",
        46003 => "menu data does not exist",
        46004 => "user does not exist",
        47001 => "json/xml parse error",
        48001 => "api unauthorized for this account",
        50001 => "user has not authorized this api",
        _ => return None,
    };
    Some(s)
}

/// Cause string for `Error::Provider`: table entry, else the provider's own message.
pub fn cause(code: i64, errmsg: &str) -> String {
    match describe(code) {
        Some(s) => s.to_string(),
        None if !errmsg.is_empty() => errmsg.to_string(),
        None => format!("unknown error code {code}"),
    }
}

/// Classify errcode into a category.
pub fn category_for(code: i64) -> ErrorCategory {
    match code {
        0 => ErrorCategory::Success,
        -1 => ErrorCategory::TemporarySystem,
        40001 | 40002 | 40013 | 40014 | 40125 | 40164 | 41001 | 41002 | 41004 | 42001 => {
            ErrorCategory::Auth
        }
        40003..=40012 | 40015..=40039 | 40050 | 40051 | 41003 | 41005..=41007 | 44001..=44004
        | 45001..=45007 | 45017 | 47001 => ErrorCategory::InvalidParam,
        46001..=46004 => ErrorCategory::NotFound,
        45008..=45010 | 45018 => ErrorCategory::Limit,
        43001..=43004 | 45016 | 48001 | 50001 => ErrorCategory::Unsupported,
        42002 | 45015 => ErrorCategory::InvalidState,
        _ => ErrorCategory::Unknown,
    }
}

/// Whether the access_token should be reacquired before trying again.
pub fn should_refresh_token(code: i64) -> bool {
    matches!(code, 40001 | 40014 | 42001)
}

pub fn is_temporary(code: i64) -> bool {
    matches!(category_for(code), ErrorCategory::TemporarySystem)
}

pub fn is_auth_issue(code: i64) -> bool {
    matches!(category_for(code), ErrorCategory::Auth)
}

pub fn is_param_issue(code: i64) -> bool {
    matches!(category_for(code), ErrorCategory::InvalidParam)
}

/// One-line explanation: code, category, cause and token advice.
pub fn explain(errcode: i64, errmsg: &str) -> String {
    let mut parts = vec![
        format!("errcode={} ({:?})", errcode, category_for(errcode)),
        cause(errcode, errmsg),
    ];
    if should_refresh_token(errcode) {
        parts.push("refresh_token: yes".to_string());
    }
    if !errmsg.is_empty() && describe(errcode).is_some() {
        parts.push(format!("errmsg: {errmsg}"));
    }
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_code_uses_table() {
        assert_eq!(cause(40013, "whatever"), "invalid appid");
        assert_eq!(category_for(40013), ErrorCategory::Auth);
    }

    #[test]
    fn unknown_code_falls_back_to_errmsg() {
        assert_eq!(describe(99999), None);
        assert_eq!(cause(99999, "brand new failure"), "brand new failure");
        assert_eq!(cause(99999, ""), "unknown error code 99999");
        assert_eq!(category_for(99999), ErrorCategory::Unknown);
    }

    #[test]
    fn token_refresh_advice() {
        assert!(should_refresh_token(42001));
        assert!(should_refresh_token(40014));
        assert!(!should_refresh_token(40050));
        assert!(is_param_issue(40050));
        assert!(is_temporary(-1));
    }

    #[test]
    fn explain_mentions_refresh_for_expired_token() {
        let s = explain(42001, "access_token expired hint: [xyz]");
        assert!(s.contains("errcode=42001"));
        assert!(s.contains("refresh_token: yes"));
        assert!(s.contains("errmsg: access_token expired"));
    }
}
