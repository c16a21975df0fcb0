use axum::http::{header, HeaderMap};

/// Holds the serialized authorization request while the user is at the provider.
pub const OAUTH2_AUTH_REQUEST_COOKIE: &str = "oauth2_auth_request";
/// Where the client wants to land after login.
pub const REDIRECT_URI_COOKIE: &str = "redirect_uri";

/// Flow cookies only need to survive the round trip to the provider.
pub const FLOW_COOKIE_MAX_AGE_SECS: u64 = 180;
pub const ACCESS_TOKEN_MAX_AGE_SECS: u64 = 3600;

pub fn access_token_cookie(name: &str, token: &str) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}",
        name, token, ACCESS_TOKEN_MAX_AGE_SECS
    )
}

pub fn flow_cookie(name: &str, value: &str) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}",
        name, value, FLOW_COOKIE_MAX_AGE_SECS
    )
}

pub fn clear_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; Path=/; Max-Age=0", name)
}

/// Percent-encode a value so URLs with `;` or `,` survive as a cookie.
pub fn encode_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub fn decode_value(raw: &str) -> String {
    url::form_urlencoded::parse(format!("v={}", raw).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

pub fn get_cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}
