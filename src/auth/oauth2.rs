//! Final leg of the OAuth2 login: after the provider has vouched for the user,
//! pick where to send them, mint their access token and redirect.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use url::Url;

use crate::auth::cookies::{
    access_token_cookie, clear_cookie, decode_value, get_cookie_value,
    OAUTH2_AUTH_REQUEST_COOKIE, REDIRECT_URI_COOKIE,
};
use crate::auth::token::TokenProvider;
use crate::config::Config;
use crate::db::models::User;
use crate::db::users::{self, NewUser};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// A ready-to-send post-login redirect.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub location: String,
    pub token: String,
    pub set_cookies: Vec<String>,
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        let cookies = self
            .set_cookies
            .into_iter()
            .map(|c| (header::SET_COOKIE, c))
            .collect::<Vec<_>>();

        (
            StatusCode::FOUND,
            [(header::LOCATION, self.location)],
            AppendHeaders(cookies),
        )
            .into_response()
    }
}

#[derive(Clone)]
pub struct RedirectGuard {
    tokens: TokenProvider,
    authorized_redirect_uris: Vec<String>,
    default_target_url: String,
    cookie_name: String,
}

impl RedirectGuard {
    pub fn new(tokens: TokenProvider, config: &Config) -> Self {
        Self {
            tokens,
            authorized_redirect_uris: config.oauth2.authorized_redirect_uris.clone(),
            default_target_url: config.oauth2.default_target_url.clone(),
            cookie_name: config.auth.cookie_name.clone(),
        }
    }

    /// Host (case-insensitive) and port must match an allow-listed URI.
    /// Paths are the client's business.
    pub fn is_authorized_redirect_uri(&self, uri: &str) -> bool {
        let Ok(candidate) = Url::parse(uri) else {
            return false;
        };
        let Some(candidate_host) = candidate.host_str() else {
            return false;
        };

        self.authorized_redirect_uris.iter().any(|authorized| {
            let Ok(authorized) = Url::parse(authorized) else {
                tracing::warn!("Ignoring unparseable authorized redirect URI: {}", authorized);
                return false;
            };
            authorized
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(candidate_host))
                && authorized.port() == candidate.port()
        })
    }

    /// Work out where the user goes next and mint their token. Fails with
    /// `BadRequest` when the requested redirect is not allow-listed, before
    /// any token exists.
    pub fn determine_target_url(
        &self,
        headers: &HeaderMap,
        user_id: i64,
    ) -> AppResult<LoginRedirect> {
        let redirect_uri = get_cookie_value(headers, REDIRECT_URI_COOKIE).map(decode_value);

        if let Some(uri) = &redirect_uri {
            if !self.is_authorized_redirect_uri(uri) {
                tracing::warn!("Rejected unauthorized redirect URI: {}", uri);
                return Err(AppError::BadRequest(
                    "Unauthorized redirect URI, cannot proceed with authentication".into(),
                ));
            }
        }

        let target = redirect_uri.unwrap_or_else(|| self.default_target_url.clone());
        let token = self.tokens.create_token(user_id);

        Ok(LoginRedirect {
            location: append_query_param(&target, "token", &token),
            set_cookies: vec![access_token_cookie(&self.cookie_name, &token)],
            token,
        })
    }

    /// Returns `None` when the response was already committed upstream, in
    /// which case there is nothing left to redirect.
    pub fn on_authentication_success(
        &self,
        headers: &HeaderMap,
        user_id: i64,
        committed: bool,
    ) -> AppResult<Option<LoginRedirect>> {
        let mut redirect = self.determine_target_url(headers, user_id)?;

        if committed {
            tracing::debug!(
                "Response has already been committed. Unable to redirect to {}",
                redirect.location
            );
            return Ok(None);
        }

        redirect
            .set_cookies
            .push(clear_cookie(OAUTH2_AUTH_REQUEST_COOKIE));
        redirect.set_cookies.push(clear_cookie(REDIRECT_URI_COOKIE));

        Ok(Some(redirect))
    }
}

/// The `state` the provider echoed back must be the one stored in the
/// authorization-request cookie when the flow started.
pub fn verify_state(headers: &HeaderMap, returned: Option<&str>) -> AppResult<()> {
    let expected = get_cookie_value(headers, OAUTH2_AUTH_REQUEST_COOKIE).filter(|v| !v.is_empty());
    match (expected, returned) {
        (Some(expected), Some(returned)) if expected == returned => Ok(()),
        _ => {
            tracing::warn!("OAuth2 callback state does not match the authorization request");
            Err(AppError::BadRequest(
                "Login state mismatch, start the login again".into(),
            ))
        }
    }
}

/// Called once the code exchange succeeded: register or refresh the user
/// from their profile, then redirect.
pub fn complete_login(
    state: &AppState,
    headers: &HeaderMap,
    profile: &NewUser,
    committed: bool,
) -> AppResult<(User, Option<LoginRedirect>)> {
    let user = {
        let conn = state.db.get()?;
        users::upsert_by_email(&conn, profile)?
    };
    tracing::info!("OAuth2 login succeeded for user {}", user.id);

    let redirect = state
        .redirect_guard
        .on_authentication_success(headers, user.id, committed)?;
    Ok((user, redirect))
}

/// Append `key=value` to an absolute or relative URL, keeping any fragment last.
pub(crate) fn append_query_param(target: &str, key: &str, value: &str) -> String {
    if let Ok(mut url) = Url::parse(target) {
        url.query_pairs_mut().append_pair(key, value);
        return url.into();
    }

    let (base, fragment) = match target.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (target, None),
    };
    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };
    let pair: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();

    match fragment {
        Some(fragment) => format!("{}{}{}#{}", base, separator, pair, fragment),
        None => format!("{}{}{}", base, separator, pair),
    }
}
