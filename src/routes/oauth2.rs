use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::auth::cookies::{encode_value, flow_cookie, OAUTH2_AUTH_REQUEST_COOKIE, REDIRECT_URI_COOKIE};
use crate::auth::oauth2::{complete_login, verify_state};
use crate::auth::token::generate_secret;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/oauth2/authorize", get(authorize))
        .route("/oauth2/callback", get(callback))
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Start a login: remember the client's landing page and hand the browser
/// to the provider. The redirect URI is only checked once login completes.
async fn authorize(
    State(state): State<AppState>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    let flow_state = generate_secret();

    let mut cookies = vec![(
        header::SET_COOKIE,
        flow_cookie(OAUTH2_AUTH_REQUEST_COOKIE, &flow_state),
    )];
    if let Some(uri) = params.redirect_uri.filter(|u| !u.is_empty()) {
        tracing::debug!("Login requested with redirect URI {}", uri);
        cookies.push((
            header::SET_COOKIE,
            flow_cookie(REDIRECT_URI_COOKIE, &encode_value(&uri)),
        ));
    }

    (
        StatusCode::FOUND,
        [(header::LOCATION, state.oauth2.authorization_url(&flow_state))],
        AppendHeaders(cookies),
    )
        .into_response()
}

/// The provider sends the browser back here with `code` and `state`.
async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> AppResult<Response> {
    if let Some(error) = params.error {
        tracing::warn!("Login provider returned an error: {}", error);
        return Err(AppError::BadRequest(format!("Login failed: {}", error)));
    }

    verify_state(&headers, params.state.as_deref())?;
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".into()))?;

    let profile = state.oauth2.fetch_profile(&code).await?;
    let (_user, redirect) = complete_login(&state, &headers, &profile, false)?;

    Ok(match redirect {
        Some(redirect) => redirect.into_response(),
        None => StatusCode::OK.into_response(),
    })
}
