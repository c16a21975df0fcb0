//! The provider side of the authorization-code flow: build the URL the
//! browser is sent to, then trade the returned code for the user's profile.

use axum::http::header;
use reqwest::Client;
use serde::Deserialize;

use crate::auth::oauth2::append_query_param;
use crate::config::OAuth2Config;
use crate::db::users::NewUser;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct OAuth2Client {
    http: Client,
    client_id: String,
    client_secret: String,
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
    callback_url: String,
    scope: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// The OpenID Connect userinfo claims we use.
#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl OAuth2Client {
    pub fn new(http: Client, config: &OAuth2Config) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            authorization_endpoint: config.authorization_endpoint.clone(),
            token_endpoint: config.token_endpoint.clone(),
            userinfo_endpoint: config.userinfo_endpoint.clone(),
            callback_url: config.callback_url.clone(),
            scope: config.scope.clone(),
        }
    }

    pub fn authorization_url(&self, state: &str) -> String {
        [
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.callback_url.as_str()),
            ("scope", self.scope.as_str()),
            ("state", state),
        ]
        .iter()
        .fold(self.authorization_endpoint.clone(), |url, (key, value)| {
            append_query_param(&url, key, value)
        })
    }

    /// Exchange an authorization code for the signed-in user's profile.
    pub async fn fetch_profile(&self, code: &str) -> AppResult<NewUser> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", code)
            .append_pair("redirect_uri", &self.callback_url)
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret)
            .finish();

        let token: TokenResponse = self
            .http
            .post(&self.token_endpoint)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let info: UserInfo = self
            .http
            .get(&self.userinfo_endpoint)
            .bearer_auth(&token.access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!("Fetched OAuth2 profile for {:?}", info.email);
        profile_from(info)
    }
}

fn profile_from(info: UserInfo) -> AppResult<NewUser> {
    let email = info
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Login provider did not share an email".into()))?;

    let name = info
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    Ok(NewUser {
        name,
        email,
        image: info.picture.unwrap_or_default(),
        bio: String::new(),
    })
}
