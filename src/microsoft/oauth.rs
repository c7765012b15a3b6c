//! OAuth2 authorization-code flow against the Microsoft identity
//! platform (v2.0 endpoints) plus refresh token persistence.

use anyhow::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::Connection;

use crate::core::{AppConfig, MailQaError};

/// Delegated scopes needed to read mail. `offline_access` is what gets
/// us a refresh token back.
pub const SCOPES: &str =
    "offline_access https://graph.microsoft.com/Mail.Read https://graph.microsoft.com/User.Read";

/// Treat a token as expired this many seconds before it actually is
const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

fn tenant_url(config: &AppConfig, endpoint: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/{}",
        config.login_url.trim_end_matches('/'),
        config.tenant_id,
        endpoint
    )
}

/// URL the user is sent to for consent. `state` is echoed back on the
/// redirect and must be checked by the caller.
pub fn authorize_url(config: &AppConfig, state: &str) -> String {
    format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&response_mode=query&scope={}&state={}",
        tenant_url(config, "authorize"),
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(SCOPES),
        urlencoding::encode(state)
    )
}

async fn request_token(config: &AppConfig, form: &[(&str, &str)]) -> Result<TokenResponse, Error> {
    let res = reqwest::Client::new()
        .post(tenant_url(config, "token"))
        .timeout(config.request_timeout)
        .form(form)
        .send()
        .await
        .map_err(|e| MailQaError::Auth(format!("Token endpoint unreachable: {}", e)))?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();

    if !status.is_success() {
        let reason = serde_json::from_str::<TokenErrorResponse>(&text)
            .map(|e| match e.error_description {
                Some(desc) => format!("{}: {}", e.error, desc),
                None => e.error,
            })
            .unwrap_or_else(|_| format!("{} ({})", status, text));
        return Err(MailQaError::Auth(reason).into());
    }

    let token: TokenResponse = serde_json::from_str(&text)
        .map_err(|e| MailQaError::Auth(format!("Unexpected token response: {}", e)))?;
    Ok(token)
}

/// Exchange the `code` from the redirect for an access and refresh token
pub async fn exchange_code_for_token(config: &AppConfig, code: &str) -> Result<TokenResponse, Error> {
    request_token(
        config,
        &[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("scope", SCOPES),
        ],
    )
    .await
}

pub async fn refresh_access_token(
    config: &AppConfig,
    refresh_token: &str,
) -> Result<TokenResponse, Error> {
    request_token(
        config,
        &[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", SCOPES),
        ],
    )
    .await
}

/// Cached bearer token for the signed in account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    pub fn from_token(token: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: now + Duration::seconds(token.expires_in),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECONDS) >= self.expires_at
    }

    /// Hand out a bearer token, refreshing first if the cached one is
    /// about to expire. The identity platform may rotate the refresh
    /// token so callers need to store `self` again afterwards.
    pub async fn access_token(&mut self, config: &AppConfig) -> Result<String, Error> {
        if !self.is_expired(Utc::now()) {
            return Ok(self.access_token.clone());
        }

        let refresh_token = self.refresh_token.clone().ok_or_else(|| {
            MailQaError::Auth(String::from("Access token expired and no refresh token available"))
        })?;
        tracing::debug!("Access token expired, refreshing");
        let token = refresh_access_token(config, &refresh_token).await?;
        let mut refreshed = Credentials::from_token(token, Utc::now());
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token);
        }
        *self = refreshed;

        Ok(self.access_token.clone())
    }
}

/// Store the refresh token for `account` so it can be reused later
pub async fn save_refresh_token(db: &Connection, account: &str, refresh_token: &str) -> Result<()> {
    let account = account.to_string();
    let refresh_token = refresh_token.to_string();
    let updated_at = Utc::now().to_rfc3339();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO auth (id, refresh_token, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET refresh_token = excluded.refresh_token, updated_at = excluded.updated_at",
            (&account, &refresh_token, &updated_at),
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

fn auth_row(row: &rusqlite::Row) -> rusqlite::Result<(String, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

/// Look up a stored refresh token. Without an account, the most
/// recently updated one is used. Returns `(account, refresh_token)`.
pub async fn find_refresh_token(
    db: &Connection,
    account: Option<String>,
) -> Result<Option<(String, String)>> {
    let row = db
        .call(move |conn| {
            let result: Option<(String, String)> = match &account {
                Some(a) => conn
                    .query_row("SELECT id, refresh_token FROM auth WHERE id = ?1", [a], auth_row)
                    .optional()?,
                None => conn
                    .query_row(
                        "SELECT id, refresh_token FROM auth ORDER BY updated_at DESC LIMIT 1",
                        [],
                        auth_row,
                    )
                    .optional()?,
            };
            Ok(result)
        })
        .await?;
    Ok(row)
}
