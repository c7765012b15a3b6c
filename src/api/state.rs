use std::sync::{Arc, RwLock};

use anyhow::{Error, Result};
use chrono::NaiveDate;
use tokio_rusqlite::Connection;

use crate::core::{AppConfig, MailQaError};
use crate::email::EmailSummary;
use crate::microsoft::{Credentials, UserProfile};
use crate::search::SharedEmbedder;

pub type SharedState = Arc<RwLock<AppState>>;

/// Everything that belongs to the one signed in user: their token,
/// who they are, and what is currently in the index.
#[derive(Debug, Clone, Default)]
pub struct MailSession {
    pub credentials: Option<Credentials>,
    pub user: Option<UserProfile>,
    // CSRF token handed to the authorize endpoint, checked on callback
    pub pending_state: Option<String>,
    pub fetched_date: Option<NaiveDate>,
    pub summary: Option<EmailSummary>,
}

pub struct AppState {
    pub db: Connection,
    pub config: AppConfig,
    pub embedder: SharedEmbedder,
    pub session: MailSession,
}

impl AppState {
    pub fn new(db: Connection, config: AppConfig, embedder: SharedEmbedder) -> Self {
        Self {
            db,
            config,
            embedder,
            session: MailSession::default(),
        }
    }
}

/// Get a usable bearer token for the session, refreshing it if needed,
/// and store the possibly refreshed credentials back.
pub async fn session_access_token(state: &SharedState) -> Result<String, Error> {
    let (credentials, config) = {
        let shared_state = state.read().expect("Unable to read share state");
        (
            shared_state.session.credentials.clone(),
            shared_state.config.clone(),
        )
    };
    let mut credentials =
        credentials.ok_or_else(|| MailQaError::Auth(String::from("Not signed in")))?;

    match credentials.access_token(&config).await {
        Ok(token) => {
            state
                .write()
                .expect("Unable to write share state")
                .session
                .credentials = Some(credentials);
            Ok(token)
        }
        Err(err) => {
            // A token we can't refresh is useless, make the user sign in again
            forget_sign_in(state);
            Err(err)
        }
    }
}

/// Drop the credentials and user so the UI offers sign in again
pub fn forget_sign_in(state: &SharedState) {
    let mut shared_state = state.write().expect("Unable to write share state");
    shared_state.session.credentials = None;
    shared_state.session.user = None;
}
