//! Router for the auth API (sign in with Microsoft)

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Query;
use chrono::Utc;
use uuid::Uuid;

use super::public;
use crate::api::public::{ApiError, bad_request};
use crate::api::state::SharedState;
use crate::core::MailQaError;
use crate::microsoft::oauth::{authorize_url, exchange_code_for_token, save_refresh_token};
use crate::microsoft::{Credentials, GraphClient};

async fn login_handler(State(state): State<SharedState>) -> Redirect {
    let csrf_state = Uuid::new_v4().to_string();
    let url = {
        let mut shared_state = state.write().expect("Unable to write share state");
        shared_state.session.pending_state = Some(csrf_state.clone());
        authorize_url(&shared_state.config, &csrf_state)
    };
    tracing::debug!("Redirecting to Microsoft sign in");
    Redirect::to(&url)
}

async fn callback_handler(
    State(state): State<SharedState>,
    Query(params): Query<public::AuthCallbackQuery>,
) -> Result<Response, ApiError> {
    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_default();
        return Err(MailQaError::Auth(format!("{}: {}", error, description)).into());
    }
    let Some(code) = params.code else {
        return Ok(bad_request("Missing authorization code"));
    };

    let (config, db, expected_state) = {
        let mut shared_state = state.write().expect("Unable to write share state");
        (
            shared_state.config.clone(),
            shared_state.db.clone(),
            shared_state.session.pending_state.take(),
        )
    };
    if expected_state.is_none() || expected_state != params.state {
        return Err(MailQaError::Auth(String::from("Sign in state did not match")).into());
    }

    let token = exchange_code_for_token(&config, &code).await?;
    let credentials = Credentials::from_token(token, Utc::now());
    let graph = GraphClient::new(&config.graph_api_url, config.request_timeout)?;
    let user = graph.me(&credentials.access_token).await?;

    if let Some(refresh_token) = &credentials.refresh_token {
        save_refresh_token(&db, &user.account(), refresh_token).await?;
    }
    tracing::info!("Signed in as {}", user.account());

    {
        let mut shared_state = state.write().expect("Unable to write share state");
        shared_state.session.credentials = Some(credentials);
        shared_state.session.user = Some(user);
    }

    Ok(Redirect::to("/").into_response())
}

async fn status_handler(State(state): State<SharedState>) -> Json<public::AuthStatusResponse> {
    let shared_state = state.read().expect("Unable to read share state");
    let session = &shared_state.session;
    Json(public::AuthStatusResponse {
        authenticated: session.credentials.is_some(),
        user: session.user.clone(),
    })
}

async fn logout_handler(State(state): State<SharedState>) -> Json<public::AuthStatusResponse> {
    let mut shared_state = state.write().expect("Unable to write share state");
    // The index is left alone, only the sign in is forgotten
    let session = &mut shared_state.session;
    session.credentials = None;
    session.user = None;
    session.pending_state = None;
    Json(public::AuthStatusResponse {
        authenticated: false,
        user: None,
    })
}

/// Create the auth router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/login", axum::routing::get(login_handler))
        .route("/callback", axum::routing::get(callback_handler))
        .route("/status", axum::routing::get(status_handler))
        .route("/logout", axum::routing::post(logout_handler))
}
