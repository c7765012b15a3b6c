//! Router for the email API

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
};
use chrono::{NaiveDate, Utc};

use super::public;
use crate::api::public::{ApiError, bad_request};
use crate::api::state::{SharedState, forget_sign_in, session_access_token};
use crate::core::MailQaError;
use crate::email::summarize;
use crate::microsoft::GraphClient;
use crate::search::{build_index, clear_index, document_count};

async fn fetch_handler(
    State(state): State<SharedState>,
    Json(payload): Json<public::FetchRequest>,
) -> Result<Response, ApiError> {
    let Ok(date) = NaiveDate::parse_from_str(payload.date.trim(), "%Y-%m-%d") else {
        return Ok(bad_request("Date must be formatted as YYYY-MM-DD"));
    };

    let (config, db, embedder) = {
        let shared_state = state.read().expect("Unable to read share state");
        (
            shared_state.config.clone(),
            shared_state.db.clone(),
            shared_state.embedder.clone(),
        )
    };
    let today = Utc::now().with_timezone(&config.utc_offset).date_naive();
    if date > today {
        return Ok(bad_request("Date can't be in the future"));
    }

    let access_token = session_access_token(&state).await?;
    let graph = GraphClient::new(&config.graph_api_url, config.request_timeout)?;
    let messages = match graph
        .fetch_messages_by_date(&access_token, date, config.utc_offset)
        .await
    {
        Ok(messages) => messages,
        Err(err) => {
            // Graph rejected the token, it won't work for anything else either
            if let Some(MailQaError::Auth(_)) = err.downcast_ref::<MailQaError>() {
                forget_sign_in(&state);
            }
            return Err(err.into());
        }
    };

    let report = build_index(&db, &embedder, &messages).await?;
    let summary = summarize(&messages);

    {
        let mut shared_state = state.write().expect("Unable to write share state");
        shared_state.session.fetched_date = Some(date);
        shared_state.session.summary = Some(summary.clone());
    }

    Ok(Json(public::FetchResponse {
        date,
        summary,
        indexed: report.indexed,
        skipped: report.skipped,
    })
    .into_response())
}

async fn summary_handler(
    State(state): State<SharedState>,
) -> Result<Json<public::SummaryResponse>, ApiError> {
    let (db, date, summary) = {
        let shared_state = state.read().expect("Unable to read share state");
        (
            shared_state.db.clone(),
            shared_state.session.fetched_date,
            shared_state.session.summary.clone(),
        )
    };
    let documents = document_count(&db).await?;
    Ok(Json(public::SummaryResponse {
        date,
        summary,
        documents,
    }))
}

async fn clear_handler(
    State(state): State<SharedState>,
) -> Result<Json<public::SummaryResponse>, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    clear_index(&db).await?;
    {
        let mut shared_state = state.write().expect("Unable to write share state");
        shared_state.session.fetched_date = None;
        shared_state.session.summary = None;
    }
    Ok(Json(public::SummaryResponse {
        date: None,
        summary: None,
        documents: 0,
    }))
}

/// Create the email router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", axum::routing::delete(clear_handler))
        .route("/fetch", axum::routing::post(fetch_handler))
        .route("/summary", axum::routing::get(summary_handler))
}
