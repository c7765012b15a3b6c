//! Router for the question answering API

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
};

use super::public;
use crate::ai::{SAMPLE_QUESTIONS, answer};
use crate::api::public::{ApiError, bad_request};
use crate::api::state::SharedState;

async fn ask_handler(
    State(state): State<SharedState>,
    Json(payload): Json<public::AskRequest>,
) -> Result<Response, ApiError> {
    if payload.question.trim().is_empty() {
        return Ok(bad_request("Question can't be empty"));
    }

    let (config, db, embedder) = {
        let shared_state = state.read().expect("Unable to read share state");
        (
            shared_state.config.clone(),
            shared_state.db.clone(),
            shared_state.embedder.clone(),
        )
    };
    let result = answer(&db, &embedder, &config, &payload.question).await?;

    Ok(Json(result).into_response())
}

async fn samples_handler() -> Json<public::SamplesResponse> {
    Json(public::SamplesResponse {
        questions: SAMPLE_QUESTIONS.iter().map(|q| q.to_string()).collect(),
    })
}

/// Create the question answering router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/ask", axum::routing::post(ask_handler))
        .route("/samples", axum::routing::get(samples_handler))
}
