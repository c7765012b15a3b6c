//! Public API types

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;

use crate::core::MailQaError;

// Errors

pub struct ApiError(anyhow::Error);

/// Convert `ApiError` into an Axum compatible response. The status
/// depends on which kind of failure it was so the UI can react (e.g.
/// show the sign in link on a 401).
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Always log the error
        tracing::error!("{}", self.0);

        let (status, kind, message) = match self.0.downcast_ref::<MailQaError>() {
            Some(err) => {
                let status = match err {
                    MailQaError::Auth(_) => StatusCode::UNAUTHORIZED,
                    MailQaError::Fetch(_) | MailQaError::Model(_) => StatusCode::BAD_GATEWAY,
                    MailQaError::Config(_) | MailQaError::Index { .. } => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                let message = if status == StatusCode::UNAUTHORIZED {
                    format!("{}. Please sign in again.", err)
                } else {
                    err.to_string()
                };
                (status, err.kind(), message)
            }
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                format!("Something went wrong: {}", self.0),
            ),
        };

        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// 400 response for input the handler refuses to act on
pub fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message, "kind": "request" })),
    )
        .into_response()
}

// Re-export public types from each route

pub mod auth {
    pub use crate::api::routes::auth::public::*;
}

pub mod email {
    pub use crate::api::routes::email::public::*;
}

pub mod qa {
    pub use crate::api::routes::qa::public::*;
}
