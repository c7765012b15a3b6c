//! API routes module

pub mod auth;
pub mod email;
pub mod qa;

use axum::Router;

use crate::api::state::SharedState;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Sign in with Microsoft
        .nest("/auth", auth::router())
        // Fetching and indexing mail
        .nest("/email", email::router())
        // Questions over the index
        .nest("/qa", qa::router())
}
