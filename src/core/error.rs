//! Error kinds surfaced to the user. Everything else flows through
//! `anyhow` and gets downcast back to one of these at the API
//! boundary.

#[derive(Debug, thiserror::Error)]
pub enum MailQaError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Fetching mail failed: {0}")]
    Fetch(String),
    #[error("Indexing email {message_id} failed: {reason}")]
    Index { message_id: String, reason: String },
    #[error("Model request failed: {0}")]
    Model(String),
}

impl MailQaError {
    pub fn kind(&self) -> &'static str {
        match self {
            MailQaError::Config(_) => "config",
            MailQaError::Auth(_) => "auth",
            MailQaError::Fetch(_) => "fetch",
            MailQaError::Index { .. } => "index",
            MailQaError::Model(_) => "model",
        }
    }
}
