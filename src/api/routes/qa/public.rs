//! Public types for the question answering API
use serde::{Deserialize, Serialize};

pub use crate::ai::{QueryResult, SourceDocument};

#[derive(Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SamplesResponse {
    pub questions: Vec<String>,
}
