pub mod prompt;
pub mod qa;

pub use qa::{NO_RELEVANT_EMAILS, QueryResult, SAMPLE_QUESTIONS, SourceDocument, answer};
