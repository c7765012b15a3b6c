//! Public types for the email API
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::email::EmailSummary;

#[derive(Deserialize)]
pub struct FetchRequest {
    /// Day to fetch as `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchResponse {
    pub date: NaiveDate,
    pub summary: EmailSummary,
    pub indexed: usize,
    pub skipped: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub date: Option<NaiveDate>,
    pub summary: Option<EmailSummary>,
    pub documents: usize,
}
