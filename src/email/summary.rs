//! Quick stats over a fetched batch of mail for the dashboard.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::MailMessage;

const TOP_SENDERS: usize = 10;
const MAX_SUBJECTS: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SenderCount {
    pub email: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailSummary {
    pub total_emails: usize,
    pub unique_senders: usize,
    pub senders: Vec<SenderCount>,
    pub subjects: Vec<String>,
    pub importance_breakdown: BTreeMap<String, usize>,
}

pub fn summarize(messages: &[MailMessage]) -> EmailSummary {
    let counts = messages
        .iter()
        .map(|m| m.sender_email.as_str())
        .counts();
    let unique_senders = counts.len();

    // Most frequent first, ties broken by address so the output is stable
    let senders = counts
        .into_iter()
        .sorted_by(|(a_email, a_count), (b_email, b_count)| {
            b_count.cmp(a_count).then_with(|| a_email.cmp(b_email))
        })
        .take(TOP_SENDERS)
        .map(|(email, count)| SenderCount {
            email: email.to_string(),
            count,
        })
        .collect();

    let subjects = messages
        .iter()
        .take(MAX_SUBJECTS)
        .map(|m| m.subject.clone())
        .collect();

    let mut importance_breakdown: BTreeMap<String, usize> = ["low", "normal", "high"]
        .into_iter()
        .map(|k| (k.to_string(), 0))
        .collect();
    for m in messages {
        if let Some(count) = importance_breakdown.get_mut(&m.importance.to_lowercase()) {
            *count += 1;
        }
    }

    EmailSummary {
        total_emails: messages.len(),
        unique_senders,
        senders,
        subjects,
        importance_breakdown,
    }
}
