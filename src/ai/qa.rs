//! Retrieval augmented question answering over the email index.

use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_rusqlite::Connection;

use super::prompt::{self, Prompt};
use crate::core::AppConfig;
use crate::openai::{CompletionSettings, Message, Role, completion, completion_content};
use crate::search::{ScoredDocument, SharedEmbedder, similarity_search};

const PREVIEW_CHARS: usize = 200;

pub const NO_RELEVANT_EMAILS: &str = "I couldn't find any relevant emails to answer your question. Try fetching emails for a different date or asking about a different topic.";

pub const SAMPLE_QUESTIONS: [&str; 8] = [
    "What are the most important emails I received?",
    "Who sent me the most emails today?",
    "Are there any meeting invitations?",
    "What emails require my immediate attention?",
    "Summarize the main topics discussed in my emails",
    "Are there any urgent requests or deadlines mentioned?",
    "What emails are from my manager or colleagues?",
    "Are there any emails about projects or tasks?",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub sender_email: String,
    pub received: String,
    pub content_preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceDocument>,
}

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let truncated: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", truncated)
    } else {
        content.to_string()
    }
}

impl From<&ScoredDocument> for SourceDocument {
    fn from(scored: &ScoredDocument) -> Self {
        let doc = &scored.document;
        SourceDocument {
            message_id: doc.message_id.clone(),
            subject: doc.subject.clone(),
            sender: doc.sender_name.clone(),
            sender_email: doc.sender_email.clone(),
            received: doc.received.clone(),
            content_preview: preview(&doc.content),
        }
    }
}

/// Answer `question` from the `top_k` documents nearest to it. The
/// model only sees those documents. With nothing indexed there is
/// nothing to ground an answer in, so the model isn't called at all.
pub async fn answer(
    db: &Connection,
    embedder: &SharedEmbedder,
    config: &AppConfig,
    question: &str,
) -> Result<QueryResult, Error> {
    let question = question.trim();
    let documents = similarity_search(db, embedder, question, config.top_k).await?;

    if documents.is_empty() {
        tracing::debug!("No documents matched, skipping the model call");
        return Ok(QueryResult {
            question: question.to_string(),
            answer: NO_RELEVANT_EMAILS.to_string(),
            sources: Vec::new(),
        });
    }

    let context: Vec<_> = documents
        .iter()
        .map(|d| json!({"content": d.document.content}))
        .collect();
    let user_msg = prompt::templates().render(
        &Prompt::EmailQuestion.to_string(),
        &json!({"question": question, "documents": context}),
    )?;
    let messages = vec![
        Message::new(Role::System, &config.system_message),
        Message::new(Role::User, user_msg.trim()),
    ];

    let settings = CompletionSettings {
        api_hostname: &config.openai_api_hostname,
        api_key: &config.openai_api_key,
        model: &config.openai_model,
        timeout: config.request_timeout,
    };
    let resp = completion(&messages, &settings).await?;
    let answer = completion_content(&resp)?;

    Ok(QueryResult {
        question: question.to_string(),
        answer,
        sources: documents.iter().map(SourceDocument::from).collect(),
    })
}
