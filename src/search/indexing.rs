use anyhow::Result;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::Connection;
use zerocopy::IntoBytes;

use super::embed::SharedEmbedder;
use crate::core::MailQaError;
use crate::core::db::initialize_db;
use crate::email::{MailMessage, Recipient};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    pub indexed: usize,
    /// IDs of messages left out because their embedding failed
    pub skipped: Vec<String>,
}

struct DocumentRow {
    message_id: String,
    subject: String,
    sender_name: String,
    sender_email: String,
    received: String,
    importance: String,
    has_attachments: bool,
    to_count: usize,
    cc_count: usize,
    content: String,
    embedding: Vec<f32>,
}

fn join_recipients(recipients: &[Recipient]) -> String {
    recipients
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Render a message as the text that gets embedded and later handed to
/// the model as context.
pub fn format_document(message: &MailMessage) -> String {
    let mut parts = vec![
        format!("Subject: {}", message.subject),
        format!("From: {} <{}>", message.sender_name, message.sender_email),
    ];
    if !message.to_recipients.is_empty() {
        parts.push(format!("To: {}", join_recipients(&message.to_recipients)));
    }
    if !message.cc_recipients.is_empty() {
        parts.push(format!("CC: {}", join_recipients(&message.cc_recipients)));
    }
    parts.push(format!("Received: {}", message.received.to_rfc3339()));
    if !message.importance.eq_ignore_ascii_case("normal") {
        parts.push(format!("Importance: {}", message.importance));
    }
    if !message.body.is_empty() {
        parts.push(format!("Content: {}", message.body));
    } else if !message.body_preview.is_empty() {
        parts.push(format!("Content: {}", message.body_preview));
    }
    parts.join("\n\n")
}

/// Replace the index with one document per message. A message whose
/// embedding fails is logged and skipped, the rest still get indexed.
pub async fn build_index(
    db: &Connection,
    embedder: &SharedEmbedder,
    messages: &[MailMessage],
) -> Result<IndexReport> {
    let dimensions = embedder.dimensions();
    let mut rows = Vec::with_capacity(messages.len());
    let mut skipped = Vec::new();

    for message in messages {
        let content = format_document(message);
        let result = match embedder.embed(&content).await {
            Ok(embedding) if embedding.len() == dimensions => Ok(embedding),
            Ok(embedding) => Err(format!(
                "expected {} dimensions, got {}",
                dimensions,
                embedding.len()
            )),
            Err(err) => Err(err.to_string()),
        };
        match result {
            Ok(embedding) => rows.push(DocumentRow {
                message_id: message.id.clone(),
                subject: message.subject.clone(),
                sender_name: message.sender_name.clone(),
                sender_email: message.sender_email.clone(),
                received: message.received.to_rfc3339(),
                importance: message.importance.clone(),
                has_attachments: message.has_attachments,
                to_count: message.to_recipients.len(),
                cc_count: message.cc_recipients.len(),
                content,
                embedding,
            }),
            Err(reason) => {
                let err = MailQaError::Index {
                    message_id: message.id.clone(),
                    reason,
                };
                tracing::warn!("{}", err);
                skipped.push(message.id.clone());
            }
        }
    }

    let indexed = rows.len();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        initialize_db(&tx)?;
        tx.execute_batch(
            "DROP TABLE IF EXISTS vec_email;
             DELETE FROM email_document;",
        )?;
        tx.execute_batch(&format!(
            "CREATE VIRTUAL TABLE vec_email USING vec0(embedding float[{}])",
            dimensions
        ))?;
        tx.execute(
            "INSERT INTO index_meta (key, value) VALUES ('dimensions', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [dimensions.to_string()],
        )?;
        {
            let mut doc_stmt = tx.prepare(
                "INSERT INTO email_document
                 (message_id, subject, sender_name, sender_email, received, importance,
                  has_attachments, to_count, cc_count, content)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            let mut vec_stmt =
                tx.prepare("INSERT INTO vec_email (rowid, embedding) VALUES (?1, ?2)")?;
            for row in rows {
                let id = doc_stmt.insert(params![
                    row.message_id,
                    row.subject,
                    row.sender_name,
                    row.sender_email,
                    row.received,
                    row.importance,
                    row.has_attachments,
                    row.to_count as i64,
                    row.cc_count as i64,
                    row.content,
                ])?;
                vec_stmt.execute(params![id, row.embedding.as_bytes()])?;
            }
        }
        tx.commit()?;
        Ok(())
    })
    .await?;

    tracing::info!(
        "Indexed {} of {} messages ({} skipped)",
        indexed,
        messages.len(),
        skipped.len()
    );
    Ok(IndexReport { indexed, skipped })
}

/// Drop everything from the index
pub async fn clear_index(db: &Connection) -> Result<()> {
    db.call(|conn| {
        let tx = conn.transaction()?;
        initialize_db(&tx)?;
        tx.execute_batch(
            "DROP TABLE IF EXISTS vec_email;
             DELETE FROM email_document;
             DELETE FROM index_meta WHERE key = 'dimensions';",
        )?;
        tx.commit()?;
        Ok(())
    })
    .await?;
    tracing::info!("Cleared email index");
    Ok(())
}
