use anyhow::{Result, bail};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::Connection;
use zerocopy::IntoBytes;

use super::embed::SharedEmbedder;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: i64,
    pub message_id: String,
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub received: String,
    pub importance: String,
    pub has_attachments: bool,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: IndexedDocument,
    pub distance: f64,
}

fn vec_table_exists(conn: &rusqlite::Connection) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'vec_email'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn document_from_row(row: &rusqlite::Row) -> rusqlite::Result<IndexedDocument> {
    Ok(IndexedDocument {
        id: row.get(0)?,
        message_id: row.get(1)?,
        subject: row.get(2)?,
        sender_name: row.get(3)?,
        sender_email: row.get(4)?,
        received: row.get(5)?,
        importance: row.get(6)?,
        has_attachments: row.get(7)?,
        content: row.get(8)?,
    })
}

/// Number of documents in the vector index
pub async fn document_count(db: &Connection) -> Result<usize> {
    let count = db
        .call(|conn| {
            if !vec_table_exists(conn)? {
                return Ok(0);
            }
            let count: i64 = conn.query_row("SELECT count(*) FROM vec_email", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await?;
    Ok(count)
}

/// Every indexed document in insertion order
pub async fn all_documents(db: &Connection) -> Result<Vec<IndexedDocument>> {
    let docs = db
        .call(|conn| {
            if !vec_table_exists(conn)? {
                return Ok(Vec::new());
            }
            let mut stmt = conn.prepare(
                "SELECT id, message_id, subject, sender_name, sender_email, received,
                        importance, has_attachments, content
                 FROM email_document ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], document_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?;
    Ok(docs)
}

/// Find the `k` documents nearest to `query`, closest first. An index
/// that was never built yields no results.
pub async fn similarity_search(
    db: &Connection,
    embedder: &SharedEmbedder,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredDocument>> {
    let (exists, dimensions) = db
        .call(|conn| {
            let exists = vec_table_exists(conn)?;
            let dimensions: Option<String> = conn
                .query_row(
                    "SELECT value FROM index_meta WHERE key = 'dimensions'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok((exists, dimensions))
        })
        .await?;
    if !exists || k == 0 {
        return Ok(Vec::new());
    }
    if let Some(dimensions) = dimensions
        && dimensions != embedder.dimensions().to_string()
    {
        bail!(
            "The index was built with {} dimensional embeddings but the current model uses {}, fetch mail again to rebuild it",
            dimensions,
            embedder.dimensions()
        );
    }

    let embedding = embedder.embed(query).await?;
    let results = db
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "WITH knn AS (
                     SELECT rowid, distance
                     FROM vec_email
                     WHERE embedding MATCH ?1 AND k = ?2
                 )
                 SELECT d.id, d.message_id, d.subject, d.sender_name, d.sender_email, d.received,
                        d.importance, d.has_attachments, d.content, knn.distance
                 FROM knn
                 JOIN email_document d ON d.id = knn.rowid
                 ORDER BY knn.distance",
            )?;
            let rows = stmt
                .query_map(params![embedding.as_bytes(), k as i64], |row| {
                    Ok(ScoredDocument {
                        document: document_from_row(row)?,
                        distance: row.get(9)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?;

    tracing::debug!("Similarity search returned {} documents", results.len());
    Ok(results)
}
