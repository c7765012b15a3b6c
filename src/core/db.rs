use std::fs;
use std::sync::Once;

use anyhow::{Context, Result};
use rusqlite::ffi::sqlite3_auto_extension;
use sqlite_vec::sqlite3_vec_init;
use tokio_rusqlite::Connection;

const DB_FILE_NAME: &str = "mailqa.sqlite";

static REGISTER_VEC: Once = Once::new();

/// Register sqlite-vec so that every connection opened afterwards can
/// create and query `vec0` tables.
fn register_vec_extension() {
    REGISTER_VEC.call_once(|| unsafe {
        #[allow(clippy::missing_transmute_annotations)]
        sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
    });
}

/// Open (and create if needed) the database living in `vec_db_path`.
pub async fn async_db(vec_db_path: &str) -> Result<Connection> {
    register_vec_extension();
    fs::create_dir_all(vec_db_path)
        .with_context(|| format!("Failed to create db directory {}", vec_db_path))?;
    let db_file = format!("{}/{}", vec_db_path.trim_end_matches('/'), DB_FILE_NAME);
    let conn = Connection::open(&db_file)
        .await
        .with_context(|| format!("Failed to open db {}", db_file))?;
    Ok(conn)
}

/// Create the tables. Safe to run more than once. The `vec_email`
/// virtual table is created by the indexer since its dimensions depend
/// on the embedding model.
pub fn initialize_db(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS auth (
            id TEXT PRIMARY KEY,
            refresh_token TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS email_document (
            id INTEGER PRIMARY KEY,
            message_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            sender_name TEXT NOT NULL,
            sender_email TEXT NOT NULL,
            received TEXT NOT NULL,
            importance TEXT NOT NULL,
            has_attachments INTEGER NOT NULL,
            to_count INTEGER NOT NULL,
            cc_count INTEGER NOT NULL,
            content TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )
}
