use anyhow::Result;
use chrono::NaiveDate;

use super::connect;
use crate::api::public::email::FetchResponse;
use crate::core::{AppConfig, MailQaError};
use crate::email::summarize;
use crate::microsoft::GraphClient;
use crate::microsoft::oauth::{find_refresh_token, refresh_access_token, save_refresh_token};
use crate::search::{build_index, embedder_from_config};

pub async fn run(date: NaiveDate, account: Option<String>, config: &AppConfig) -> Result<()> {
    let db = connect(config).await?;
    let (account, refresh_token) = find_refresh_token(&db, account)
        .await?
        .ok_or_else(|| MailQaError::Auth(String::from("No stored sign in, run `mailqa auth` first")))?;

    let token = refresh_access_token(config, &refresh_token).await?;
    if let Some(rotated) = &token.refresh_token {
        save_refresh_token(&db, &account, rotated).await?;
    }

    let graph = GraphClient::new(&config.graph_api_url, config.request_timeout)?;
    let messages = graph
        .fetch_messages_by_date(&token.access_token, date, config.utc_offset)
        .await?;

    let embedder = embedder_from_config(config)?;
    let report = build_index(&db, &embedder, &messages).await?;

    let resp = FetchResponse {
        date,
        summary: summarize(&messages),
        indexed: report.indexed,
        skipped: report.skipped,
    };
    println!("{}", serde_json::to_string_pretty(&resp)?);

    Ok(())
}
