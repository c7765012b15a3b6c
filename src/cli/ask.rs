use anyhow::{Result, anyhow};

use super::connect;
use crate::ai::answer;
use crate::core::AppConfig;
use crate::search::embedder_from_config;

pub async fn run(question: &str, config: &AppConfig) -> Result<()> {
    if question.trim().is_empty() {
        return Err(anyhow!("Question can't be empty"));
    }
    let db = connect(config).await?;
    let embedder = embedder_from_config(config)?;
    let result = answer(&db, &embedder, config, question).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
