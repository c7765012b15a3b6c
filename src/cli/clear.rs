use anyhow::Result;

use super::connect;
use crate::core::AppConfig;
use crate::search::clear_index;

pub async fn run(config: &AppConfig) -> Result<()> {
    let db = connect(config).await?;
    clear_index(&db).await?;
    println!("Index cleared");
    Ok(())
}
