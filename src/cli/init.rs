use anyhow::{Result, anyhow};

use super::connect;
use crate::core::AppConfig;

pub async fn run(db: bool, config: &AppConfig) -> Result<()> {
    if !db {
        return Err(anyhow!("Missing value for init \"--db\""));
    }

    println!("Initializing db at {}...", config.vec_db_path);
    connect(config).await?;
    println!("Finished initializing db");

    Ok(())
}
