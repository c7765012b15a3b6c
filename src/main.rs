use anyhow::Result;
use mailqa::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
