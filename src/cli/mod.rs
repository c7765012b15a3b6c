use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod ask;
pub mod auth;
pub mod chat;
pub mod clear;
pub mod fetch;
pub mod init;
pub mod serve;

use tokio_rusqlite::Connection;

use crate::core::AppConfig;
use crate::core::db::{async_db, initialize_db};

#[derive(Subcommand)]
enum Command {
    /// Initialize the storage directory and db schema
    Init {
        #[arg(long, action, default_value = "false")]
        db: bool,
    },
    /// Run the API server and web UI
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Sign in with Microsoft and store a refresh token
    Auth {},
    /// Fetch a day of mail and rebuild the index
    Fetch {
        /// Day to fetch as YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,

        /// Account to use, defaults to the most recently signed in
        #[arg(long)]
        account: Option<String>,
    },
    /// Ask a question about the indexed mail
    Ask {
        #[arg(long)]
        question: String,
    },
    /// Start an interactive question session
    Chat {},
    /// Empty the index
    Clear {},
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

/// Log to stdout. `RUST_LOG` takes precedence over `default_filter`.
pub fn init_tracing(default_filter: String) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Open the db and make sure the schema exists
async fn connect(config: &AppConfig) -> Result<Connection> {
    let db = async_db(&config.vec_db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    Ok(db)
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    let Some(command) = args.command else {
        return Ok(());
    };

    // Every command needs the config, bail before touching the network
    let config = AppConfig::from_env()?;

    let default_filter = match command {
        // axum logs rejections from built-in extractors with the `axum::rejection`
        // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
        Command::Serve { .. } => format!(
            "{}=debug,tower_http=debug,axum::rejection=trace",
            env!("CARGO_CRATE_NAME")
        ),
        _ => format!("{}=info", env!("CARGO_CRATE_NAME")),
    };
    init_tracing(default_filter);

    // Handle each sub command
    match command {
        Command::Init { db } => init::run(db, &config).await?,
        Command::Serve { host, port } => serve::run(host, port, config).await?,
        Command::Auth {} => auth::run(&config).await?,
        Command::Fetch { date, account } => fetch::run(date, account, &config).await?,
        Command::Ask { question } => ask::run(&question, &config).await?,
        Command::Chat {} => chat::run(&config).await?,
        Command::Clear {} => clear::run(&config).await?,
    }

    Ok(())
}
