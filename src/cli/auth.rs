use anyhow::Result;
use chrono::Utc;
use std::io::{self, Write};
use uuid::Uuid;

use super::connect;
use crate::core::{AppConfig, MailQaError};
use crate::microsoft::oauth::{authorize_url, exchange_code_for_token, save_refresh_token};
use crate::microsoft::{Credentials, GraphClient};

pub async fn run(config: &AppConfig) -> Result<()> {
    let url = authorize_url(config, &Uuid::new_v4().to_string());
    println!(
        "\nPlease open the following URL in your browser and sign in:\n\n{}\n",
        url
    );
    print!("Paste the `code` parameter from the URL you were redirected to: ");
    io::stdout().flush()?;
    let mut code = String::new();
    io::stdin().read_line(&mut code)?;
    let code = code.trim();

    let token = exchange_code_for_token(config, code).await?;
    let credentials = Credentials::from_token(token, Utc::now());

    // Make sure the token actually works before storing anything
    let graph = GraphClient::new(&config.graph_api_url, config.request_timeout)?;
    let user = graph.me(&credentials.access_token).await?;
    let account = user.account();

    let refresh_token = credentials.refresh_token.ok_or_else(|| {
        MailQaError::Auth(String::from(
            "No refresh token in response, check the app requests offline_access",
        ))
    })?;
    let db = connect(config).await?;
    save_refresh_token(&db, &account, &refresh_token).await?;
    println!("Refresh token for {} saved to DB.", account);

    Ok(())
}
