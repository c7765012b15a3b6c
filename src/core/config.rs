use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use super::error::MailQaError;

// Largest `k` sqlite-vec accepts in a KNN query
pub const MAX_TOP_K: usize = 4096;

const REQUIRED_VARS: [&str; 4] = ["CLIENT_ID", "CLIENT_SECRET", "TENANT_ID", "OPENAI_API_KEY"];

/// Which embedding model backs the vector index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedderKind {
    /// Local ONNX model downloaded on first use
    FastEmbed,
    /// Feature hashing over word tokens, no model download needed
    Hashing,
}

impl FromStr for EmbedderKind {
    type Err = MailQaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fastembed" => Ok(EmbedderKind::FastEmbed),
            "hashing" => Ok(EmbedderKind::Hashing),
            other => Err(MailQaError::Config(format!(
                "Unknown MAILQA_EMBEDDER \"{}\", expected \"fastembed\" or \"hashing\"",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub redirect_uri: String,
    pub openai_api_key: String,
    pub openai_api_hostname: String,
    pub openai_model: String,
    pub system_message: String,
    pub graph_api_url: String,
    pub login_url: String,
    pub storage_path: String,
    pub vec_db_path: String,
    pub top_k: usize,
    pub utc_offset: FixedOffset,
    pub embedder: EmbedderKind,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Read the config from the process environment. Fails before
    /// anything touches the network if a required variable is missing.
    pub fn from_env() -> Result<Self, MailQaError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable lookup. Empty
    /// values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MailQaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(MailQaError::Config(format!(
                "Missing required environment variable(s): {}",
                missing.join(", ")
            )));
        }
        let required = |key: &str| get(key).unwrap_or_default();

        let storage_path = get("MAILQA_STORAGE_PATH").unwrap_or_else(|| "./".to_string());
        let vec_db_path = format!("{}/db", storage_path.trim_end_matches('/'));
        let redirect_uri = get("REDIRECT_URI")
            .unwrap_or_else(|| "http://localhost:2222/api/auth/callback".to_string());
        let openai_api_hostname =
            get("MAILQA_OPENAI_HOST").unwrap_or_else(|| "https://api.openai.com".to_string());
        let openai_model = get("MAILQA_OPENAI_MODEL").unwrap_or_else(|| "gpt-4.1-mini".to_string());
        let system_message = get("MAILQA_SYSTEM_MESSAGE").unwrap_or_else(|| {
            "You are an AI assistant helping to analyze emails.".to_string()
        });
        let graph_api_url = get("MAILQA_GRAPH_API_URL")
            .unwrap_or_else(|| "https://graph.microsoft.com/v1.0".to_string());
        let login_url = get("MAILQA_LOGIN_URL")
            .unwrap_or_else(|| "https://login.microsoftonline.com".to_string());

        let top_k = match get("MAILQA_TOP_K") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|k| (1..=MAX_TOP_K).contains(k))
                .ok_or_else(|| {
                    MailQaError::Config(format!(
                        "MAILQA_TOP_K must be an integer between 1 and {}, got \"{}\"",
                        MAX_TOP_K, v
                    ))
                })?,
            None => 5,
        };
        let utc_offset = match get("MAILQA_UTC_OFFSET") {
            Some(v) => FixedOffset::from_str(v.trim()).map_err(|_| {
                MailQaError::Config(format!(
                    "MAILQA_UTC_OFFSET must look like \"+02:00\", got \"{}\"",
                    v
                ))
            })?,
            None => Utc.fix(),
        };
        let embedder = match get("MAILQA_EMBEDDER") {
            Some(v) => v.parse()?,
            None => EmbedderKind::FastEmbed,
        };
        let request_timeout = match get("MAILQA_REQUEST_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| {
                    MailQaError::Config(format!(
                        "MAILQA_REQUEST_TIMEOUT_SECS must be a number of seconds, got \"{}\"",
                        v
                    ))
                })?,
            None => Duration::from_secs(60),
        };

        Ok(Self {
            client_id: required("CLIENT_ID"),
            client_secret: required("CLIENT_SECRET"),
            tenant_id: required("TENANT_ID"),
            redirect_uri,
            openai_api_key: required("OPENAI_API_KEY"),
            openai_api_hostname,
            openai_model,
            system_message,
            graph_api_url,
            login_url,
            storage_path,
            vec_db_path,
            top_k,
            utc_offset,
            embedder,
            request_timeout,
        })
    }
}
