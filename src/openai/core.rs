use std::time::Duration;

use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::MailQaError;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: Some(content.to_string()),
        }
    }
}

/// Connection details for an OpenAI compatible chat completion API
#[derive(Clone, Debug)]
pub struct CompletionSettings<'a> {
    pub api_hostname: &'a str,
    pub api_key: &'a str,
    pub model: &'a str,
    pub timeout: Duration,
}

/// Request a single chat completion. Transport failures, non-success
/// statuses and error payloads all come back as `MailQaError::Model`.
pub async fn completion(
    messages: &[Message],
    settings: &CompletionSettings<'_>,
) -> Result<Value, Error> {
    let payload = json!({
        "model": settings.model,
        "messages": messages,
    });
    let url = format!(
        "{}/v1/chat/completions",
        settings.api_hostname.trim_end_matches("/")
    );
    let res = reqwest::Client::new()
        .post(url)
        .bearer_auth(settings.api_key)
        .header("Content-Type", "application/json")
        .timeout(settings.timeout)
        .json(&payload)
        .send()
        .await
        .map_err(|e| MailQaError::Model(format!("Request failed: {}", e)))?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(MailQaError::Model(format!("{} ({})", status, text)).into());
    }

    let response: Value = serde_json::from_str(&text)
        .map_err(|e| MailQaError::Model(format!("Invalid response body: {}", e)))?;
    if let Some(err) = response.get("error").filter(|e| !e.is_null()) {
        return Err(MailQaError::Model(format!("API returned an error: {}", err)).into());
    }

    Ok(response)
}

/// Pull the assistant's reply out of a completion response
pub fn completion_content(response: &Value) -> Result<String, Error> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            MailQaError::Model(format!("No message content in response: {}", response)).into()
        })
}
