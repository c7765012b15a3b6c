//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::{Arc, RwLock};

use axum::{Router, body::Body};
use chrono::{Duration, TimeZone, Utc};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{Value, json};
use tempfile::TempDir;

use mailqa::api::{AppState, SharedState, app};
use mailqa::core::AppConfig;
use mailqa::core::db::{async_db, initialize_db};
use mailqa::email::{MailMessage, Recipient};
use mailqa::microsoft::{Credentials, UserProfile};
use mailqa::search::embedder_from_config;

/// Application router wired to a mock server standing in for
/// Microsoft identity, Graph and OpenAI. Keep the whole struct alive
/// for the duration of the test, dropping it removes the temp dir and
/// stops the mock server.
pub struct TestApp {
    pub app: Router,
    pub state: SharedState,
    pub server: ServerGuard,
    _dir: TempDir,
}

pub fn test_config(server_url: &str, storage_path: &str, overrides: &[(&str, &str)]) -> AppConfig {
    AppConfig::from_lookup(|key| {
        if let Some((_, v)) = overrides.iter().find(|(k, _)| *k == key) {
            return Some(v.to_string());
        }
        let value = match key {
            "CLIENT_ID" => "test-client-id",
            "CLIENT_SECRET" => "test-client-secret",
            "TENANT_ID" => "tenant",
            "OPENAI_API_KEY" => "test-api-key",
            "MAILQA_STORAGE_PATH" => storage_path,
            "MAILQA_GRAPH_API_URL" | "MAILQA_LOGIN_URL" | "MAILQA_OPENAI_HOST" => server_url,
            "MAILQA_EMBEDDER" => "hashing",
            "MAILQA_REQUEST_TIMEOUT_SECS" => "5",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("Invalid test config")
}

/// Creates a test application with a fresh db in a temp directory.
pub async fn test_app() -> TestApp {
    test_app_with(&[]).await
}

pub async fn test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(&server.url(), dir.path().to_str().unwrap(), overrides);

    let db = async_db(&config.vec_db_path)
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await
    .unwrap();

    let embedder = embedder_from_config(&config).unwrap();
    let state = Arc::new(RwLock::new(AppState::new(db, config, embedder)));

    TestApp {
        app: app(Arc::clone(&state)),
        state,
        server,
        _dir: dir,
    }
}

/// Put a signed in user with a valid token into the session
pub fn sign_in(state: &SharedState) {
    let mut shared_state = state.write().unwrap();
    shared_state.session.credentials = Some(Credentials {
        access_token: String::from("token"),
        refresh_token: Some(String::from("refresh-token")),
        expires_at: Utc::now() + Duration::hours(1),
    });
    shared_state.session.user = Some(UserProfile {
        display_name: Some(String::from("Test User")),
        mail: Some(String::from("me@example.com")),
        user_principal_name: Some(String::from("me@example.com")),
    });
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}

/// A message as returned by Graph `/me/messages`
pub fn graph_message(id: &str, subject: &str, name: &str, email: &str, body: &str) -> Value {
    json!({
        "id": id,
        "subject": subject,
        "from": {"emailAddress": {"name": name, "address": email}},
        "toRecipients": [{"emailAddress": {"name": "Me", "address": "me@example.com"}}],
        "ccRecipients": [],
        "receivedDateTime": "2024-11-12T09:30:00Z",
        "body": {"contentType": "text", "content": body},
        "bodyPreview": body,
        "importance": "normal",
        "hasAttachments": false,
    })
}

/// The three messages most tests fetch
pub fn scenario_messages() -> Vec<Value> {
    vec![
        graph_message(
            "1",
            "Meeting tomorrow",
            "Alice Smith",
            "alice@example.com",
            "Can we meet tomorrow at 10am to review the roadmap? Meeting invite attached.",
        ),
        graph_message(
            "2",
            "Invoice due",
            "Billing",
            "billing@example.com",
            "Invoice 1042 is due on Friday. Please pay promptly.",
        ),
        graph_message(
            "3",
            "Lunch?",
            "Bob Jones",
            "bob@example.com",
            "Want to grab lunch today at noon?",
        ),
    ]
}

pub async fn mock_messages(server: &mut ServerGuard, messages: Vec<Value>) -> Mock {
    server
        .mock("GET", "/me/messages")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "value": messages }).to_string())
        .create_async()
        .await
}

pub async fn mock_completion(server: &mut ServerGuard, answer: &str) -> Mock {
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [{"message": {"role": "assistant", "content": answer}}]
            })
            .to_string(),
        )
        .create_async()
        .await
}

fn mail_message(id: &str, subject: &str, sender_email: &str, body: &str) -> MailMessage {
    MailMessage {
        id: id.to_string(),
        subject: subject.to_string(),
        sender_name: sender_email.to_string(),
        sender_email: sender_email.to_string(),
        to_recipients: vec![Recipient {
            name: String::from("Me"),
            address: String::from("me@example.com"),
        }],
        cc_recipients: vec![],
        body: body.to_string(),
        body_preview: body.to_string(),
        received: Utc.with_ymd_and_hms(2024, 11, 12, 9, 30, 0).unwrap(),
        importance: String::from("normal"),
        has_attachments: false,
    }
}

/// Same scenario as `scenario_messages`, already converted
pub fn scenario_mail() -> Vec<MailMessage> {
    vec![
        mail_message(
            "1",
            "Meeting tomorrow",
            "alice@example.com",
            "Can we meet tomorrow at 10am to review the roadmap? Meeting invite attached.",
        ),
        mail_message(
            "2",
            "Invoice due",
            "billing@example.com",
            "Invoice 1042 is due on Friday. Please pay promptly.",
        ),
        mail_message(
            "3",
            "Lunch?",
            "bob@example.com",
            "Want to grab lunch today at noon?",
        ),
    ]
}

pub fn json_request(method: &str, uri: &str, body: Value) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .uri(uri)
        .method(method)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
