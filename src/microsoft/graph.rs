//! Microsoft Graph client for reading a day's worth of mail and
//! checking who is signed in.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use htmd::HtmlToMarkdown;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::MailQaError;
use crate::email::{MailMessage, Recipient};

/// Graph caps `$top` for messages at 1000
const PAGE_SIZE: &str = "999";

const MESSAGE_SELECT_FIELDS: &str = concat!(
    "id,subject,bodyPreview,body,from,toRecipients,ccRecipients,",
    "receivedDateTime,importance,hasAttachments"
);

#[derive(Debug, Clone, Deserialize)]
struct EmailAddress {
    name: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GraphRecipient {
    #[serde(rename = "emailAddress")]
    email_address: Option<EmailAddress>,
}

#[derive(Debug, Clone, Deserialize)]
struct ItemBody {
    #[serde(rename = "contentType")]
    content_type: Option<String>,
    content: Option<String>,
}

/// Raw message as returned by `/me/messages` with our `$select`
#[derive(Debug, Clone, Deserialize)]
struct GraphMessage {
    id: String,
    subject: Option<String>,
    #[serde(rename = "bodyPreview")]
    body_preview: Option<String>,
    body: Option<ItemBody>,
    from: Option<GraphRecipient>,
    #[serde(rename = "toRecipients", default)]
    to_recipients: Vec<GraphRecipient>,
    #[serde(rename = "ccRecipients", default)]
    cc_recipients: Vec<GraphRecipient>,
    #[serde(rename = "receivedDateTime")]
    received_date_time: DateTime<Utc>,
    importance: Option<String>,
    #[serde(rename = "hasAttachments", default)]
    has_attachments: bool,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Signed in user as returned by `/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub mail: Option<String>,
    #[serde(rename = "userPrincipalName")]
    pub user_principal_name: Option<String>,
}

impl UserProfile {
    /// Stable identifier to key stored refresh tokens by
    pub fn account(&self) -> String {
        self.user_principal_name
            .clone()
            .or_else(|| self.mail.clone())
            .unwrap_or_else(|| String::from("default"))
    }
}

fn recipient(r: &GraphRecipient) -> Recipient {
    let address = r.email_address.as_ref();
    Recipient {
        name: address
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| String::from("Unknown")),
        address: address
            .and_then(|a| a.address.clone())
            .unwrap_or_else(|| String::from("Unknown")),
    }
}

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid regex"));

/// Collapse every run of whitespace to a single space
fn collapse_whitespace(content: &str) -> String {
    WHITESPACE_RE.replace_all(content, " ").trim().to_string()
}

/// Crude tag removal for HTML the converter chokes on
fn strip_tags(html: &str) -> String {
    TAG_RE
        .replace_all(html, "")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Turn an HTML body into plain-ish text for embedding. Falls back to
/// stripping tags when the HTML can't be converted.
pub fn clean_html_content(html: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["head", "script", "style", "footer", "img", "svg"])
        .build();
    let text = match converter.convert(html) {
        Ok(markdown) => markdown,
        Err(err) => {
            tracing::warn!("HTML conversion failed, stripping tags instead: {}", err);
            strip_tags(html)
        }
    };
    collapse_whitespace(&text)
}

fn to_mail_message(raw: GraphMessage) -> MailMessage {
    let (sender_name, sender_email) = match &raw.from {
        Some(from) => {
            let r = recipient(from);
            (r.name, r.address)
        }
        None => (String::from("Unknown"), String::from("Unknown")),
    };

    let body = raw
        .body
        .as_ref()
        .and_then(|b| {
            let content = b.content.as_deref()?;
            let is_html = b
                .content_type
                .as_deref()
                .map(|t| t.eq_ignore_ascii_case("html"))
                .unwrap_or(false);
            Some(if is_html {
                clean_html_content(content)
            } else {
                content.trim().to_string()
            })
        })
        .unwrap_or_default();

    MailMessage {
        id: raw.id,
        subject: raw
            .subject
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| String::from("No Subject")),
        sender_name,
        sender_email,
        to_recipients: raw.to_recipients.iter().map(recipient).collect(),
        cc_recipients: raw.cc_recipients.iter().map(recipient).collect(),
        body,
        body_preview: raw.body_preview.unwrap_or_default(),
        received: raw.received_date_time,
        importance: raw.importance.unwrap_or_else(|| String::from("normal")),
        has_attachments: raw.has_attachments,
    }
}

/// The UTC instants for 00:00:00 and 23:59:59 of `date` in the account
/// time zone.
pub fn day_range(date: NaiveDate, offset: FixedOffset) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let end_of_day =
        NaiveTime::from_hms_opt(23, 59, 59).ok_or_else(|| anyhow!("Invalid end of day time"))?;
    let start = offset
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .ok_or_else(|| anyhow!("Ambiguous start of day for {}", date))?;
    let end = offset
        .from_local_datetime(&date.and_time(end_of_day))
        .single()
        .ok_or_else(|| anyhow!("Ambiguous end of day for {}", date))?;
    Ok((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}

pub fn received_filter(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "receivedDateTime ge {} and receivedDateTime le {}",
        start.format("%Y-%m-%dT%H:%M:%SZ"),
        end.format("%Y-%m-%dT%H:%M:%SZ")
    )
}

#[derive(Debug, Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
}

impl GraphClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Map a non-success response to the error kind the caller needs
    /// to act on: auth problems mean "sign in again", anything else is
    /// a fetch failure.
    async fn check(res: Response, what: &str) -> Result<String, Error> {
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(MailQaError::Auth(format!(
                "{} was rejected with {}, sign in again",
                what, status
            ))
            .into());
        }
        if !status.is_success() {
            return Err(MailQaError::Fetch(format!("{} failed: {} ({})", what, status, text)).into());
        }
        Ok(text)
    }

    /// Check the token works and return the signed in user
    pub async fn me(&self, access_token: &str) -> Result<UserProfile, Error> {
        let res = self
            .client
            .get(format!("{}/me", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| MailQaError::Fetch(format!("Profile request failed: {}", e)))?;
        let text = Self::check(res, "Profile request").await?;
        let profile: UserProfile = serde_json::from_str(&text)
            .map_err(|e| MailQaError::Fetch(format!("Unexpected profile response: {}", e)))?;
        Ok(profile)
    }

    /// Fetch every message received on `date` in the account time
    /// zone, newest first. Drains all pages before returning. No
    /// matches is an empty result, not an error.
    pub async fn fetch_messages_by_date(
        &self,
        access_token: &str,
        date: NaiveDate,
        offset: FixedOffset,
    ) -> Result<Vec<MailMessage>, Error> {
        let (start, end) = day_range(date, offset)?;
        let filter = received_filter(start, end);
        tracing::debug!("Fetching messages with filter: {}", filter);

        let mut request = self
            .client
            .get(format!("{}/me/messages", self.base_url))
            .query(&[
                ("$filter", filter.as_str()),
                ("$select", MESSAGE_SELECT_FIELDS),
                ("$orderby", "receivedDateTime desc"),
                ("$top", PAGE_SIZE),
            ]);

        let mut messages = Vec::new();
        let mut page_count = 0;
        loop {
            let res = request
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(|e| MailQaError::Fetch(format!("Message request failed: {}", e)))?;
            let text = Self::check(res, "Message request").await?;
            let page: MessagePage = serde_json::from_str(&text)
                .map_err(|e| MailQaError::Fetch(format!("Unexpected message page: {}", e)))?;
            page_count += 1;

            for item in page.value {
                match serde_json::from_value::<GraphMessage>(item) {
                    Ok(raw) => messages.push(to_mail_message(raw)),
                    Err(err) => tracing::warn!("Skipping malformed message: {}", err),
                }
            }

            // The next link already carries every query parameter
            match page.next_link {
                Some(next) => request = self.client.get(next),
                None => break,
            }
        }

        tracing::info!(
            "Fetched {} messages for {} across {} page(s)",
            messages.len(),
            date,
            page_count
        );
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 12).unwrap()
    }

    #[test]
    fn it_builds_the_day_range_in_the_account_time_zone() {
        let (start, end) = day_range(date(), utc()).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-11-12T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-11-12T23:59:59+00:00");

        let berlin = FixedOffset::east_opt(3600).unwrap();
        let (start, end) = day_range(date(), berlin).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-11-11T23:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-11-12T22:59:59+00:00");

        assert_eq!(
            received_filter(start, end),
            "receivedDateTime ge 2024-11-11T23:00:00Z and receivedDateTime le 2024-11-12T22:59:59Z"
        );
    }

    #[test]
    fn it_cleans_html_bodies() {
        let html = "<html><head><style>p { color: red; }</style></head><body><p>Hi&nbsp;Bob,</p>\n\n<p>See you <b>tomorrow</b>.</p></body></html>";
        let text = clean_html_content(html);
        assert!(text.contains("Hi Bob,"));
        assert!(text.contains("tomorrow"));
        assert!(!text.contains("<p>"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn it_strips_tags_and_collapses_whitespace_across_calls() {
        // The shared regexes are reused for every body in a fetch
        for _ in 0..3 {
            let text = collapse_whitespace(&strip_tags("<div>Invoice&nbsp;&amp; <b>receipt</b></div>\n\n\t due"));
            assert_eq!(text, "Invoice & receipt due");
        }
        assert_eq!(collapse_whitespace("  a \n\n b  "), "a b");
    }

    #[test]
    fn it_maps_graph_messages() {
        let raw: GraphMessage = serde_json::from_value(serde_json::json!({
            "id": "AAMk1",
            "subject": "",
            "bodyPreview": "Preview",
            "body": {"contentType": "text", "content": "  Plain body  "},
            "toRecipients": [{"emailAddress": {"address": "bob@example.org"}}],
            "receivedDateTime": "2024-11-12T08:15:23Z",
            "hasAttachments": true
        }))
        .unwrap();
        let message = to_mail_message(raw);

        assert_eq!(message.subject, "No Subject");
        assert_eq!(message.sender_name, "Unknown");
        assert_eq!(message.body, "Plain body");
        assert_eq!(message.importance, "normal");
        assert!(message.has_attachments);
        assert_eq!(
            message.to_recipients,
            vec![Recipient {
                name: String::from("Unknown"),
                address: String::from("bob@example.org")
            }]
        );
        assert!(message.cc_recipients.is_empty());
    }

    fn message_json(id: &str, subject: &str) -> Value {
        serde_json::json!({
            "id": id,
            "subject": subject,
            "bodyPreview": "preview",
            "body": {"contentType": "html", "content": "<p>Body of </p><p>message</p>"},
            "from": {"emailAddress": {"name": "Alice", "address": "alice@example.com"}},
            "toRecipients": [],
            "ccRecipients": [],
            "receivedDateTime": "2024-11-12T08:15:23Z",
            "importance": "high",
            "hasAttachments": false
        })
    }

    #[tokio::test]
    async fn it_drains_every_page() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let first = serde_json::json!({
            "value": [message_json("1", "First"), message_json("2", "Second")],
            "@odata.nextLink": format!("{}/me/messages?$skiptoken=page2", url),
        });
        let second = serde_json::json!({
            "value": [message_json("3", "Third"), {"id": "broken"}],
        });
        let page_one = server
            .mock("GET", "/me/messages")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("$top".into(), "999".into()),
                Matcher::UrlEncoded(
                    "$filter".into(),
                    "receivedDateTime ge 2024-11-12T00:00:00Z and receivedDateTime le 2024-11-12T23:59:59Z".into(),
                ),
            ]))
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(first.to_string())
            .create_async()
            .await;
        let page_two = server
            .mock("GET", "/me/messages")
            .match_query(Matcher::UrlEncoded("$skiptoken".into(), "page2".into()))
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(second.to_string())
            .create_async()
            .await;

        let client = GraphClient::new(&url, Duration::from_secs(5)).unwrap();
        let messages = client
            .fetch_messages_by_date("token", date(), utc())
            .await
            .unwrap();

        page_one.assert_async().await;
        page_two.assert_async().await;
        let subjects: Vec<&str> = messages.iter().map(|m| m.subject.as_str()).collect();
        // The malformed item is skipped
        assert_eq!(subjects, vec!["First", "Second", "Third"]);
        assert_eq!(messages[0].sender_email, "alice@example.com");
        assert_eq!(messages[0].body, "Body of message");
    }

    #[tokio::test]
    async fn it_returns_empty_when_nothing_matches() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/me/messages")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value": []}"#)
            .create_async()
            .await;

        let client = GraphClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let messages = client
            .fetch_messages_by_date("token", date(), utc())
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn it_signals_auth_error_on_401() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/me/messages")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error": {"code": "InvalidAuthenticationToken"}}"#)
            .create_async()
            .await;

        let client = GraphClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client
            .fetch_messages_by_date("expired", date(), utc())
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<MailQaError>().unwrap().kind(), "auth");
    }

    #[tokio::test]
    async fn it_signals_fetch_error_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/me/messages")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let client = GraphClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client
            .fetch_messages_by_date("token", date(), utc())
            .await
            .unwrap_err();
        let err = err.downcast_ref::<MailQaError>().unwrap();
        assert_eq!(err.kind(), "fetch");
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn it_fetches_the_profile() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/me")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"displayName": "Ada Lovelace", "mail": null, "userPrincipalName": "ada@contoso.com"}"#,
            )
            .create_async()
            .await;

        let client = GraphClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let profile = client.me("token").await.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(profile.account(), "ada@contoso.com");
    }
}
