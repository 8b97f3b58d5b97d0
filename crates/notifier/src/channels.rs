//! Outbound HTTP channels: email via the Resend API and tenant webhooks.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::error::DeliveryError;

pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("bosun-notifier/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for every channel.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
}

#[derive(Debug, Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Clone)]
pub struct EmailClient {
    http: Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl EmailClient {
    pub fn new(http: Client, api_key: String, from: String) -> Self {
        Self::with_endpoint(http, RESEND_API_URL.to_string(), api_key, from)
    }

    pub fn with_endpoint(http: Client, endpoint: String, api_key: String, from: String) -> Self {
        Self {
            http,
            endpoint,
            api_key,
            from,
        }
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), DeliveryError> {
        let body = ResendEmail {
            from: &self.from,
            to: [to],
            subject,
            text,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        check_response(response).await
    }
}

/// Body POSTed to a tenant webhook.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: &'a str,
    pub body: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct WebhookClient {
    http: Client,
}

impl WebhookClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    pub async fn post(&self, url: &str, payload: &WebhookPayload<'_>) -> Result<(), DeliveryError> {
        let response = self.http.post(url).json(payload).send().await?;
        check_response(response).await
    }
}

async fn check_response(response: reqwest::Response) -> Result<(), DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let detail = response.text().await.unwrap_or_default();
    Err(DeliveryError::from_status(status.as_u16(), truncate(&detail, 200)))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
