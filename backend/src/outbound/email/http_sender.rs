//! Reqwest-backed transactional email adapter.
//!
//! Owns transport details only: request shape, bearer authentication, timeout
//! and status mapping. Throttling and server errors are transient; other 4xx
//! responses are rejections.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::EmailAddress;
use crate::domain::ports::{EmailSendError, EmailSender, EmailTemplate};

const USER_AGENT: &str = concat!("waitlist/", env!("CARGO_PKG_VERSION"));
const PREVIEW_CHAR_LIMIT: usize = 160;

/// Provider endpoint and credentials.
#[derive(Clone)]
pub struct HttpEmailSenderConfig {
    /// Template send endpoint.
    pub endpoint: Url,
    /// Bearer token, if the provider needs one.
    pub api_key: Option<String>,
    /// `from` address.
    pub sender: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

/// Sends template emails through an HTTP API.
pub struct HttpEmailSender {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    sender: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    template: &'a str,
    data: &'a Value,
}

impl HttpEmailSender {
    /// Build the adapter.
    ///
    /// # Errors
    ///
    /// Fails when the reqwest client cannot be constructed.
    pub fn new(config: HttpEmailSenderConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint,
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            sender: config.sender,
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(
        &self,
        to: &EmailAddress,
        template: EmailTemplate,
        data: &Value,
    ) -> Result<(), EmailSendError> {
        let body = SendRequest {
            from: &self.sender,
            to: to.as_str(),
            template: template.id(),
            data,
        };
        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| EmailSendError::transport(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            debug!(template = template.id(), status = status.as_u16(), "email accepted");
            return Ok(());
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(map_status_error(status, body.as_ref()))
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> EmailSendError {
    let preview = body_preview(body);
    let message = if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        preview
    };
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            EmailSendError::transport(message)
        }
        _ if status.is_client_error() => EmailSendError::rejected(status.as_u16(), message),
        _ => EmailSendError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(PREVIEW_CHAR_LIMIT)
        .collect()
}
