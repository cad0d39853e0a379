//! Delivery backend for the Brevo transactional email API.

use std::time::Duration;

use async_trait::async_trait;
use daily_prompt_common::{BackendError, Contact, Mailer, OutgoingMessage};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

const SERVICE: &str = "brevo";

pub const DEFAULT_BASE_URL: &str = "https://api.brevo.com/v3";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct BrevoSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl BrevoSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct Party<'a> {
    name: &'a str,
    email: &'a str,
}

impl<'a> From<&'a Contact> for Party<'a> {
    fn from(contact: &'a Contact) -> Self {
        Self {
            name: &contact.name,
            email: &contact.email,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: Party<'a>,
    to: [Party<'a>; 1],
    subject: &'a str,
    text_content: &'a str,
}

pub struct BrevoMailer {
    client: Client,
    settings: BrevoSettings,
}

impl BrevoMailer {
    pub fn new(settings: BrevoSettings) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("daily-prompt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::transport(SERVICE, e))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/smtp/email", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), BackendError> {
        let payload = SendEmailRequest {
            sender: (&message.sender).into(),
            to: [(&message.recipient).into()],
            subject: &message.subject,
            text_content: &message.text_body,
        };

        debug!(subject = %message.subject, "sending email");
        let response = self
            .client
            .post(self.endpoint())
            .header(ACCEPT, "application/json")
            .header("api-key", &self.settings.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))?;

        let status = response.status();
        if status.as_u16() >= 300 {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::status(SERVICE, status.as_u16(), &body));
        }
        Ok(())
    }
}
