//! Seams to the external services.
//!
//! The generation and delivery providers are reached through these traits so
//! the run logic can be exercised against in-process fakes.

use async_trait::async_trait;
use thiserror::Error;

const EXCERPT_LIMIT: usize = 512;

/// Request sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPrompt {
    /// Fixed system-level instructions.
    pub instructions: String,
    /// Per-run input: date, prior questions, request for the next one.
    pub input: String,
}

/// Text generation provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Sends one request and returns the raw text output.
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, BackendError>;
}

/// Name and address pair for an email party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub sender: Contact,
    pub recipient: Contact,
    pub subject: String,
    pub text_body: String,
}

/// Transactional email provider.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &OutgoingMessage) -> Result<(), BackendError>;
}

/// Failure talking to an external service.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced an HTTP response (DNS, TLS, timeout...).
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned no text output")]
    EmptyOutput { service: &'static str },
}

impl BackendError {
    pub fn transport(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            service,
            message: err.to_string(),
        }
    }

    pub fn status(service: &'static str, status: u16, body: &str) -> Self {
        Self::Status {
            service,
            status,
            body: excerpt(body),
        }
    }

    pub fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            service,
            message: err.to_string(),
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            Self::Transport { service, .. }
            | Self::Status { service, .. }
            | Self::Decode { service, .. }
            | Self::EmptyOutput { service } => service,
        }
    }
}

/// Shortens service output for error messages and logs.
pub fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_LIMIT {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(EXCERPT_LIMIT).collect();
    cut.push('…');
    cut
}
