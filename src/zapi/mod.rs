//! Adapter for the Z-API WhatsApp gateway.
//!
//! Every call targets `/instances/{instanceId}/token/{token}/{action}` and is
//! authenticated with the account-level `Client-Token` header.
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod buttons;
pub mod client;
pub mod credentials;
pub mod models;
pub mod phone;
pub mod poller;
pub mod setup;

pub use client::ZApiClient;
pub use credentials::{ChannelCredentials, CredentialsError, CredentialsPayload};
pub use models::{ConnectionStatus, SentMessage};

#[derive(Error, Debug)]
pub enum ZApiError {
    /// Non-2xx answer from the vendor. The display form is what the UI shows.
    #[error("Erro {status}: {message}")]
    Http { status: u16, message: String },
    /// The request URL is stripped: it carries the instance token.
    #[error("{0}")]
    Transport(reqwest::Error),
    #[error("Resposta inválida da Z-API: {0}")]
    InvalidResponse(String),
    #[error("Z-API não retornou zaapId")]
    MissingMessageId,
    #[error("{0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for ZApiError {
    fn from(err: reqwest::Error) -> Self {
        ZApiError::Transport(err.without_url())
    }
}

impl ZApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ZApiError::Http { status, .. } => Some(*status),
            ZApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Outbound operations against a WhatsApp gateway instance.
#[async_trait]
pub trait WhatsAppGateway: Send + Sync {
    /// Probes the instance connection state.
    async fn test_connection(
        &self,
        credentials: &ChannelCredentials,
    ) -> Result<ConnectionStatus, ZApiError>;

    /// Fetches a fresh pairing QR code as a Base64 image string.
    async fn get_qr_code(&self, credentials: &ChannelCredentials) -> Result<String, ZApiError>;

    async fn send_text_message(
        &self,
        credentials: &ChannelCredentials,
        to: &str,
        message: &str,
    ) -> Result<SentMessage, ZApiError>;

    /// Sends an interactive button message. `buttons` is normalized with
    /// [`buttons::normalize_buttons`] before submission.
    async fn send_button_message(
        &self,
        credentials: &ChannelCredentials,
        to: &str,
        title: Option<&str>,
        message: &str,
        footer: Option<&str>,
        buttons: &[Value],
    ) -> Result<SentMessage, ZApiError>;

    async fn disconnect(&self, credentials: &ChannelCredentials) -> Result<Value, ZApiError>;

    /// Points every webhook of the instance at `url`.
    async fn configure_webhook(
        &self,
        credentials: &ChannelCredentials,
        url: &str,
    ) -> Result<Value, ZApiError>;
}
