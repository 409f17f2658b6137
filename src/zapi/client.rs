use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::buttons::normalize_buttons;
use super::models::{
    ButtonList, ConnectionStatus, SendButtonListBody, SendTextBody, SentMessage,
    UpdateWebhooksBody,
};
use super::phone::normalize_phone;
use super::{ChannelCredentials, WhatsAppGateway, ZApiError};

const CLIENT_TOKEN_HEADER: &str = "Client-Token";

/// HTTP client for the Z-API REST interface. One attempt per call, no retry.
#[derive(Clone)]
pub struct ZApiClient {
    client: Client,
    base_url: String,
}

impl ZApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ZApiError> {
        let client = Client::builder()
            .timeout(timeout)
            // The vendor matches `Client-Token` case-sensitively.
            .http1_title_case_headers()
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, credentials: &ChannelCredentials, action: &str) -> String {
        format!(
            "{}/instances/{}/token/{}/{}",
            self.base_url,
            urlencoding::encode(credentials.instance_id()),
            urlencoding::encode(credentials.token()),
            action
        )
    }

    fn request(
        &self,
        method: Method,
        credentials: &ChannelCredentials,
        action: &str,
    ) -> RequestBuilder {
        self.client
            .request(method, self.endpoint(credentials, action))
            .header(CLIENT_TOKEN_HEADER, credentials.client_token())
    }

    async fn execute(
        &self,
        builder: RequestBuilder,
        credentials: &ChannelCredentials,
        action: &str,
    ) -> Result<Response, ZApiError> {
        let response = builder.send().await.map_err(|e| {
            let err = ZApiError::from(e);
            warn!(instance_id = %credentials.instance_id(), action, error = %err, "Z-API request failed.");
            err
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(instance_id = %credentials.instance_id(), action, status = status.as_u16(), "Z-API request succeeded.");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = vendor_error_message(&body)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "erro desconhecido".to_string());
        warn!(
            instance_id = %credentials.instance_id(),
            action,
            status = status.as_u16(),
            vendor_message = %message,
            "Z-API returned a non-success status."
        );
        Err(ZApiError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn execute_json(
        &self,
        builder: RequestBuilder,
        credentials: &ChannelCredentials,
        action: &str,
    ) -> Result<Value, ZApiError> {
        let response = self.execute(builder, credentials, action).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ZApiError::InvalidResponse(e.to_string()))
    }

    async fn submit_message(
        &self,
        builder: RequestBuilder,
        credentials: &ChannelCredentials,
        action: &str,
    ) -> Result<SentMessage, ZApiError> {
        let value = self.execute_json(builder, credentials, action).await?;
        let sent = extract_sent_message(&value)?;
        debug!(instance_id = %credentials.instance_id(), zaap_id = %sent.zaap_id, "Message accepted by Z-API.");
        Ok(sent)
    }
}

#[async_trait]
impl WhatsAppGateway for ZApiClient {
    async fn test_connection(
        &self,
        credentials: &ChannelCredentials,
    ) -> Result<ConnectionStatus, ZApiError> {
        let builder = self.request(Method::GET, credentials, "status");
        let value = self.execute_json(builder, credentials, "status").await?;
        serde_json::from_value(value).map_err(|e| ZApiError::InvalidResponse(e.to_string()))
    }

    async fn get_qr_code(&self, credentials: &ChannelCredentials) -> Result<String, ZApiError> {
        let builder = self.request(Method::GET, credentials, "qr-code/image");
        let response = self.execute(builder, credentials, "qr-code/image").await?;
        let body = response.text().await?;
        extract_qr_code(&body)
    }

    async fn send_text_message(
        &self,
        credentials: &ChannelCredentials,
        to: &str,
        message: &str,
    ) -> Result<SentMessage, ZApiError> {
        let phone = normalize_phone(to);
        if phone.is_empty() {
            return Err(ZApiError::InvalidInput("Telefone inválido".to_string()));
        }
        let builder = self
            .request(Method::POST, credentials, "send-text")
            .json(&SendTextBody {
                phone: &phone,
                message,
            });
        self.submit_message(builder, credentials, "send-text").await
    }

    async fn send_button_message(
        &self,
        credentials: &ChannelCredentials,
        to: &str,
        title: Option<&str>,
        message: &str,
        footer: Option<&str>,
        buttons: &[Value],
    ) -> Result<SentMessage, ZApiError> {
        let phone = normalize_phone(to);
        if phone.is_empty() {
            return Err(ZApiError::InvalidInput("Telefone inválido".to_string()));
        }
        let builder = self
            .request(Method::POST, credentials, "send-button-list")
            .json(&SendButtonListBody {
                phone: &phone,
                message,
                title,
                footer,
                button_list: ButtonList {
                    buttons: normalize_buttons(buttons),
                },
            });
        self.submit_message(builder, credentials, "send-button-list")
            .await
    }

    async fn disconnect(&self, credentials: &ChannelCredentials) -> Result<Value, ZApiError> {
        let builder = self.request(Method::GET, credentials, "disconnect");
        self.execute_json(builder, credentials, "disconnect").await
    }

    async fn configure_webhook(
        &self,
        credentials: &ChannelCredentials,
        url: &str,
    ) -> Result<Value, ZApiError> {
        let builder = self
            .request(Method::PUT, credentials, "update-every-webhooks")
            .json(&UpdateWebhooksBody {
                value: url,
                notify_sent_by_me: true,
            });
        self.execute_json(builder, credentials, "update-every-webhooks")
            .await
    }
}

/// Picks the human-readable part of a vendor error body.
fn vendor_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
        return ["message", "error"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| Some(trimmed.to_string()));
    }
    Some(trimmed.to_string())
}

/// The image endpoint answers with either the bare Base64 string or
/// `{"value": "<base64>"}`.
fn extract_qr_code(body: &str) -> Result<String, ZApiError> {
    let trimmed = body.trim();
    let qr = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(obj)) => obj
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ZApiError::InvalidResponse("QR code ausente na resposta".to_string()))?,
        Ok(Value::String(s)) => s,
        _ => trimmed.to_string(),
    };
    if qr.is_empty() {
        return Err(ZApiError::InvalidResponse("QR code vazio".to_string()));
    }
    Ok(qr)
}

/// A send is successful only when the vendor hands back a `zaapId`.
fn extract_sent_message(value: &Value) -> Result<SentMessage, ZApiError> {
    let text = |key: &str| match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let zaap_id = text("zaapId").ok_or(ZApiError::MissingMessageId)?;
    Ok(SentMessage {
        zaap_id,
        message_id: text("messageId").or_else(|| text("id")),
    })
}
