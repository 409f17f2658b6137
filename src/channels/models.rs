use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::zapi::CredentialsPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    WhatsappZapi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Pending,
    NeedQrcode,
    Connected,
    Disconnected,
    Error,
}

/// Stored marketing channel. `configuration` holds the encrypted credentials.
#[derive(Debug, Clone)]
pub struct MarketingChannel {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub channel_type: ChannelType,
    pub configuration: Vec<u8>,
    pub status: ChannelStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// API request body for creating a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelRequest {
    pub name: String,
    pub configuration: CredentialsPayload,
}

/// API response for a channel. Never carries the credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResponse {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub channel_type: ChannelType,
    pub status: ChannelStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&MarketingChannel> for ChannelResponse {
    fn from(channel: &MarketingChannel) -> Self {
        Self {
            id: channel.id.clone(),
            tenant_id: channel.tenant_id.clone(),
            name: channel.name.clone(),
            channel_type: channel.channel_type,
            status: channel.status,
            created_at: channel.created_at,
            updated_at: channel.updated_at,
        }
    }
}
