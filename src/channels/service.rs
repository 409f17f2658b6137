use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::encryption::{ConfigCipher, EncryptionError};
use super::models::{
    ChannelResponse, ChannelStatus, ChannelType, CreateChannelRequest, MarketingChannel,
};
use super::store::ChannelStore;
use crate::zapi::{ChannelCredentials, CredentialsError};

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel not found: {0}")]
    NotFound(String),
    #[error("Channel already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid channel: {0}")]
    InvalidInput(String),
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(#[from] CredentialsError),
    #[error("Encryption error: {0}")]
    EncryptionError(#[from] EncryptionError),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Channel records with credentials encrypted at rest.
pub struct ChannelService {
    store: Arc<dyn ChannelStore>,
    cipher: ConfigCipher,
}

impl ChannelService {
    pub fn new(store: Arc<dyn ChannelStore>, cipher: ConfigCipher) -> Self {
        Self { store, cipher }
    }

    pub async fn create_channel(
        &self,
        tenant_id: &str,
        payload: CreateChannelRequest,
    ) -> Result<ChannelResponse, ChannelError> {
        let name = payload.name.trim().to_string();
        if name.is_empty() {
            return Err(ChannelError::InvalidInput("name is required".to_string()));
        }
        let credentials = ChannelCredentials::try_from(payload.configuration)?;
        let configuration = self.cipher.encrypt(&serde_json::to_vec(&credentials)?)?;

        let now = Utc::now();
        let channel = MarketingChannel {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name,
            channel_type: ChannelType::WhatsappZapi,
            configuration,
            status: ChannelStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let response = ChannelResponse::from(&channel);
        self.store.insert(channel).await?;

        info!(tenant_id, channel_id = %response.id, instance_id = %credentials.instance_id(), "Marketing channel created.");
        Ok(response)
    }

    pub async fn list_channels(&self, tenant_id: &str) -> Result<Vec<ChannelResponse>, ChannelError> {
        let channels = self.store.list(tenant_id).await?;
        Ok(channels.iter().map(ChannelResponse::from).collect())
    }

    pub async fn get_channel(
        &self,
        tenant_id: &str,
        channel_id: &str,
    ) -> Result<ChannelResponse, ChannelError> {
        let channel = self.load(tenant_id, channel_id).await?;
        Ok(ChannelResponse::from(&channel))
    }

    pub async fn delete_channel(&self, tenant_id: &str, channel_id: &str) -> Result<(), ChannelError> {
        if !self.store.delete(tenant_id, channel_id).await? {
            return Err(ChannelError::NotFound(channel_id.to_string()));
        }
        info!(tenant_id, channel_id, "Marketing channel deleted.");
        Ok(())
    }

    /// Decrypts and validates the stored credentials of a channel.
    pub async fn credentials_for(
        &self,
        tenant_id: &str,
        channel_id: &str,
    ) -> Result<ChannelCredentials, ChannelError> {
        let channel = self.load(tenant_id, channel_id).await?;
        let plaintext = self.cipher.decrypt(&channel.configuration)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub async fn set_status(
        &self,
        tenant_id: &str,
        channel_id: &str,
        status: ChannelStatus,
    ) -> Result<(), ChannelError> {
        if !self.store.update_status(tenant_id, channel_id, status).await? {
            return Err(ChannelError::NotFound(channel_id.to_string()));
        }
        info!(tenant_id, channel_id, status = ?status, "Channel status updated.");
        Ok(())
    }

    async fn load(&self, tenant_id: &str, channel_id: &str) -> Result<MarketingChannel, ChannelError> {
        self.store
            .get(tenant_id, channel_id)
            .await?
            .ok_or_else(|| ChannelError::NotFound(channel_id.to_string()))
    }
}
