use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::models::{ChannelStatus, MarketingChannel};
use super::service::ChannelError;

/// Persistence seam for marketing channels, scoped by tenant.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn insert(&self, channel: MarketingChannel) -> Result<(), ChannelError>;

    async fn get(
        &self,
        tenant_id: &str,
        channel_id: &str,
    ) -> Result<Option<MarketingChannel>, ChannelError>;

    /// Channels of a tenant, oldest first.
    async fn list(&self, tenant_id: &str) -> Result<Vec<MarketingChannel>, ChannelError>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, tenant_id: &str, channel_id: &str) -> Result<bool, ChannelError>;

    /// Returns `false` when the channel does not exist.
    async fn update_status(
        &self,
        tenant_id: &str,
        channel_id: &str,
        status: ChannelStatus,
    ) -> Result<bool, ChannelError>;
}

type ChannelKey = (String, String);

#[derive(Default)]
pub struct InMemoryChannelStore {
    channels: DashMap<ChannelKey, MarketingChannel>,
}

impl InMemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tenant_id: &str, channel_id: &str) -> ChannelKey {
        (tenant_id.to_string(), channel_id.to_string())
    }
}

#[async_trait]
impl ChannelStore for InMemoryChannelStore {
    async fn insert(&self, channel: MarketingChannel) -> Result<(), ChannelError> {
        let key = Self::key(&channel.tenant_id, &channel.id);
        if self.channels.contains_key(&key) {
            return Err(ChannelError::AlreadyExists(channel.id));
        }
        self.channels.insert(key, channel);
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: &str,
        channel_id: &str,
    ) -> Result<Option<MarketingChannel>, ChannelError> {
        Ok(self
            .channels
            .get(&Self::key(tenant_id, channel_id))
            .map(|entry| entry.value().clone()))
    }

    async fn list(&self, tenant_id: &str) -> Result<Vec<MarketingChannel>, ChannelError> {
        let mut channels: Vec<MarketingChannel> = self
            .channels
            .iter()
            .filter(|entry| entry.key().0 == tenant_id)
            .map(|entry| entry.value().clone())
            .collect();
        channels.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(channels)
    }

    async fn delete(&self, tenant_id: &str, channel_id: &str) -> Result<bool, ChannelError> {
        Ok(self
            .channels
            .remove(&Self::key(tenant_id, channel_id))
            .is_some())
    }

    async fn update_status(
        &self,
        tenant_id: &str,
        channel_id: &str,
        status: ChannelStatus,
    ) -> Result<bool, ChannelError> {
        match self.channels.get_mut(&Self::key(tenant_id, channel_id)) {
            Some(mut entry) => {
                entry.status = status;
                entry.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
