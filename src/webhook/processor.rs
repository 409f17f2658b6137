use std::sync::Arc;
use tracing::{debug, info, warn};

use super::classifier::WebhookEvent;
use super::dedup::WebhookDeduplicator;
use crate::channels::{ChannelError, ChannelService, ChannelStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Handled(&'static str),
    Duplicate(&'static str),
}

/// Acts on classified webhook events of one channel.
pub struct WebhookProcessor {
    channels: Arc<ChannelService>,
    dedup: WebhookDeduplicator,
}

impl WebhookProcessor {
    pub fn new(channels: Arc<ChannelService>, dedup: WebhookDeduplicator) -> Self {
        Self { channels, dedup }
    }

    pub async fn process(
        &self,
        tenant_id: &str,
        channel_id: &str,
        event: &WebhookEvent,
    ) -> Result<WebhookOutcome, ChannelError> {
        let kind = event.kind();

        if let Some(identity) = event.identity() {
            let key = format!("{tenant_id}/{channel_id}/{identity}");
            if !self.dedup.first_delivery(&key) {
                debug!(tenant_id, channel_id, event = kind, "Duplicate webhook delivery skipped.");
                return Ok(WebhookOutcome::Duplicate(kind));
            }
        }

        match event {
            WebhookEvent::Message(message) => {
                info!(
                    tenant_id,
                    channel_id,
                    event = kind,
                    message_id = ?message.message_id,
                    from_me = message.from_me,
                    is_group = message.is_group,
                    "Message received."
                );
            }
            WebhookEvent::Status(status) => {
                info!(tenant_id, channel_id, event = kind, ids = ?status.ids, status = %status.status, "Message status changed.");
            }
            WebhookEvent::Disconnected(conn) => {
                warn!(tenant_id, channel_id, event = kind, error = ?conn.error, "Instance disconnected.");
                self.record_status(tenant_id, channel_id, ChannelStatus::Disconnected)
                    .await?;
            }
            WebhookEvent::Connected(conn) => {
                info!(tenant_id, channel_id, event = kind, instance_id = ?conn.instance_id, "Instance connected.");
                self.record_status(tenant_id, channel_id, ChannelStatus::Connected)
                    .await?;
            }
            WebhookEvent::ChatPresence(presence) => {
                debug!(tenant_id, channel_id, event = kind, presence = ?presence.presence, "Chat presence changed.");
            }
            WebhookEvent::DeliveryAck(ack) => {
                info!(tenant_id, channel_id, event = kind, id = %ack.id, ack = %ack.ack, "Delivery acknowledgement.");
            }
            WebhookEvent::Unclassified(unknown) => {
                warn!(tenant_id, channel_id, event = kind, keys = ?unknown.keys, "Unclassified webhook payload.");
            }
        }

        Ok(WebhookOutcome::Handled(kind))
    }

    /// Unknown channels are tolerated: the vendor may still call a webhook
    /// URL after its channel was removed here.
    async fn record_status(
        &self,
        tenant_id: &str,
        channel_id: &str,
        status: ChannelStatus,
    ) -> Result<(), ChannelError> {
        match self.channels.set_status(tenant_id, channel_id, status).await {
            Ok(()) => Ok(()),
            Err(ChannelError::NotFound(_)) => {
                debug!(tenant_id, channel_id, "Status event for unknown channel ignored.");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
