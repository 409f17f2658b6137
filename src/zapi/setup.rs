use serde::Serialize;
use tracing::{info, warn};

use super::{ChannelCredentials, WhatsAppGateway};

/// Outcome of bringing a channel online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelSetup {
    Connected {
        message: String,
    },
    NeedQrcode {
        #[serde(rename = "qrCode")]
        qr_code: String,
    },
    Error {
        message: String,
    },
}

/// Checks the instance and, when it is not paired yet, fetches a QR code.
///
/// Two sequential vendor calls; nothing is remembered between invocations.
pub async fn setup_channel(
    gateway: &dyn WhatsAppGateway,
    credentials: &ChannelCredentials,
) -> ChannelSetup {
    let status = match gateway.test_connection(credentials).await {
        Ok(status) => status,
        Err(e) => {
            warn!(instance_id = %credentials.instance_id(), error = %e, "Channel setup failed at status check.");
            return ChannelSetup::Error {
                message: e.to_string(),
            };
        }
    };

    if status.connected {
        info!(instance_id = %credentials.instance_id(), "Channel already connected.");
        return ChannelSetup::Connected {
            message: "Canal conectado".to_string(),
        };
    }

    match gateway.get_qr_code(credentials).await {
        Ok(qr_code) => {
            info!(instance_id = %credentials.instance_id(), "Channel needs QR code pairing.");
            ChannelSetup::NeedQrcode { qr_code }
        }
        Err(e) => {
            warn!(instance_id = %credentials.instance_id(), error = %e, "Channel setup failed fetching QR code.");
            ChannelSetup::Error {
                message: e.to_string(),
            }
        }
    }
}
