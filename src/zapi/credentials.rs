use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("instanceId é obrigatório")]
    MissingInstanceId,
    #[error("token é obrigatório")]
    MissingToken,
}

/// Vendor-issued credentials of one Z-API instance.
///
/// `instance_id` and `token` are never blank. `client_token` may be empty,
/// the header is sent regardless.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CredentialsPayload")]
pub struct ChannelCredentials {
    instance_id: String,
    token: String,
    client_token: String,
}

impl ChannelCredentials {
    pub fn new(
        instance_id: impl Into<String>,
        token: impl Into<String>,
        client_token: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let instance_id = instance_id.into().trim().to_string();
        let token = token.into().trim().to_string();
        if instance_id.is_empty() {
            return Err(CredentialsError::MissingInstanceId);
        }
        if token.is_empty() {
            return Err(CredentialsError::MissingToken);
        }
        Ok(Self {
            instance_id,
            token,
            client_token: client_token.into().trim().to_string(),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn client_token(&self) -> &str {
        &self.client_token
    }
}

impl fmt::Debug for ChannelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCredentials")
            .field("instance_id", &self.instance_id)
            .field("token", &"***")
            .field("client_token", &"***")
            .finish()
    }
}

/// Loosely-typed credentials as they arrive from the UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsPayload {
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub client_token: Option<String>,
}

impl TryFrom<CredentialsPayload> for ChannelCredentials {
    type Error = CredentialsError;

    fn try_from(payload: CredentialsPayload) -> Result<Self, Self::Error> {
        ChannelCredentials::new(
            payload.instance_id.unwrap_or_default(),
            payload.token.unwrap_or_default(),
            payload.client_token.unwrap_or_default(),
        )
    }
}
