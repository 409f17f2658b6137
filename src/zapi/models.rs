use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `GET .../status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub smartphone_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Remaining vendor fields, relayed to the UI untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Identifiers returned by the vendor for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub zaap_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl SentMessage {
    /// The id reported back to callers: the WhatsApp message id when the
    /// vendor provides one, the `zaapId` otherwise.
    pub fn reference_id(&self) -> &str {
        self.message_id.as_deref().unwrap_or(&self.zaap_id)
    }
}

#[derive(Serialize)]
pub(crate) struct SendTextBody<'a> {
    pub phone: &'a str,
    pub message: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendButtonListBody<'a> {
    pub phone: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<&'a str>,
    pub button_list: ButtonList,
}

#[derive(Serialize)]
pub(crate) struct ButtonList {
    pub buttons: Vec<super::buttons::Button>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateWebhooksBody<'a> {
    pub value: &'a str,
    pub notify_sent_by_me: bool,
}
