//! Turns an untagged vendor payload into a closed set of events.
//!
//! The vendor sends no discriminant, so the variant is picked by which fields
//! are present. The checks run in a fixed priority order and the first match
//! wins: a message callback also carries `status`, so it must be tested
//! before the status check.
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

const DISCONNECTED_MARKER: &str = "Device has been disconnected";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WebhookEvent {
    Message(MessageEvent),
    Status(StatusEvent),
    Disconnected(ConnectionEvent),
    Connected(ConnectionEvent),
    ChatPresence(PresenceEvent),
    DeliveryAck(AckEvent),
    Unclassified(UnclassifiedEvent),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub message_id: Option<String>,
    pub phone: Option<String>,
    pub from_me: bool,
    pub is_group: bool,
    pub chat_name: Option<String>,
    pub sender_name: Option<String>,
    pub text: Option<String>,
    pub moment: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub ids: Vec<String>,
    pub status: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEvent {
    pub instance_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    pub phone: Option<String>,
    pub presence: Presence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Available,
    Unavailable,
    Composing,
    Recording,
}

impl Presence {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "available" => Some(Presence::Available),
            "unavailable" => Some(Presence::Unavailable),
            "composing" => Some(Presence::Composing),
            "recording" => Some(Presence::Recording),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckEvent {
    pub id: String,
    pub ack: AckLevel,
}

/// Delivery acknowledgement code: 1 sent, 2 received, 3 read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckLevel {
    Sent,
    Received,
    Read,
    Other(String),
}

impl AckLevel {
    fn from_value(value: &Value) -> Self {
        let code = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        match code {
            Some(1) => AckLevel::Sent,
            Some(2) => AckLevel::Received,
            Some(3) => AckLevel::Read,
            _ => AckLevel::Other(value.to_string()),
        }
    }
}

impl fmt::Display for AckLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckLevel::Sent => f.write_str("sent"),
            AckLevel::Received => f.write_str("received"),
            AckLevel::Read => f.write_str("read"),
            AckLevel::Other(raw) => write!(f, "other({raw})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnclassifiedEvent {
    pub keys: Vec<String>,
}

impl WebhookEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookEvent::Message(_) => "message",
            WebhookEvent::Status(_) => "status",
            WebhookEvent::Disconnected(_) => "disconnected",
            WebhookEvent::Connected(_) => "connected",
            WebhookEvent::ChatPresence(_) => "chat_presence",
            WebhookEvent::DeliveryAck(_) => "delivery_ack",
            WebhookEvent::Unclassified(_) => "unclassified",
        }
    }

    /// Key identifying a redelivery of the same event, when the event has one.
    pub fn identity(&self) -> Option<String> {
        match self {
            WebhookEvent::Message(m) => m.message_id.as_ref().map(|id| format!("message:{id}")),
            WebhookEvent::Status(s) if !s.ids.is_empty() => {
                Some(format!("status:{}:{}", s.ids.join(","), s.status))
            }
            WebhookEvent::DeliveryAck(a) => Some(format!("ack:{}:{}", a.id, a.ack)),
            _ => None,
        }
    }
}

/// Classifies a webhook payload. See the module docs for the priority order.
pub fn classify(payload: &Map<String, Value>) -> WebhookEvent {
    let has = |key: &str| present(payload, key);

    // `isGroupMsg` and `ack` count even when explicitly null.
    let declared = |key: &str| payload.contains_key(key);

    if has("phone") || (has("message") && has("messageId")) || declared("isGroupMsg") {
        return WebhookEvent::Message(message_event(payload));
    }

    if has("status") && has("id") {
        return WebhookEvent::Status(StatusEvent {
            ids: ids(payload),
            status: text(payload, "status").unwrap_or_default(),
            phone: text(payload, "phone"),
        });
    }

    let connected = payload.get("connected").and_then(Value::as_bool);
    let error = text(payload, "error");

    if connected == Some(false)
        && error
            .as_deref()
            .is_some_and(|e| e.contains(DISCONNECTED_MARKER))
    {
        return WebhookEvent::Disconnected(ConnectionEvent {
            instance_id: text(payload, "instanceId"),
            error,
        });
    }

    if connected == Some(true)
        && payload.get("smartphoneConnected").and_then(Value::as_bool) == Some(true)
    {
        return WebhookEvent::Connected(ConnectionEvent {
            instance_id: text(payload, "instanceId"),
            error: None,
        });
    }

    if let Some(presence) = payload
        .get("presence")
        .and_then(Value::as_str)
        .and_then(Presence::parse)
    {
        return WebhookEvent::ChatPresence(PresenceEvent {
            phone: text(payload, "phone"),
            presence,
        });
    }

    if declared("ack") && has("id") {
        if let Some(ack) = payload.get("ack") {
            return WebhookEvent::DeliveryAck(AckEvent {
                id: text(payload, "id").unwrap_or_default(),
                ack: AckLevel::from_value(ack),
            });
        }
    }

    let mut keys: Vec<String> = payload.keys().cloned().collect();
    keys.sort();
    WebhookEvent::Unclassified(UnclassifiedEvent { keys })
}

fn message_event(payload: &Map<String, Value>) -> MessageEvent {
    // Text messages nest the body under `text.message`; some callbacks put it
    // directly in `message`.
    let body = payload
        .get("text")
        .and_then(|t| t.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| text(payload, "message"));

    MessageEvent {
        message_id: text(payload, "messageId"),
        phone: text(payload, "phone"),
        from_me: flag(payload, "fromMe"),
        is_group: flag(payload, "isGroupMsg") || flag(payload, "isGroup"),
        chat_name: text(payload, "chatName"),
        sender_name: text(payload, "senderName"),
        text: body,
        // The vendor spells it `momment`.
        moment: payload
            .get("momment")
            .or_else(|| payload.get("moment"))
            .and_then(Value::as_i64),
    }
}

fn ids(payload: &Map<String, Value>) -> Vec<String> {
    let from = |value: Option<&Value>| -> Vec<String> {
        match value {
            Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
            Some(other) => scalar(other).into_iter().collect(),
            None => Vec::new(),
        }
    };
    let mut ids = from(payload.get("ids"));
    if ids.is_empty() {
        ids = from(payload.get("id"));
    }
    ids
}

/// Key exists and is not `null`.
fn present(payload: &Map<String, Value>, key: &str) -> bool {
    payload.get(key).is_some_and(|v| !v.is_null())
}

fn text(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(scalar)
}

fn flag(payload: &Map<String, Value>, key: &str) -> bool {
    payload.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
