use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A button in the shape the vendor requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Button {
    pub button_id: String,
    pub button_text: ButtonText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonText {
    pub display_text: String,
}

impl Button {
    pub fn new(button_id: impl Into<String>, display_text: impl Into<String>) -> Self {
        Self {
            button_id: button_id.into(),
            button_text: ButtonText {
                display_text: display_text.into(),
            },
        }
    }
}

/// Converts loosely-typed buttons into the vendor shape.
///
/// Accepted inputs, checked in order:
/// 1. `{buttonText: {displayText}}` passes through; a missing `buttonId`
///    becomes the positional `btn_{n}`.
/// 2. `{buttonText: "..."}` is wrapped, keeping `buttonId` when given.
/// 3. Anything else (`"Sim"`, `{text}`, `{title}`, `{label}`) gets a
///    positional id `btn_{n}`.
pub fn normalize_buttons(buttons: &[Value]) -> Vec<Button> {
    buttons
        .iter()
        .enumerate()
        .map(|(index, button)| normalize_button(index, button))
        .collect()
}

fn normalize_button(index: usize, button: &Value) -> Button {
    let positional_id = format!("btn_{}", index + 1);

    if let Some(obj) = button.as_object() {
        let given_id = obj.get("buttonId").and_then(scalar_text);

        match obj.get("buttonText") {
            Some(Value::Object(text)) => {
                if let Some(display) = text.get("displayText").and_then(scalar_text) {
                    return Button::new(given_id.unwrap_or(positional_id), display);
                }
            }
            Some(Value::String(display)) => {
                return Button::new(given_id.unwrap_or(positional_id), display.clone());
            }
            _ => {}
        }

        let display = ["text", "title", "label"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(scalar_text));
        return Button::new(positional_id, display.unwrap_or_else(|| fallback_text(index)));
    }

    let display = scalar_text(button).unwrap_or_else(|| fallback_text(index));
    Button::new(positional_id, display)
}

fn fallback_text(index: usize) -> String {
    format!("Opção {}", index + 1)
}

/// Non-empty string or number rendered as text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
