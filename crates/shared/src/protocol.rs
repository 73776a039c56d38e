use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Direction, ModelField},
    error::PayloadError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub field: ModelField,
    pub direction: Direction,
}

impl fmt::Display for ChangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field.as_str(), self.direction.as_str())
    }
}

/// Data carried next to a topic. The bus never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Payload {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Change(ChangeRequest),
    Json(serde_json::Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Bool,
    Int,
    Float,
    Text,
    Change,
    Json,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Change => "change",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Bool(_) => PayloadKind::Bool,
            Self::Int(_) => PayloadKind::Int,
            Self::Float(_) => PayloadKind::Float,
            Self::Text(_) => PayloadKind::Text,
            Self::Change(_) => PayloadKind::Change,
            Self::Json(_) => PayloadKind::Json,
        }
    }

    /// Checks a received payload against the kind the receiver handles.
    pub fn expect_kind(
        payload: Option<&Payload>,
        expected: PayloadKind,
    ) -> Result<&Payload, PayloadError> {
        match payload {
            None => Err(PayloadError::Missing { expected }),
            Some(payload) if payload.kind() == expected => Ok(payload),
            Some(payload) => Err(PayloadError::Mismatch {
                expected,
                found: payload.kind(),
            }),
        }
    }

    pub fn as_change(&self) -> Option<ChangeRequest> {
        match self {
            Self::Change(change) => Some(*change),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Change(change) => write!(f, "{change}"),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ChangeRequest> for Payload {
    fn from(value: ChangeRequest) -> Self {
        Self::Change(value)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Topic vocabulary of the template app and the payload each one carries.
pub mod topics {
    use crate::domain::{ModelField, SenderRole};

    use super::PayloadKind;

    pub const VIEW_BUTTON_CLICK: &str = "view:buttonClick";
    pub const VIEW_TOGGLE_BUTTON_CLICK: &str = "view:toggleButtonClick";
    pub const VIEW_CHANGE_BUTTON: &str = "view:changeButton";
    pub const CONTROLLER_CHANGE_BUTTON: &str = "controller:changeButton";
    pub const MODEL_VARIABLE1_CHANGED: &str = "model:variable1Changed";
    pub const MODEL_VARIABLE2_CHANGED: &str = "model:variable2Changed";

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TopicSpec {
        pub topic: &'static str,
        pub sender: SenderRole,
        pub payload: Option<PayloadKind>,
        pub summary: &'static str,
    }

    pub const CATALOGUE: &[TopicSpec] = &[
        TopicSpec {
            topic: VIEW_BUTTON_CLICK,
            sender: SenderRole::View,
            payload: None,
            summary: "regular button clicked",
        },
        TopicSpec {
            topic: VIEW_TOGGLE_BUTTON_CLICK,
            sender: SenderRole::View,
            payload: Some(PayloadKind::Bool),
            summary: "toggle button clicked; carries the new toggle state",
        },
        TopicSpec {
            topic: VIEW_CHANGE_BUTTON,
            sender: SenderRole::View,
            payload: Some(PayloadKind::Change),
            summary: "up/down button clicked for a model variable",
        },
        TopicSpec {
            topic: CONTROLLER_CHANGE_BUTTON,
            sender: SenderRole::Controller,
            payload: Some(PayloadKind::Change),
            summary: "asks the model to change a variable",
        },
        TopicSpec {
            topic: MODEL_VARIABLE1_CHANGED,
            sender: SenderRole::Model,
            payload: Some(PayloadKind::Int),
            summary: "variable1 has a new value",
        },
        TopicSpec {
            topic: MODEL_VARIABLE2_CHANGED,
            sender: SenderRole::Model,
            payload: Some(PayloadKind::Int),
            summary: "variable2 has a new value",
        },
    ];

    /// Topics the controller listens to unless configured otherwise.
    pub const CONTROLLER_DEFAULTS: &[&str] =
        &[VIEW_TOGGLE_BUTTON_CLICK, VIEW_BUTTON_CLICK, VIEW_CHANGE_BUTTON];

    pub fn lookup(topic: &str) -> Option<&'static TopicSpec> {
        CATALOGUE.iter().find(|spec| spec.topic == topic)
    }

    /// Payload kind documented for `topic`. `None` both for unknown topics and
    /// for topics that carry no payload; use [`lookup`] to tell them apart.
    pub fn expected_payload(topic: &str) -> Option<PayloadKind> {
        lookup(topic).and_then(|spec| spec.payload)
    }

    pub fn changed_topic(field: ModelField) -> &'static str {
        match field {
            ModelField::Variable1 => MODEL_VARIABLE1_CHANGED,
            ModelField::Variable2 => MODEL_VARIABLE2_CHANGED,
        }
    }

    pub fn field_for_changed_topic(topic: &str) -> Option<ModelField> {
        match topic {
            MODEL_VARIABLE1_CHANGED => Some(ModelField::Variable1),
            MODEL_VARIABLE2_CHANGED => Some(ModelField::Variable2),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_display_is_plain_value() {
        assert_eq!(Payload::Int(42).to_string(), "42");
        assert_eq!(Payload::from("clicked").to_string(), "clicked");
        assert_eq!(Payload::Bool(true).to_string(), "true");
        let change = ChangeRequest {
            field: ModelField::Variable2,
            direction: Direction::Down,
        };
        assert_eq!(Payload::Change(change).to_string(), "variable2 down");
        assert_eq!(
            Payload::Json(serde_json::json!({"a": 1})).to_string(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let json = serde_json::to_value(Payload::Int(7)).expect("serialize");
        assert_eq!(json, serde_json::json!({"type": "int", "value": 7}));

        let change: Payload = serde_json::from_value(serde_json::json!({
            "type": "change",
            "value": {"field": "variable1", "direction": "up"}
        }))
        .expect("deserialize");
        assert_eq!(
            change.as_change(),
            Some(ChangeRequest {
                field: ModelField::Variable1,
                direction: Direction::Up,
            })
        );
    }

    #[test]
    fn expect_kind_reports_missing_and_mismatch() {
        assert_eq!(
            Payload::expect_kind(None, PayloadKind::Int),
            Err(PayloadError::Missing {
                expected: PayloadKind::Int
            })
        );
        let text = Payload::from("x");
        assert_eq!(
            Payload::expect_kind(Some(&text), PayloadKind::Int),
            Err(PayloadError::Mismatch {
                expected: PayloadKind::Int,
                found: PayloadKind::Text
            })
        );
        let int = Payload::Int(3);
        assert_eq!(
            Payload::expect_kind(Some(&int), PayloadKind::Int),
            Ok(&int)
        );
    }

    #[test]
    fn catalogue_documents_template_topics() {
        assert_eq!(
            topics::expected_payload(topics::VIEW_CHANGE_BUTTON),
            Some(PayloadKind::Change)
        );
        assert!(topics::lookup(topics::VIEW_BUTTON_CLICK).is_some());
        assert_eq!(topics::expected_payload(topics::VIEW_BUTTON_CLICK), None);
        assert!(topics::lookup("unknown:topic").is_none());
        for topic in topics::CONTROLLER_DEFAULTS {
            assert!(topics::lookup(topic).is_some(), "{topic} not catalogued");
        }
    }
}
