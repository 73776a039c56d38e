//! Log lines for messages the controller receives.

use shared::{domain::Topic, protocol::Payload};

pub const NO_DATA: &str = "No data sent";

/// A JSON `null` payload counts as no data.
pub fn received_line(topic: &str, payload: Option<&Payload>) -> String {
    match payload {
        None | Some(Payload::Json(serde_json::Value::Null)) => {
            format!("MSG: received by controller: {topic} | {NO_DATA}")
        }
        Some(payload) => format!("MSG: received by controller: {topic} | {payload}"),
    }
}

/// Sender role for structured log fields; "unknown" when the topic does not
/// follow the `role:event` convention.
pub fn sender_label(topic: &str) -> &'static str {
    Topic::from(topic)
        .role()
        .map(|role| role.as_str())
        .unwrap_or("unknown")
}
