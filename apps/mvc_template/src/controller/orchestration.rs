//! Follow-up messages the controller publishes in response to view events.

use messenger::{DispatchError, DispatchReport, Messenger};
use shared::{
    error::PayloadError,
    protocol::{topics, Payload, PayloadKind},
};

#[derive(Debug, Clone, PartialEq)]
pub struct FollowUp {
    pub topic: &'static str,
    pub payload: Option<Payload>,
}

/// Decides what, if anything, to publish after `topic` was received.
pub fn route(topic: &str, payload: Option<&Payload>) -> Result<Option<FollowUp>, PayloadError> {
    match topic {
        topics::VIEW_CHANGE_BUTTON => {
            let change = Payload::expect_kind(payload, PayloadKind::Change)?;
            Ok(Some(FollowUp {
                topic: topics::CONTROLLER_CHANGE_BUTTON,
                payload: Some(change.clone()),
            }))
        }
        _ => Ok(None),
    }
}

pub fn dispatch_follow_up(
    messenger: &Messenger,
    follow_up: FollowUp,
) -> Result<DispatchReport, DispatchError> {
    tracing::debug!(topic = follow_up.topic, "publishing controller follow-up");
    messenger.publish(follow_up.topic, follow_up.payload)
}
