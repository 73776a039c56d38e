use shared::{domain::SubscriptionId, error::PayloadError};
use thiserror::Error;

/// Failure reported by a [`crate::MessageHandler`].
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("follow-up publish failed: {0}")]
    Dispatch(#[source] Box<DispatchError>),
    #[error("{0}")]
    Rejected(String),
}

impl HandlerError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

impl From<DispatchError> for HandlerError {
    fn from(value: DispatchError) -> Self {
        Self::Dispatch(Box::new(value))
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler {subscription} failed on '{topic}': {source}")]
    Handler {
        topic: String,
        subscription: SubscriptionId,
        #[source]
        source: HandlerError,
    },
    #[error("nested publish of '{topic}' exceeds max dispatch depth {max_depth}")]
    DepthExceeded { topic: String, max_depth: usize },
}
