use thiserror::Error;

use crate::protocol::PayloadKind;

/// Raised by a receiver whose topic carried a different payload than it handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("expected {expected} payload, got none")]
    Missing { expected: PayloadKind },
    #[error("expected {expected} payload, got {found}")]
    Mismatch {
        expected: PayloadKind,
        found: PayloadKind,
    },
}
