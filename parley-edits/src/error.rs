//! Error types for the parley-edits crate.
//!
//! Service-reported failures keep their classified kind so callers can pick
//! a user-facing message without re-parsing the payload.

use crate::types::ServiceFailure;

/// Errors that can occur while requesting a code edit.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// The edit service answered with an error payload.
    #[error("edit service error: {0}")]
    Service(ServiceFailure),

    /// The request never produced a response (connection, proxy, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The service answered successfully but returned no choices.
    #[error("edit response contained no choices")]
    EmptyResponse,
}

/// Convenience type alias for parley-edits results.
pub type Result<T> = std::result::Result<T, EditError>;
