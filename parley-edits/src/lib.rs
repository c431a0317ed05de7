//! # parley-edits
//!
//! Request and response shapes for Parley's code-edit fallback.
//!
//! When no voice intent matches, Parley can hand the utterance to a
//! generative edit service as an instruction to apply to the current code
//! buffer. This crate defines what goes over that seam and how the
//! service's error payloads are classified; the transport itself belongs to
//! the host application.
//!
//! ## Error payloads
//!
//! The service proxy wraps upstream failures as
//! `{ "message": "<json>", "name": "Error", "statusCode": 429 }` where the
//! embedded JSON carries a `type` such as `insufficient_quota` or
//! `invalid_edit`. [`ErrorResponse::failure`] decodes and classifies it.

pub mod error;
pub mod service;
pub mod types;

pub use error::{EditError, Result};
pub use service::{request_edit, EditService};
pub use types::{
    CompletionChoice, EditOutcome, EditRequest, EditResponse, ErrorResponse, FailureKind,
    ServiceFailure, Usage, DEFAULT_EDIT_MODEL,
};
