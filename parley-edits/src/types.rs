//! Wire types for the code-edit service.
//!
//! The service is reached through a local proxy that forwards to an
//! OpenAI-style `/edits` endpoint. A reply is either an [`EditResponse`] or
//! an [`ErrorResponse`] whose `message` field is itself a JSON document
//! carrying a `type` discriminator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EditError, Result};

/// Model used for code edits unless configured otherwise.
pub const DEFAULT_EDIT_MODEL: &str = "code-davinci-edit-001";

/// A request to rewrite `input` according to a spoken or typed `instruction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    /// Model identifier.
    pub model: String,
    /// The text to edit (the current code buffer).
    pub input: String,
    /// What the user asked for, verbatim.
    pub instruction: String,
}

impl EditRequest {
    /// Build a request for `model`.
    pub fn new(
        model: impl Into<String>,
        input: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            instruction: instruction.into(),
        }
    }
}

/// One generated alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub text: String,
    pub index: u32,
    #[serde(default)]
    pub logprobs: Option<f64>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token accounting reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Successful edit payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditResponse {
    /// Object tag, `"edit"` for this endpoint.
    pub object: String,
    /// Unix timestamp of generation.
    pub created: u64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Usage,
}

/// Error payload forwarded by the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// JSON-encoded error body from the upstream service.
    pub message: String,
    /// Error class name, `"Error"` for service failures.
    pub name: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

/// Classified upstream error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The account has no quota left.
    InsufficientQuota,
    /// The model could not apply the instruction to the input.
    InvalidEdit,
    /// Any other `type` value (empty when the body had none).
    Other(String),
}

impl FailureKind {
    /// Classify an upstream `type` string.
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "insufficient_quota" => Self::InsufficientQuota,
            "invalid_edit" => Self::InvalidEdit,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::InsufficientQuota => "insufficient_quota",
            Self::InvalidEdit => "invalid_edit",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified service failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    pub kind: FailureKind,
    /// Human-readable upstream message.
    pub message: String,
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorResponse {
    /// Parse the embedded error body and classify it.
    ///
    /// A body that is not JSON is kept verbatim as the message of an
    /// [`FailureKind::Other`] failure.
    pub fn failure(&self) -> ServiceFailure {
        match serde_json::from_str::<ErrorBody>(&self.message) {
            Ok(body) => ServiceFailure {
                kind: FailureKind::from_type(body.kind.as_deref().unwrap_or_default()),
                message: body.message.unwrap_or_default(),
            },
            Err(_) => ServiceFailure {
                kind: FailureKind::Other(String::new()),
                message: self.message.clone(),
            },
        }
    }
}

/// Either side of the edit endpoint's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EditOutcome {
    Edited(EditResponse),
    Failed(ErrorResponse),
}

impl EditOutcome {
    /// Decode a raw reply body.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::Decode`] if the body matches neither shape.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| EditError::Decode(e.to_string()))
    }

    /// The first choice's text.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::Service`] for error payloads and
    /// [`EditError::EmptyResponse`] when no choice was generated.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Edited(response) => response
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.text)
                .ok_or(EditError::EmptyResponse),
            Self::Failed(error) => Err(EditError::Service(error.failure())),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    const EDIT_BODY: &str = r#"{
        "object": "edit",
        "created": 1670000000,
        "model": "code-davinci-edit-001",
        "choices": [{"text": "FROM node:18\n", "index": 0}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
    }"#;

    const QUOTA_BODY: &str = r#"{
        "message": "{\"message\":\"You exceeded your current quota\",\"type\":\"insufficient_quota\"}",
        "name": "Error",
        "statusCode": 429
    }"#;

    #[test]
    fn decodes_edit_response() {
        let outcome = EditOutcome::from_json(EDIT_BODY).expect("decode");
        match &outcome {
            EditOutcome::Edited(resp) => {
                assert_eq!(resp.object, "edit");
                assert_eq!(resp.usage.total_tokens, 20);
                assert!(resp.choices[0].logprobs.is_none());
            }
            EditOutcome::Failed(_) => panic!("expected edit response"),
        }
        assert_eq!(outcome.into_text().expect("text"), "FROM node:18\n");
    }

    #[test]
    fn decodes_error_response() {
        let outcome = EditOutcome::from_json(QUOTA_BODY).expect("decode");
        let EditOutcome::Failed(error) = outcome else {
            panic!("expected error response");
        };
        assert_eq!(error.status_code, 429);
        assert_eq!(error.name, "Error");
        let failure = error.failure();
        assert_eq!(failure.kind, FailureKind::InsufficientQuota);
        assert_eq!(failure.message, "You exceeded your current quota");
    }

    #[test]
    fn invalid_edit_is_classified() {
        let error = ErrorResponse {
            message: r#"{"message":"Could not edit text","type":"invalid_edit"}"#.into(),
            name: "Error".into(),
            status_code: 400,
        };
        assert_eq!(error.failure().kind, FailureKind::InvalidEdit);
    }

    #[test]
    fn unknown_type_is_other() {
        let error = ErrorResponse {
            message: r#"{"message":"slow down","type":"rate_limit"}"#.into(),
            name: "Error".into(),
            status_code: 429,
        };
        let failure = error.failure();
        assert_eq!(failure.kind, FailureKind::Other("rate_limit".into()));
        assert_eq!(failure.to_string(), "rate_limit: slow down");
    }

    #[test]
    fn non_json_message_is_kept_verbatim() {
        let error = ErrorResponse {
            message: "upstream unavailable".into(),
            name: "Error".into(),
            status_code: 502,
        };
        let failure = error.failure();
        assert_eq!(failure.kind, FailureKind::Other(String::new()));
        assert_eq!(failure.message, "upstream unavailable");
    }

    #[test]
    fn error_outcome_into_text_is_service_error() {
        let outcome = EditOutcome::from_json(QUOTA_BODY).expect("decode");
        let err = outcome.into_text().unwrap_err();
        assert!(matches!(
            err,
            EditError::Service(ServiceFailure {
                kind: FailureKind::InsufficientQuota,
                ..
            })
        ));
    }

    #[test]
    fn empty_choices_is_empty_response() {
        let outcome = EditOutcome::Edited(EditResponse {
            object: "edit".into(),
            created: 0,
            model: DEFAULT_EDIT_MODEL.into(),
            choices: vec![],
            usage: Usage::default(),
        });
        assert!(matches!(outcome.into_text(), Err(EditError::EmptyResponse)));
    }

    #[test]
    fn garbage_body_is_decode_error() {
        let err = EditOutcome::from_json("{\"unexpected\": true}").unwrap_err();
        assert!(err.to_string().starts_with("decode error"));
    }

    #[test]
    fn request_serializes_expected_fields() {
        let req = EditRequest::new(DEFAULT_EDIT_MODEL, "FROM alpine", "use node");
        let json = serde_json::to_value(&req).expect("serialize");
        assert_eq!(json["model"], "code-davinci-edit-001");
        assert_eq!(json["input"], "FROM alpine");
        assert_eq!(json["instruction"], "use node");
    }

    #[test]
    fn failure_kind_round_trips_wire_names() {
        for name in ["insufficient_quota", "invalid_edit", "server_error"] {
            assert_eq!(FailureKind::from_type(name).as_str(), name);
        }
    }
}
