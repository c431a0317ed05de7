//! The edit-service seam.
//!
//! Parley never talks to the network itself. The host application supplies
//! an [`EditService`] (a proxy client, a local model, a test double) and the
//! session calls it when no intent matched.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::types::{EditOutcome, EditRequest};

/// Something that can apply an instruction to a piece of text.
#[async_trait]
pub trait EditService: Send + Sync {
    /// Send `request` and return the decoded reply.
    ///
    /// Service-level failures come back as [`EditOutcome::Failed`]; only
    /// transport or decoding problems are `Err`.
    async fn edit(&self, request: EditRequest) -> Result<EditOutcome>;
}

/// Request an edit and reduce the reply to the generated text.
///
/// # Errors
///
/// Propagates transport errors from `service` and the classified failures of
/// [`EditOutcome::into_text`].
pub async fn request_edit(service: &dyn EditService, request: EditRequest) -> Result<String> {
    debug!(model = %request.model, input_len = request.input.len(), "requesting code edit");
    let outcome = service.edit(request).await?;
    outcome.into_text()
}
