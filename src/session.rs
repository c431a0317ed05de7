//! A conversation with the assistant.
//!
//! [`Session`] owns the registry and dispatcher and the shared transcript and
//! code buffer. Each submitted utterance is matched against the registered
//! intents; when nothing matches it is either sent to the edit service as an
//! instruction for the current code or answered with an explicit "I don't
//! understand".

use std::sync::Arc;

use parley_edits::{
    EditError, EditRequest, EditService, FailureKind, ServiceFailure, request_edit,
};
use tracing::{debug, error, info, warn};

use crate::builtins::{HostServices, default_registry};
use crate::config::ParleyConfig;
use crate::error::Result;
use crate::intent::{CommandRegistry, Dispatcher, Invocation, Utterance};
use crate::transcript::{Author, CodeBuffer, Transcript};

/// Reply when no intent matched and no edit was attempted.
pub const NOT_UNDERSTOOD: &str =
    "I am sorry, I don't understand. Ask me for help to see what I can do.";

/// What happened to a submitted utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// One or more intents handled it.
    Handled,
    /// The edit service rewrote the code buffer.
    Edited,
    /// The edit service was asked and failed; the failure was reported.
    EditFailed,
    /// Nothing matched and no edit service was available.
    NotUnderstood,
}

/// The assistant side of a conversation.
pub struct Session {
    config: ParleyConfig,
    registry: CommandRegistry,
    dispatcher: Dispatcher,
    transcript: Transcript,
    code: CodeBuffer,
    edits: Option<Arc<dyn EditService>>,
}

impl Session {
    /// A session over an already-built registry.
    ///
    /// Handlers in `registry` are expected to report through `transcript`
    /// and `code`.
    pub fn new(
        config: ParleyConfig,
        registry: CommandRegistry,
        transcript: Transcript,
        code: CodeBuffer,
    ) -> Self {
        let dispatcher = Dispatcher::from_config(&config.engine);
        Self {
            config,
            registry,
            dispatcher,
            transcript,
            code,
            edits: None,
        }
    }

    /// A session with the built-in commands wired to `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in pattern fails to compile.
    pub fn with_builtins(config: ParleyConfig, host: Arc<dyn HostServices>) -> Result<Self> {
        let transcript = Transcript::new(&config.assistant.name, &config.assistant.user_name);
        let code = CodeBuffer::default();
        let registry = default_registry(&config, host, &transcript, &code)?;
        Ok(Self::new(config, registry, transcript, code))
    }

    /// Use `service` for utterances no intent matched, when edits are enabled.
    #[must_use]
    pub fn with_edit_service(mut self, service: Arc<dyn EditService>) -> Self {
        self.edits = Some(service);
        self
    }

    /// Handle one complete utterance from the user.
    ///
    /// Records it, dispatches it, waits for any spawned handlers and falls
    /// back to an edit or an explicit reply when nothing matched.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        self.transcript.push_user(text);
        self.transcript.set_writing(Author::Assistant);

        let utterance = Utterance::new(self.normalize(text));
        let outcome = self.dispatcher.dispatch(&self.registry, &utterance);
        let result = if outcome.is_matched() {
            outcome.settle().await;
            SubmitOutcome::Handled
        } else {
            self.fall_back(text).await
        };

        self.transcript.clear_writing();
        result
    }

    /// Offer a partial, still-being-spoken transcript to the intents that
    /// accept interim input. Returns whether anything fired.
    ///
    /// Interim text is not recorded and never reaches the edit service.
    pub async fn interim(&self, text: &str) -> bool {
        let utterance = Utterance::interim(self.normalize(text));
        let outcome = self.dispatcher.dispatch(&self.registry, &utterance);
        let matched = outcome.is_matched();
        outcome.settle().await;
        matched
    }

    /// What [`submit`](Self::submit) would invoke for `text`, without
    /// running any handler or recording anything.
    pub fn resolve(&self, text: &str) -> Vec<Invocation> {
        let utterance = Utterance::new(self.normalize(text));
        self.dispatcher.resolve(&self.registry, &utterance)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn code(&self) -> &CodeBuffer {
        &self.code
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Example phrases for the help listing.
    pub fn examples(&self) -> Vec<&str> {
        self.registry.examples()
    }

    fn normalize(&self, text: &str) -> String {
        if self.config.engine.lowercase_input {
            text.to_lowercase()
        } else {
            text.to_owned()
        }
    }

    async fn fall_back(&self, instruction: &str) -> SubmitOutcome {
        let service = self
            .edits
            .as_deref()
            .filter(|_| self.config.edits.enabled);
        let Some(service) = service else {
            debug!(input = %instruction, "nothing matched, no edit service");
            self.transcript.push_assistant(NOT_UNDERSTOOD);
            return SubmitOutcome::NotUnderstood;
        };

        let request = EditRequest::new(&self.config.edits.model, self.code.get(), instruction);
        match request_edit(service, request).await {
            Ok(code) => {
                info!(bytes = code.len(), "code edited");
                self.transcript.push_assistant(code.as_str());
                self.code.set(code);
                SubmitOutcome::Edited
            }
            Err(EditError::Service(failure)) => {
                warn!(kind = %failure.kind, message = %failure.message, "edit refused");
                self.transcript.push_assistant(failure_message(&failure));
                SubmitOutcome::EditFailed
            }
            Err(e) => {
                error!(error = %e, "edit request failed");
                self.transcript
                    .push_assistant(format!("Something went wrong: {e}"));
                SubmitOutcome::EditFailed
            }
        }
    }
}

/// User-facing reply for a classified edit failure.
pub fn failure_message(failure: &ServiceFailure) -> String {
    match failure.kind {
        FailureKind::InsufficientQuota => {
            "I am sorry, it seems there is no more quota left to use the edit service.".to_owned()
        }
        FailureKind::InvalidEdit => {
            "I am sorry, I couldn't edit the code. Can you reformulate your request?".to_owned()
        }
        FailureKind::Other(_) => format!("Something went wrong: {}", failure.message),
    }
}
