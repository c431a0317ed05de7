//! Parley: a voice and text command interpreter.
//!
//! Free-form utterances (typed, or final and interim speech transcripts) are
//! matched against a registry of declared intents and routed to handlers:
//! Utterance → Dispatcher → patterns + similarity → handler, or a fallback.
//!
//! # Architecture
//!
//! - **Intent engine** ([`intent`]): pattern compiler, bigram similarity,
//!   matcher, command registry and dispatcher
//! - **Session** ([`session`]): records the conversation and falls back to a
//!   code edit (or an explicit "I don't understand") when nothing matched
//! - **Built-ins** ([`builtins`]): the stock container-assistant commands,
//!   wired to injected host capabilities
//! - **Edit seam**: request and reply shapes live in the `parley-edits` crate

pub mod builtins;
pub mod config;
pub mod error;
pub mod intent;
pub mod session;
pub mod transcript;

pub use config::ParleyConfig;
pub use error::{IntentError, Result};
pub use intent::{CommandRegistry, CommandSpec, DispatchOutcome, Dispatcher, Handler, Utterance};
pub use session::{Session, SubmitOutcome};
pub use transcript::{CodeBuffer, Transcript};
