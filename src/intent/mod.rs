//! The intent-matching engine.
//!
//! Utterance → [`Dispatcher`] → (per command) compiled patterns + matcher →
//! candidates → selection → handler invocation, or
//! [`DispatchOutcome::Exhausted`].
//!
//! ```
//! use parley::intent::{CommandRegistry, CommandSpec, Dispatcher, Handler, HandlerArgs};
//!
//! let registry = CommandRegistry::new()
//!     .with(CommandSpec::new(
//!         ["*open the * tab*"],
//!         Handler::new(|args: HandlerArgs| {
//!             assert_eq!(args.parameter(1), Some("volumes"));
//!         }),
//!     ))
//!     .expect("valid pattern");
//!
//! let outcome = Dispatcher::default().dispatch(&registry, &"open the volumes tab".into());
//! assert!(outcome.is_matched());
//! ```

pub mod cache;
pub mod dispatcher;
pub mod matcher;
pub mod pattern;
pub mod registry;
pub mod similarity;

pub use dispatcher::{
    DispatchOutcome, Dispatcher, HandlerArgs, InputReset, Invocation, MatchContext, Utterance,
};
pub use matcher::{MatchCandidate, try_match};
pub use pattern::{CompiledPattern, PatternSource, compile, despecialize};
pub use registry::{
    CommandRegistry, CommandSpec, DEFAULT_FUZZY_THRESHOLD, Handler, HandlerFuture, MatchMode,
    RegisteredCommand,
};
pub use similarity::similarity;
