//! Selecting and invoking the command for an utterance.
//!
//! # Policy
//!
//! For each registered command, in order, every pattern is tried. A fuzzy
//! command marked best-match-only keeps only its most similar candidate
//! (ties keep declaration order); otherwise each matching pattern is its own
//! invocation, exact commands included.
//!
//! - **First match** (`stop_on_first_match = true`, the default): the first
//!   command with any candidate wins and the walk stops.
//! - **All match**: every command with a candidate fires.
//!
//! Nothing matching anywhere is [`DispatchOutcome::Exhausted`], a normal
//! outcome the caller is expected to handle (fall back to a code edit, or say
//! it did not understand).

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::intent::matcher::{MatchCandidate, try_match};
use crate::intent::pattern::PatternSource;
use crate::intent::registry::{
    CommandRegistry, Handler, HandlerFuture, MatchMode, RegisteredCommand,
};

/// Callback that clears the upstream input buffer (e.g. the accumulated
/// speech transcript).
pub type InputReset = Arc<dyn Fn() + Send + Sync>;

/// Context handed to every handler alongside its arguments.
#[derive(Clone)]
pub struct MatchContext {
    matched_pattern: PatternSource,
    reset: Option<InputReset>,
}

impl MatchContext {
    /// The pattern that fired.
    pub fn matched_pattern(&self) -> &PatternSource {
        &self.matched_pattern
    }

    /// Ask the input producer to drop what it has buffered so far.
    /// No-op when the utterance carried no reset hook.
    pub fn reset_input_buffer(&self) {
        if let Some(reset) = &self.reset {
            reset();
        }
    }
}

impl fmt::Debug for MatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchContext")
            .field("matched_pattern", &self.matched_pattern)
            .field("has_reset", &self.reset.is_some())
            .finish()
    }
}

/// Arguments passed to a handler.
#[derive(Debug, Clone)]
pub enum HandlerArgs {
    /// From an exact match: captures in pattern order.
    Exact {
        parameters: Vec<String>,
        context: MatchContext,
    },
    /// From a fuzzy match: the phrase that was compared, the raw input and
    /// the similarity score.
    Fuzzy {
        phrase: String,
        input: String,
        similarity: f64,
        context: MatchContext,
    },
}

impl HandlerArgs {
    pub fn context(&self) -> &MatchContext {
        match self {
            Self::Exact { context, .. } | Self::Fuzzy { context, .. } => context,
        }
    }

    /// Positional capture `index`; always `None` for fuzzy matches.
    pub fn parameter(&self, index: usize) -> Option<&str> {
        match self {
            Self::Exact { parameters, .. } => parameters.get(index).map(String::as_str),
            Self::Fuzzy { .. } => None,
        }
    }
}

/// One piece of input to dispatch.
#[derive(Clone)]
pub struct Utterance {
    text: String,
    interim: bool,
    reset: Option<InputReset>,
}

impl Utterance {
    /// A final (complete) utterance.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            interim: false,
            reset: None,
        }
    }

    /// An interim transcript; only commands registered with
    /// `match_interim` are considered.
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            interim: true,
            ..Self::new(text)
        }
    }

    /// Attach the hook exposed to handlers as
    /// [`MatchContext::reset_input_buffer`].
    #[must_use]
    pub fn with_reset<F>(mut self, reset: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.reset = Some(Arc::new(reset));
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_interim(&self) -> bool {
        self.interim
    }
}

impl fmt::Debug for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Utterance")
            .field("text", &self.text)
            .field("interim", &self.interim)
            .finish_non_exhaustive()
    }
}

impl From<&str> for Utterance {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// A selected candidate and the command it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Index of the command in the registry.
    pub command: usize,
    pub candidate: MatchCandidate,
}

/// Result of dispatching one utterance.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// At least one handler was invoked.
    Matched {
        invocations: Vec<Invocation>,
        /// Async handlers still running.
        pending: Vec<JoinHandle<()>>,
    },
    /// No registered command matched.
    Exhausted,
}

impl DispatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    pub fn invocations(&self) -> &[Invocation] {
        match self {
            Self::Matched { invocations, .. } => invocations,
            Self::Exhausted => &[],
        }
    }

    /// Distinct registry indices that fired, in order.
    pub fn commands(&self) -> Vec<usize> {
        let mut commands: Vec<usize> = self.invocations().iter().map(|i| i.command).collect();
        commands.dedup();
        commands
    }

    /// Wait for all spawned handlers to finish.
    ///
    /// A handler that panicked re-raises its panic here, in the caller.
    pub async fn settle(self) {
        if let Self::Matched { pending, .. } = self {
            for handle in pending {
                if let Err(e) = handle.await
                    && e.is_panic()
                {
                    std::panic::resume_unwind(e.into_panic());
                }
            }
        }
    }
}

/// Walks a registry and invokes the winning handlers.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    stop_on_first_match: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Dispatcher {
    pub fn new(stop_on_first_match: bool) -> Self {
        Self {
            stop_on_first_match,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.stop_on_first_match)
    }

    pub fn stops_on_first_match(&self) -> bool {
        self.stop_on_first_match
    }

    /// Decide what would fire for `utterance` without invoking anything.
    pub fn resolve(&self, registry: &CommandRegistry, utterance: &Utterance) -> Vec<Invocation> {
        let mut selected = Vec::new();

        for (index, command) in registry.commands().iter().enumerate() {
            if utterance.interim && !command.spec().matches_interim() {
                continue;
            }
            let candidates = candidates_for(command, &utterance.text);
            debug!(
                command = %command.label(),
                candidates = candidates.len(),
                "tested command"
            );
            if candidates.is_empty() {
                continue;
            }
            selected.extend(candidates.into_iter().map(|candidate| Invocation {
                command: index,
                candidate,
            }));
            if self.stop_on_first_match {
                break;
            }
        }

        selected
    }

    /// Resolve `utterance` and invoke the selected handlers.
    ///
    /// Sync handlers run before this returns. Async handlers are spawned on
    /// the current tokio runtime and their handles returned in
    /// [`DispatchOutcome::Matched`] without waiting for them.
    ///
    /// Called outside a runtime, async handlers are driven to completion on
    /// a private current-thread runtime before this returns, so they can
    /// still use tokio I/O and timers. Hosts that need fire-and-forget
    /// dispatch must call this from within a runtime.
    pub fn dispatch(&self, registry: &CommandRegistry, utterance: &Utterance) -> DispatchOutcome {
        let invocations = self.resolve(registry, utterance);
        if invocations.is_empty() {
            debug!(input = %utterance.text, "no command matched");
            return DispatchOutcome::Exhausted;
        }

        let mut pending = Vec::new();
        let mut fallback: Option<Runtime> = None;
        for invocation in &invocations {
            let Some(command) = registry.get(invocation.command) else {
                continue;
            };
            info!(
                command = %command.label(),
                pattern = %invocation.candidate.source(),
                "dispatching command"
            );
            let args = handler_args(&invocation.candidate, utterance);
            match command.spec().handler() {
                Handler::Sync(f) => f(args),
                Handler::Async(f) => {
                    let future = f(args);
                    match Handle::try_current() {
                        Ok(runtime) => pending.push(runtime.spawn(future)),
                        Err(_) => run_without_runtime(&mut fallback, future),
                    }
                }
            }
        }

        DispatchOutcome::Matched {
            invocations,
            pending,
        }
    }
}

fn run_without_runtime(fallback: &mut Option<Runtime>, future: HandlerFuture) {
    if fallback.is_none() {
        match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => *fallback = Some(runtime),
            Err(e) => {
                error!(error = %e, "cannot start a runtime for async handler");
                return;
            }
        }
    }
    if let Some(runtime) = fallback {
        runtime.block_on(future);
    }
}

fn candidates_for(command: &RegisteredCommand, input: &str) -> Vec<MatchCandidate> {
    let mut candidates: Vec<MatchCandidate> = command
        .compiled()
        .iter()
        .filter_map(|pattern| try_match(pattern, input))
        .collect();

    let fuzzy = matches!(command.spec().mode(), MatchMode::Fuzzy { .. });
    if fuzzy && command.spec().is_best_match_only() && candidates.len() >= 2 {
        // Stable: equal ranks keep declaration order.
        candidates.sort_by(|a, b| b.rank().partial_cmp(&a.rank()).unwrap_or(Ordering::Equal));
        candidates.truncate(1);
    }
    candidates
}

fn handler_args(candidate: &MatchCandidate, utterance: &Utterance) -> HandlerArgs {
    let context = MatchContext {
        matched_pattern: candidate.source().clone(),
        reset: utterance.reset.clone(),
    };
    match candidate {
        MatchCandidate::Exact { parameters, .. } => HandlerArgs::Exact {
            parameters: parameters.clone(),
            context,
        },
        MatchCandidate::Fuzzy {
            phrase, similarity, ..
        } => HandlerArgs::Fuzzy {
            phrase: phrase.clone(),
            input: utterance.text.clone(),
            similarity: *similarity,
            context,
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::intent::registry::CommandSpec;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    type Calls = Arc<Mutex<Vec<(usize, HandlerArgs)>>>;

    fn recorder(calls: &Calls, id: usize) -> Handler {
        let calls = Arc::clone(calls);
        Handler::new(move |args| calls.lock().unwrap().push((id, args)))
    }

    fn overlapping_registry(calls: &Calls) -> CommandRegistry {
        CommandRegistry::new()
            .with(CommandSpec::new(["*open the * tab*"], recorder(calls, 0)))
            .unwrap()
            .with(CommandSpec::new(["*open*"], recorder(calls, 1)))
            .unwrap()
    }

    #[test]
    fn first_match_stops_at_earliest_command() {
        let calls = Calls::default();
        let registry = overlapping_registry(&calls);
        let outcome = Dispatcher::default().dispatch(&registry, &"open the images tab".into());
        assert_eq!(outcome.commands(), vec![0]);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 0);
        assert_eq!(calls[0].1.parameter(1), Some("images"));
    }

    #[test]
    fn all_match_fires_every_matching_command() {
        let calls = Calls::default();
        let registry = overlapping_registry(&calls);
        let outcome = Dispatcher::new(false).dispatch(&registry, &"open the images tab".into());
        assert_eq!(outcome.commands(), vec![0, 1]);
        let ids: Vec<usize> = calls.lock().unwrap().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn no_match_is_exhausted_and_invokes_nothing() {
        for dispatcher in [Dispatcher::new(true), Dispatcher::new(false)] {
            let calls = Calls::default();
            let registry = overlapping_registry(&calls);
            let outcome = dispatcher.dispatch(&registry, &"close everything".into());
            assert!(matches!(outcome, DispatchOutcome::Exhausted));
            assert!(outcome.invocations().is_empty());
            assert!(calls.lock().unwrap().is_empty());
        }
    }

    #[test]
    fn fuzzy_best_match_only_picks_highest_score() {
        let calls = Calls::default();
        let registry = CommandRegistry::new()
            .with(
                CommandSpec::new(["wow", "whoa", "whoah"], recorder(&calls, 0))
                    .fuzzy()
                    .best_match_only(),
            )
            .unwrap();
        Dispatcher::default().dispatch(&registry, &"whoa".into());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        match &calls[0].1 {
            HandlerArgs::Fuzzy {
                phrase,
                input,
                similarity,
                context,
            } => {
                assert_eq!(phrase, "whoa");
                assert_eq!(input, "whoa");
                assert!((similarity - 1.0).abs() < f64::EPSILON);
                assert_eq!(context.matched_pattern(), &PatternSource::from("whoa"));
            }
            HandlerArgs::Exact { .. } => panic!("expected fuzzy args"),
        }
    }

    #[test]
    fn fuzzy_without_best_match_invokes_per_pattern() {
        let calls = Calls::default();
        let registry = CommandRegistry::new()
            .with(CommandSpec::new(["wow", "whoa", "whoah"], recorder(&calls, 0)).fuzzy())
            .unwrap();
        let outcome = Dispatcher::default().dispatch(&registry, &"whoa".into());
        // whoa (1.0) and whoah (6/7) clear 0.8; wow does not.
        assert_eq!(outcome.invocations().len(), 2);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn exact_best_match_only_still_fires_every_pattern() {
        let calls = Calls::default();
        let registry = CommandRegistry::new()
            .with(CommandSpec::new(["*open*", "*tab*"], recorder(&calls, 0)).best_match_only())
            .unwrap();
        let outcome = Dispatcher::default().dispatch(&registry, &"open the tab".into());
        let sources: Vec<String> = outcome
            .invocations()
            .iter()
            .map(|i| i.candidate.source().to_string())
            .collect();
        assert_eq!(sources, vec!["*open*", "*tab*"]);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn fuzzy_best_match_tie_keeps_declaration_order() {
        let calls = Calls::default();
        let registry = CommandRegistry::new()
            .with(
                CommandSpec::new(["whoa!", "whoa?"], recorder(&calls, 0))
                    .fuzzy()
                    .best_match_only(),
            )
            .unwrap();
        let outcome = Dispatcher::default().dispatch(&registry, &"whoa".into());
        assert_eq!(outcome.invocations().len(), 1);
        assert_eq!(
            outcome.invocations()[0].candidate.source(),
            &PatternSource::from("whoa!")
        );
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn exact_args_carry_captures_and_pattern() {
        let calls = Calls::default();
        let registry = CommandRegistry::new()
            .with(CommandSpec::new(["*open the * tab*"], recorder(&calls, 0)))
            .unwrap();
        Dispatcher::default().dispatch(
            &registry,
            &"please open the containers tab now".into(),
        );
        let calls = calls.lock().unwrap();
        match &calls[0].1 {
            HandlerArgs::Exact {
                parameters,
                context,
            } => {
                assert_eq!(parameters, &vec!["please ", "containers", " now"]);
                assert_eq!(context.matched_pattern().to_string(), "*open the * tab*");
            }
            HandlerArgs::Fuzzy { .. } => panic!("expected exact args"),
        }
    }

    #[test]
    fn interim_utterances_only_reach_interim_commands() {
        let calls = Calls::default();
        let registry = CommandRegistry::new()
            .with(CommandSpec::new(["*save*"], recorder(&calls, 0)))
            .unwrap()
            .with(CommandSpec::new(["*how are you*"], recorder(&calls, 1)).match_interim())
            .unwrap();
        let dispatcher = Dispatcher::default();

        assert!(matches!(
            dispatcher.dispatch(&registry, &Utterance::interim("save it")),
            DispatchOutcome::Exhausted
        ));
        assert!(
            dispatcher
                .dispatch(&registry, &Utterance::interim("hey, how are you today"))
                .is_matched()
        );
        assert!(dispatcher.dispatch(&registry, &Utterance::new("save it")).is_matched());
        let ids: Vec<usize> = calls.lock().unwrap().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn handler_can_reset_input_buffer() {
        let resets = Arc::new(AtomicUsize::new(0));
        let registry = CommandRegistry::new()
            .with(CommandSpec::new(
                ["*save*"],
                Handler::new(|args| args.context().reset_input_buffer()),
            ))
            .unwrap();
        let counter = Arc::clone(&resets);
        let utterance = Utterance::new("save this").with_reset(move || {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        });
        Dispatcher::default().dispatch(&registry, &utterance);
        assert_eq!(resets.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn resolve_does_not_invoke_handlers() {
        let calls = Calls::default();
        let registry = overlapping_registry(&calls);
        let selected = Dispatcher::default().resolve(&registry, &"open the images tab".into());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].command, 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn async_handlers_are_spawned_and_settle() {
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);
        let registry = CommandRegistry::new()
            .with(CommandSpec::new(
                ["*run * container*"],
                Handler::new_async(move |_| {
                    let counter = Arc::clone(&counter);
                    async move {
                        tokio::task::yield_now().await;
                        counter.fetch_add(1, AtomicOrdering::SeqCst);
                    }
                }),
            ))
            .unwrap();
        let outcome = Dispatcher::default().dispatch(&registry, &"run a node container".into());
        let DispatchOutcome::Matched { pending, .. } = &outcome else {
            panic!("expected a match");
        };
        assert_eq!(pending.len(), 1);
        outcome.settle().await;
        assert_eq!(done.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn async_handlers_run_inline_without_runtime() {
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);
        let registry = CommandRegistry::new()
            .with(CommandSpec::new(
                ["ping"],
                Handler::new_async(move |_| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, AtomicOrdering::SeqCst);
                    }
                }),
            ))
            .unwrap();
        let outcome = Dispatcher::default().dispatch(&registry, &"ping".into());
        assert!(outcome.is_matched());
        assert_eq!(done.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn async_handlers_can_use_tokio_without_ambient_runtime() {
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);
        let registry = CommandRegistry::new()
            .with(CommandSpec::new(
                ["wait"],
                Handler::new_async(move |_| {
                    let counter = Arc::clone(&counter);
                    async move {
                        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                        tokio::task::yield_now().await;
                        counter.fetch_add(1, AtomicOrdering::SeqCst);
                    }
                }),
            ))
            .unwrap();
        let outcome = Dispatcher::default().dispatch(&registry, &"wait".into());
        assert!(matches!(
            &outcome,
            DispatchOutcome::Matched { pending, .. } if pending.is_empty()
        ));
        assert_eq!(done.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "handler blew up")]
    async fn panicking_async_handler_surfaces_on_settle() {
        let registry = CommandRegistry::new()
            .with(CommandSpec::new(
                ["boom"],
                Handler::new_async(|_| async { panic!("handler blew up") }),
            ))
            .unwrap();
        Dispatcher::default()
            .dispatch(&registry, &"boom".into())
            .settle()
            .await;
    }
}
