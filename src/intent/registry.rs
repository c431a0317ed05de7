//! Command specs and the ordered registry the dispatcher walks.
//!
//! The application declares its intents as [`CommandSpec`]s and registers
//! them in priority order. Registration compiles every pattern up front, so
//! a malformed template is reported when the registry is built rather than
//! when a user first says something.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{IntentError, Result};
use crate::intent::cache::DEFAULT_CACHE_CAPACITY;
use crate::intent::dispatcher::HandlerArgs;
use crate::intent::pattern::{CompiledPattern, PatternSource};

/// Fuzzy threshold used when neither the command nor the registry sets one.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

/// How a command's patterns are compared with the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchMode {
    /// Structural pattern match with positional captures.
    Exact,
    /// Similarity match. `None` takes the registry's default threshold.
    Fuzzy { threshold: Option<f64> },
}

/// Future returned by an asynchronous handler.
pub type HandlerFuture = BoxFuture<'static, ()>;

/// The callback run when a command matches.
#[derive(Clone)]
pub enum Handler {
    /// Runs inline on the dispatching thread.
    Sync(Arc<dyn Fn(HandlerArgs) + Send + Sync>),
    /// Spawned onto the tokio runtime; the dispatcher does not wait for it.
    Async(Arc<dyn Fn(HandlerArgs) -> HandlerFuture + Send + Sync>),
}

impl Handler {
    /// Wrap a synchronous callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(HandlerArgs) + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wrap an asynchronous callback.
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(HandlerArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::Async(Arc::new(move |args| f(args).boxed()))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Handler::Sync"),
            Self::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

/// Declarative registration of one intent.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    patterns: Vec<PatternSource>,
    mode: MatchMode,
    best_match_only: bool,
    match_interim: bool,
    example: Option<String>,
    handler: Handler,
}

impl CommandSpec {
    /// An exact-mode spec over `patterns`.
    pub fn new<I, P>(patterns: I, handler: Handler) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PatternSource>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            mode: MatchMode::Exact,
            best_match_only: false,
            match_interim: false,
            example: None,
            handler,
        }
    }

    /// Switch to fuzzy matching with the registry's default threshold.
    #[must_use]
    pub fn fuzzy(mut self) -> Self {
        self.mode = MatchMode::Fuzzy { threshold: None };
        self
    }

    /// Switch to fuzzy matching with an explicit threshold.
    #[must_use]
    pub fn fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.mode = MatchMode::Fuzzy {
            threshold: Some(threshold),
        };
        self
    }

    /// Dispatch only the highest-ranked of this spec's matching patterns.
    #[must_use]
    pub fn best_match_only(mut self) -> Self {
        self.best_match_only = true;
        self
    }

    /// Allow this spec to fire on interim (still-being-spoken) transcripts.
    #[must_use]
    pub fn match_interim(mut self) -> Self {
        self.match_interim = true;
        self
    }

    /// Sample phrase shown in the help listing.
    #[must_use]
    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn patterns(&self) -> &[PatternSource] {
        &self.patterns
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn is_best_match_only(&self) -> bool {
        self.best_match_only
    }

    pub fn matches_interim(&self) -> bool {
        self.match_interim
    }

    pub fn example_text(&self) -> Option<&str> {
        self.example.as_deref()
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

/// A spec together with its compiled patterns.
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    spec: CommandSpec,
    compiled: Vec<CompiledPattern>,
}

impl RegisteredCommand {
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Compiled patterns, in declaration order.
    pub fn compiled(&self) -> &[CompiledPattern] {
        &self.compiled
    }

    /// Short label for logs: the first pattern.
    pub fn label(&self) -> String {
        self.spec
            .patterns
            .first()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

/// Ordered collection of registered commands.
///
/// Order is priority: under first-match dispatch the earliest matching
/// command wins.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: Vec<RegisteredCommand>,
    default_fuzzy_threshold: f64,
    cache_capacity: u64,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// An empty registry with built-in defaults.
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            default_fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// An empty registry using the engine configuration's defaults.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            commands: Vec::new(),
            default_fuzzy_threshold: config.default_fuzzy_threshold,
            cache_capacity: config.pattern_cache_capacity,
        }
    }

    /// Validate, compile and append `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::InvalidCommand`] if the command has no patterns or
    /// its fuzzy threshold lies outside `0.0..=1.0`, and
    /// [`IntentError::MalformedPattern`] if an exact-mode template does not
    /// compile. The registry is unchanged on error.
    pub fn register(&mut self, spec: CommandSpec) -> Result<()> {
        if spec.patterns.is_empty() {
            return Err(IntentError::InvalidCommand(
                "a command needs at least one pattern".into(),
            ));
        }

        let compiled = match spec.mode {
            MatchMode::Exact => spec
                .patterns
                .iter()
                .map(|source| CompiledPattern::exact(source.clone(), self.cache_capacity))
                .collect::<Result<Vec<_>>>()?,
            MatchMode::Fuzzy { threshold } => {
                let threshold = threshold.unwrap_or(self.default_fuzzy_threshold);
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(IntentError::InvalidCommand(format!(
                        "fuzzy threshold {threshold} must be within 0.0..=1.0"
                    )));
                }
                spec.patterns
                    .iter()
                    .map(|source| CompiledPattern::fuzzy(source.clone(), threshold))
                    .collect()
            }
        };

        debug!(
            command = %spec.patterns[0],
            patterns = compiled.len(),
            mode = ?spec.mode,
            "registered command"
        );
        self.commands.push(RegisteredCommand { spec, compiled });
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn with(mut self, spec: CommandSpec) -> Result<Self> {
        self.register(spec)?;
        Ok(self)
    }

    pub fn commands(&self) -> &[RegisteredCommand] {
        &self.commands
    }

    pub fn get(&self, index: usize) -> Option<&RegisteredCommand> {
        self.commands.get(index)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Example phrases, in registration order, for help output.
    pub fn examples(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| command.spec.example_text())
            .collect()
    }
}
