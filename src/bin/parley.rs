//! CLI binary for parley.

use clap::{Parser, Subcommand};
use parley::builtins::DockerCli;
use parley::intent::MatchCandidate;
use parley::transcript::Author;
use parley::{ParleyConfig, Session};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Parley: talk to your container assistant.
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Type utterances and read the assistant's replies.
    Repl,

    /// List example phrases for the built-in commands.
    Commands,

    /// Show which command an utterance would trigger, without running it.
    Match {
        /// The utterance to test.
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so replies on stdout stay readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let host = DockerCli::new(
        &config.assistant.docker_binary,
        config.assistant.save_directory.clone(),
    );
    if config.edits.enabled {
        warn!("edits are enabled but this binary has no edit transport; unmatched input will not be edited");
    }
    let session = Session::with_builtins(config, Arc::new(host))?;

    match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => run_repl(&session).await,
        Command::Commands => {
            list_commands(&session);
            Ok(())
        }
        Command::Match { text } => {
            explain_match(&session, &text);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ParleyConfig> {
    if let Some(path) = path {
        return Ok(ParleyConfig::from_file(path)?);
    }
    let default_path = ParleyConfig::default_config_path();
    if default_path.exists() {
        info!(path = %default_path.display(), "loading config");
        Ok(ParleyConfig::from_file(&default_path)?)
    } else {
        Ok(ParleyConfig::default())
    }
}

async fn run_repl(session: &Session) -> anyhow::Result<()> {
    let transcript = session.transcript();
    println!("Parley v{}", env!("CARGO_PKG_VERSION"));
    println!("Type \"help\" for examples, \"quit\" to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down...");
                break;
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                list_commands(session);
                continue;
            }
            _ => {}
        }

        let before = transcript.len();
        session.submit(line).await;
        for message in transcript.messages_since(before) {
            if message.author == Author::User {
                continue;
            }
            println!("{}: {}", transcript.display_name(message.author), message.content);
            if let Some(action) = message.action {
                println!("  [{}] {:?}", action.text, action.target);
            }
        }
    }

    Ok(())
}

fn list_commands(session: &Session) {
    println!("Things you can say:");
    for example in session.examples() {
        println!("  - {example}");
    }
}

fn explain_match(session: &Session, text: &str) {
    let selected = session.resolve(text);
    if selected.is_empty() {
        println!("No command matches {text:?}");
        return;
    }
    for invocation in selected {
        let label = session
            .registry()
            .get(invocation.command)
            .map(|command| command.label())
            .unwrap_or_default();
        match &invocation.candidate {
            MatchCandidate::Exact { source, parameters } => {
                println!("{label}: exact match on {source}, parameters {parameters:?}");
            }
            MatchCandidate::Fuzzy {
                source, similarity, ..
            } => {
                println!("{label}: fuzzy match on {source}, similarity {similarity:.3}");
            }
        }
    }
}
