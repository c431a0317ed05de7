//! The assistant's built-in commands.
//!
//! [`default_registry`] declares the stock intents in priority order. Every
//! side effect goes through the injected [`HostServices`]; results and
//! failures are reported as assistant messages in the [`Transcript`].

pub mod host;

pub use host::{DockerCli, HostServices, View};

use std::sync::Arc;

use tracing::{error, warn};

use crate::config::ParleyConfig;
use crate::error::Result;
use crate::intent::{CommandRegistry, CommandSpec, Handler};
use crate::transcript::{ActionTarget, CodeBuffer, Message, MessageAction, Transcript};

/// File name the save command writes the code buffer to.
pub const SAVED_FILE_NAME: &str = "Dockerfile";

/// Spoken container names and the image each one runs.
const CONTAINER_IMAGES: &[(&str, &[&str])] = &[
    ("nginx:latest", &["nginx", "engine x"]),
    ("node:latest", &["node", "note"]),
    ("postgres:latest", &["postgresql", "postgres", "postgres ql"]),
];

/// Image for a spoken container name, tolerant of common mis-hearings.
pub fn image_for(container: &str) -> Option<&'static str> {
    let container = container.trim().to_lowercase();
    CONTAINER_IMAGES
        .iter()
        .find(|(_, names)| names.contains(&container.as_str()))
        .map(|(image, _)| *image)
}

/// Build the registry of built-in commands.
///
/// # Errors
///
/// Returns an error if a built-in pattern fails to compile.
pub fn default_registry(
    config: &ParleyConfig,
    host: Arc<dyn HostServices>,
    transcript: &Transcript,
    code: &CodeBuffer,
) -> Result<CommandRegistry> {
    let name = &config.assistant.name;
    CommandRegistry::from_config(&config.engine)
        .with(greeting(transcript).example(format!("Hey {name}, how are you today?")))?
        .with(exclamation(transcript).example("Whoa!"))?
        .with(open_tab(Arc::clone(&host), transcript).example("Open the images tab"))?
        .with(save(Arc::clone(&host), transcript, code).example("Save this file"))?
        .with(run_container(host, transcript).example(format!("{name}, run a node container")))
}

fn greeting(transcript: &Transcript) -> CommandSpec {
    let transcript = transcript.clone();
    CommandSpec::new(
        ["*how are you*"],
        Handler::new(move |_| transcript.push_assistant("I am doing whale!")),
    )
    .match_interim()
}

fn exclamation(transcript: &Transcript) -> CommandSpec {
    let transcript = transcript.clone();
    CommandSpec::new(
        ["wow", "whoa", "whoah"],
        Handler::new(move |_| transcript.push_assistant("See? I am krilling it! 🦐")),
    )
    .fuzzy()
    .best_match_only()
    .match_interim()
}

fn open_tab(host: Arc<dyn HostServices>, transcript: &Transcript) -> CommandSpec {
    let transcript = transcript.clone();
    CommandSpec::new(
        ["*open the * tab*"],
        Handler::new_async(move |args| {
            let host = Arc::clone(&host);
            let transcript = transcript.clone();
            async move {
                let tab = args.parameter(1).unwrap_or_default().trim().to_owned();
                let Some(view) = View::from_tab_name(&tab) else {
                    transcript.push_assistant(format!("I am sorry I can't open the {tab} tab"));
                    return;
                };
                if let Err(e) = host.navigate(view).await {
                    warn!(%view, error = %e, "navigation failed");
                    transcript.push_assistant(format!("I am sorry I can't open the {tab} tab"));
                }
            }
        }),
    )
    .best_match_only()
}

fn save(host: Arc<dyn HostServices>, transcript: &Transcript, code: &CodeBuffer) -> CommandSpec {
    let transcript = transcript.clone();
    let code = code.clone();
    CommandSpec::new(
        ["*save*"],
        Handler::new_async(move |_| {
            let host = Arc::clone(&host);
            let transcript = transcript.clone();
            let code = code.clone();
            async move {
                let dir = match host.choose_directory().await {
                    Ok(Some(dir)) => dir,
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = %e, "no directory to save into");
                        transcript.push_assistant(format!("I am sorry I can't save the file: {e}"));
                        return;
                    }
                };
                match host.save_file(&dir, SAVED_FILE_NAME, &code.get()).await {
                    Ok(_) => {
                        transcript.push_assistant(format!("I saved the file in {}", dir.display()));
                    }
                    Err(e) => {
                        error!(dir = %dir.display(), error = %e, "saving failed");
                        transcript.push_assistant(format!(
                            "I am sorry I can't save the file in {}",
                            dir.display()
                        ));
                    }
                }
            }
        }),
    )
}

fn run_container(host: Arc<dyn HostServices>, transcript: &Transcript) -> CommandSpec {
    let transcript = transcript.clone();
    CommandSpec::new(
        ["*run (a)(an) :container container*"],
        Handler::new_async(move |args| {
            let host = Arc::clone(&host);
            let transcript = transcript.clone();
            async move {
                let container = args.parameter(1).unwrap_or_default().to_owned();
                let Some(image) = image_for(&container) else {
                    transcript.push_assistant(format!(
                        "I understood \"{container}\" but I don't know how to run a container for this image"
                    ));
                    return;
                };
                match host.run_container(image).await {
                    Ok(id) => {
                        let mut message = Message::new(format!(
                            "There you go, I ran a {container} container for you"
                        ));
                        if !id.is_empty() {
                            message = message.with_action(MessageAction {
                                text: "Container details".into(),
                                target: ActionTarget::Container(id),
                            });
                        }
                        transcript.push_assistant(message);
                    }
                    Err(e) => {
                        warn!(%image, error = %e, "container failed to start");
                        transcript.push_assistant(format!(
                            "I couldn't create a {container} container. Here is what happened:\n{e}"
                        ));
                    }
                }
            }
        }),
    )
    .match_interim()
}
