//! Host capabilities used by the built-in commands.
//!
//! Handlers never reach for global clients; the capabilities they need are
//! passed in once, when the registry is built.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{IntentError, Result};

/// A top-level view the host UI can switch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Containers,
    Images,
    Volumes,
}

impl View {
    /// Parse the spoken name of a tab.
    pub fn from_tab_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "containers" => Some(Self::Containers),
            "images" => Some(Self::Images),
            "volumes" => Some(Self::Volumes),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Containers => "containers",
            Self::Images => "images",
            Self::Volumes => "volumes",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Side effects available to built-in command handlers.
#[async_trait]
pub trait HostServices: Send + Sync {
    /// Switch the host UI to `view`.
    async fn navigate(&self, view: View) -> Result<()>;

    /// Ask where to save. `None` means the user cancelled.
    async fn choose_directory(&self) -> Result<Option<PathBuf>>;

    /// Write `contents` to `dir/name`, returning the written path.
    async fn save_file(&self, dir: &Path, name: &str, contents: &str) -> Result<PathBuf>;

    /// Start a detached container from `image`, returning its id.
    async fn run_container(&self, image: &str) -> Result<String>;
}

/// [`HostServices`] backed by the local `docker` CLI and filesystem.
///
/// There is no UI to drive, so navigation is only logged, and the save
/// directory comes from configuration instead of a picker.
#[derive(Debug, Clone)]
pub struct DockerCli {
    docker: PathBuf,
    save_directory: Option<PathBuf>,
}

impl DockerCli {
    pub fn new(docker: impl Into<PathBuf>, save_directory: Option<PathBuf>) -> Self {
        Self {
            docker: docker.into(),
            save_directory,
        }
    }
}

#[async_trait]
impl HostServices for DockerCli {
    async fn navigate(&self, view: View) -> Result<()> {
        info!(%view, "navigation requested");
        Ok(())
    }

    async fn choose_directory(&self) -> Result<Option<PathBuf>> {
        self.save_directory
            .clone()
            .map(Some)
            .ok_or_else(|| IntentError::Host("no save directory configured".into()))
    }

    async fn save_file(&self, dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, contents).await?;
        debug!(path = %path.display(), bytes = contents.len(), "saved file");
        Ok(path)
    }

    async fn run_container(&self, image: &str) -> Result<String> {
        let output = Command::new(&self.docker)
            .args(["run", "--rm", "-d", image])
            .output()
            .await
            .map_err(|e| {
                IntentError::Host(format!("failed to run {}: {e}", self.docker.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IntentError::Host(stderr.trim().to_owned()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}
