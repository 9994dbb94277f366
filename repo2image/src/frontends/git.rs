use anyhow::{anyhow, Context};
use log::{debug, info};
use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::{error::BuildError, services::RepositoryFetcher};

/// Shallow clones through the `git` command line client.
pub struct GitFetcher {
    git: PathBuf,
    depth: u32,
}

impl GitFetcher {
    pub fn new<P: Into<PathBuf>>(git: P, depth: u32) -> GitFetcher {
        GitFetcher {
            git: git.into(),
            depth: depth.max(1),
        }
    }

    fn clone_command(&self, repo_url: &str, destination: &Path) -> Command {
        let mut command = Command::new(&self.git);
        command
            .arg("clone")
            .arg("--depth")
            .arg(self.depth.to_string())
            // nothing after this is read as an option
            .arg("--")
            .arg(repo_url)
            .arg(destination)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        command
    }
}

impl RepositoryFetcher for GitFetcher {
    fn fetch(&self, repo_url: &str, destination: &Path) -> Result<(), BuildError> {
        debug!("cloning {} into {:?} (depth {})", repo_url, destination, self.depth);

        let output = self
            .clone_command(repo_url, destination)
            .output()
            .with_context(|| format!("failed to run {:?}", self.git))?;

        if output.status.success() {
            info!("cloned repository {}", repo_url);
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostic = stderr.trim();
        if diagnostic.is_empty() {
            return Err(BuildError::Unexpected(anyhow!(
                "git clone exited with {} and no diagnostics",
                output.status
            )));
        }

        Err(classify_clone_failure(diagnostic))
    }
}

/// Maps git's diagnostic text onto a fetch error kind.
///
/// This matches on human readable messages and so depends on the git version
/// and locale; replace it once structured output is available.
pub fn classify_clone_failure(diagnostic: &str) -> BuildError {
    if diagnostic.contains("Repository not found") {
        BuildError::NotFoundOrPrivate
    } else if diagnostic.contains("could not read Username") {
        BuildError::AuthenticationFailed
    } else {
        BuildError::CloneFailed(diagnostic.to_string())
    }
}
