use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::{
    error::BuildError,
    models::{BuiltImage, ImageBuildSpec},
    workspace::Workspace,
};

/// Brings a remote repository's working tree onto the local filesystem.
pub trait RepositoryFetcher {
    /// Fails with `NotFoundOrPrivate`, `AuthenticationFailed` or
    /// `CloneFailed`, or `Unexpected` when the client could not even run.
    fn fetch(&self, repo_url: &str, destination: &Path) -> Result<(), BuildError>;
}

pub trait ImageBuilder {
    /// Builds `spec.context` into `spec.tag`, returning the cleaned build log.
    fn build_image(&self, spec: &ImageBuildSpec) -> Result<BuiltImage, BuildError>;

    fn ping(&self) -> bool;
}

pub trait WorkspaceManager {
    fn path_for(&self, identifier: &str) -> PathBuf;

    fn prepare(&self, path: &Path) -> Result<Workspace>;

    fn dispose(&self, workspace: &Workspace);
}
