use anyhow::{Context, Result};
use log::{debug, warn};
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::services::WorkspaceManager;

/// A directory owned by exactly one in-flight build.
#[derive(Clone, Debug)]
pub struct Workspace {
    pub path: PathBuf,
    pub created_at: SystemTime,
}

/// Workspaces on the local filesystem below a common root.
pub struct LocalWorkspaces {
    root: PathBuf,
}

impl LocalWorkspaces {
    pub fn new<P: Into<PathBuf>>(root: P) -> LocalWorkspaces {
        LocalWorkspaces { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl WorkspaceManager for LocalWorkspaces {
    fn path_for(&self, identifier: &str) -> PathBuf {
        self.root.join(identifier)
    }

    fn prepare(&self, path: &Path) -> Result<Workspace> {
        if path.exists() {
            debug!("removing stale workspace {:?}", path);
            if let Err(err) = fs::remove_dir_all(path) {
                warn!("could not remove stale workspace {:?}: {}", path, err);
            }
        }

        fs::create_dir_all(path)
            .with_context(|| format!("failed to create workspace {:?}", path))?;

        Ok(Workspace {
            path: path.to_path_buf(),
            created_at: SystemTime::now(),
        })
    }

    fn dispose(&self, workspace: &Workspace) {
        let age = workspace.created_at.elapsed().unwrap_or_default();
        match fs::remove_dir_all(&workspace.path) {
            Ok(()) => debug!("removed workspace {:?} after {:?}", workspace.path, age),
            Err(err) => warn!("could not remove workspace {:?}: {}", workspace.path, err),
        }
    }
}

/// Disposes its workspace when dropped, so every exit path out of a build,
/// unwinding included, releases it exactly once.
pub struct WorkspaceGuard<'a> {
    manager: &'a dyn WorkspaceManager,
    workspace: Workspace,
}

impl<'a> WorkspaceGuard<'a> {
    pub fn acquire(manager: &'a dyn WorkspaceManager, path: &Path) -> Result<WorkspaceGuard<'a>> {
        let workspace = manager.prepare(path)?;
        Ok(WorkspaceGuard { manager, workspace })
    }

    pub fn path(&self) -> &Path {
        &self.workspace.path
    }
}

impl<'a> Drop for WorkspaceGuard<'a> {
    fn drop(&mut self) {
        self.manager.dispose(&self.workspace);
    }
}
