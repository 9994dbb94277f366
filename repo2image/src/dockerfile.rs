use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::models::Recipe;

pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// Writes the recipe's template as the workspace Dockerfile, replacing any
/// Dockerfile the repository shipped with.
pub fn write(workspace: &Path, recipe: &Recipe) -> Result<PathBuf> {
    let path = workspace.join(DOCKERFILE_NAME);
    fs::write(&path, recipe.template).with_context(|| format!("failed to write {:?}", path))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::REGISTRY;
    use tempfile::TempDir;

    #[test]
    fn writes_template_verbatim() {
        let dir = TempDir::new().unwrap();
        let recipe = &REGISTRY[3];

        let path = write(dir.path(), recipe).unwrap();
        assert_eq!(path, dir.path().join("Dockerfile"));
        assert_eq!(fs::read_to_string(path).unwrap(), recipe.template);
    }

    #[test]
    fn replaces_existing_dockerfile() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM scratch\nRUN something-long").unwrap();

        let recipe = REGISTRY.last().unwrap();
        write(dir.path(), recipe).unwrap();

        let written = fs::read_to_string(dir.path().join("Dockerfile")).unwrap();
        assert_eq!(written, recipe.template);
    }
}
