use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env,
    fs::File,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory under which per-build workspaces are created.
    pub workspace_root: PathBuf,

    /// Repository part of every produced tag, `<namespace>/<id>:latest`.
    pub tag_namespace: String,

    pub clone_depth: u32,

    pub git_binary: PathBuf,

    /// Engine address such as `unix:///var/run/docker.sock` or
    /// `tcp://127.0.0.1:2375`. Falls back to `DOCKER_HOST` and the platform
    /// socket when unset.
    pub docker_host: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workspace_root: env::temp_dir().join("builds"),
            tag_namespace: "builder".into(),
            clone_depth: 1,
            git_binary: PathBuf::from("git"),
            docker_host: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("couldn't open config file {:?}", path))?;

        let config = serde_yaml::from_reader(file)
            .with_context(|| format!("couldn't parse config file {:?}", path))?;

        Ok(config)
    }
}
