use serde::Serialize;
use std::{
    fmt,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StackType {
    NextJs,
    React,
    Node,
    Flask,
    Django,
    Python,
    Static,
}

impl StackType {
    pub fn as_str(self) -> &'static str {
        match self {
            StackType::NextJs => "nextjs",
            StackType::React => "react",
            StackType::Node => "node",
            StackType::Flask => "flask",
            StackType::Django => "django",
            StackType::Python => "python",
            StackType::Static => "static",
        }
    }
}

impl fmt::Display for StackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detection rule plus the Dockerfile used for the stack it detects.
///
/// Markers are paths relative to the workspace root; a recipe matches only
/// when every one of them exists.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Recipe {
    pub stack_type: StackType,
    pub markers: &'static [&'static str],
    pub template: &'static str,
    pub default_port: u16,
}

#[derive(Clone, Debug)]
pub struct BuildRequest {
    pub repo_url: String,
}

impl BuildRequest {
    pub fn new<S: Into<String>>(repo_url: S) -> BuildRequest {
        BuildRequest {
            repo_url: repo_url.into(),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct ImageTag(pub String);

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBuildSpec {
    pub context: PathBuf,
    pub tag: ImageTag,
    pub labels: Vec<(String, String)>,
}

#[derive(Clone, Debug)]
pub struct BuiltImage {
    pub tag: ImageTag,
    pub log_lines: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BuildResult {
    #[serde(rename = "image")]
    pub image_tag: String,
    #[serde(rename = "type")]
    pub stack_type: StackType,
    pub port: u16,
    #[serde(rename = "dockerfile")]
    pub build_file_text: String,
    #[serde(rename = "logs")]
    pub log_lines: Vec<String>,
    pub run_command: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Connected,
    Disconnected,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    #[serde(rename = "docker")]
    pub engine: EngineStatus,
    /// Seconds since the unix epoch.
    pub timestamp: f64,
}

impl HealthStatus {
    pub fn now(engine: EngineStatus) -> HealthStatus {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        HealthStatus {
            status: "healthy",
            engine,
            timestamp,
        }
    }
}
