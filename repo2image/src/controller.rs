use anyhow::anyhow;
use log::{error, info, warn};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};
use url::Url;

use crate::{
    dockerfile,
    error::BuildError,
    hasher::recipe_digest,
    models::{BuildRequest, BuildResult, EngineStatus, HealthStatus, ImageBuildSpec, ImageTag},
    naming, recipes,
    services::{ImageBuilder, RepositoryFetcher, WorkspaceManager},
    workspace::WorkspaceGuard,
};

const LABEL_STACK: &str = "io.repo2image.stack";
const LABEL_RECIPE: &str = "io.repo2image.recipe";

pub struct Orchestrator {
    engine: Option<Box<dyn ImageBuilder>>,
    fetcher: Box<dyn RepositoryFetcher>,
    workspaces: Box<dyn WorkspaceManager>,
    tag_namespace: String,
}

impl Orchestrator {
    /// `engine` is `None` when no container engine could be reached at
    /// startup; every build is then refused.
    pub fn init<F, W, N>(
        engine: Option<Box<dyn ImageBuilder>>,
        fetcher: F,
        workspaces: W,
        tag_namespace: N,
    ) -> Orchestrator
    where
        F: 'static + RepositoryFetcher,
        W: 'static + WorkspaceManager,
        N: Into<String>,
    {
        Orchestrator {
            engine,
            fetcher: Box::new(fetcher),
            workspaces: Box::new(workspaces),
            tag_namespace: tag_namespace.into(),
        }
    }

    pub fn health(&self) -> HealthStatus {
        let engine = match &self.engine {
            Some(engine) if engine.ping() => EngineStatus::Connected,
            _ => EngineStatus::Disconnected,
        };

        HealthStatus::now(engine)
    }

    /// Clones, detects, synthesizes and builds one repository. The
    /// workspace is released before this returns, whatever the outcome.
    pub fn handle(&self, request: &BuildRequest) -> Result<BuildResult, BuildError> {
        let result = self.try_handle(request);

        match &result {
            Ok(build) => info!("built {} ({})", build.image_tag, build.stack_type),
            Err(err @ BuildError::Unexpected(_)) => {
                error!("unexpected error while building {:?}: {:?}", request.repo_url, err)
            }
            Err(err) => warn!("build of {:?} failed: {}", request.repo_url, err),
        }

        result
    }

    fn try_handle(&self, request: &BuildRequest) -> Result<BuildResult, BuildError> {
        let repo_url = request.repo_url.trim();
        if repo_url.is_empty() {
            return Err(BuildError::MissingRepoUrl);
        }

        let engine = self
            .engine
            .as_deref()
            .ok_or(BuildError::EngineUnavailable)?;

        let url = parse_repo_url(repo_url)?;
        let identifier = naming::build_identifier(&url);

        panic::catch_unwind(AssertUnwindSafe(|| self.run(engine, repo_url, &identifier)))
            .unwrap_or_else(|payload| {
                Err(BuildError::Unexpected(anyhow!(
                    "build panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
    }

    fn run(
        &self,
        engine: &dyn ImageBuilder,
        repo_url: &str,
        identifier: &str,
    ) -> Result<BuildResult, BuildError> {
        let path = self.workspaces.path_for(identifier);
        let workspace = WorkspaceGuard::acquire(&*self.workspaces, &path)?;
        info!("prepared workspace {:?}", workspace.path());

        self.fetcher.fetch(repo_url, workspace.path())?;

        let recipe = recipes::detect(workspace.path());
        info!("detected project type: {}", recipe.stack_type);

        dockerfile::write(workspace.path(), recipe)?;

        let tag = ImageTag(format!("{}/{}:latest", self.tag_namespace, identifier));
        let spec = ImageBuildSpec {
            context: workspace.path().to_path_buf(),
            tag,
            labels: vec![
                (LABEL_STACK.to_string(), recipe.stack_type.to_string()),
                (LABEL_RECIPE.to_string(), recipe_digest(recipe)),
            ],
        };

        info!("starting docker build");
        let image = engine.build_image(&spec)?;

        Ok(BuildResult {
            run_command: format!(
                "docker run -p {port}:{port} {tag}",
                port = recipe.default_port,
                tag = image.tag
            ),
            image_tag: image.tag.0,
            stack_type: recipe.stack_type,
            port: recipe.default_port,
            build_file_text: recipe.template.to_string(),
            log_lines: image.log_lines,
        })
    }
}

fn parse_repo_url(repo_url: &str) -> Result<Url, BuildError> {
    let url = Url::parse(repo_url).map_err(|_| BuildError::InvalidUrl)?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(BuildError::InvalidUrl),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
