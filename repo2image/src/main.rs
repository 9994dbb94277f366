use anyhow::Result;
use crossterm::{
    style::{self, Colorize, Styler},
    QueueableCommand,
};
use log::{error, info};
use serde::Serialize;
use std::{
    io::{stdout, Write},
    path::PathBuf,
    process,
};
use structopt::StructOpt;

use backends::DockerBackend;
use config::Config;
use controller::Orchestrator;
use error::BuildError;
use frontends::GitFetcher;
use models::{BuildRequest, BuildResult, EngineStatus, HealthStatus};
use services::ImageBuilder;
use workspace::LocalWorkspaces;

mod backends;
mod config;
mod controller;
mod dockerfile;
mod error;
mod frontends;
mod hasher;
mod models;
mod naming;
mod recipes;
mod services;
mod workspace;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "repo2image",
    about = "Builds a runnable container image from a git repository URL."
)]
struct Opt {
    #[structopt(short, long, parse(from_os_str))]
    /// YAML file with defaults for the options below.
    config: Option<PathBuf>,

    #[structopt(long, parse(from_os_str))]
    /// Directory in which build workspaces are created.
    workspace_root: Option<PathBuf>,

    #[structopt(long)]
    /// Repository part of produced image tags.
    tag_namespace: Option<String>,

    #[structopt(long)]
    /// Container engine address, e.g. unix:///var/run/docker.sock.
    docker_host: Option<String>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Clones a repository, detects its stack and builds an image from it.
    Build {
        repo_url: String,

        #[structopt(long)]
        /// Print the result as JSON.
        json: bool,
    },
    /// Reports whether the container engine is reachable.
    Health {
        #[structopt(long)]
        /// Print the result as JSON.
        json: bool,
    },
}

#[derive(Serialize)]
struct SuccessResponse<'a> {
    status: &'static str,
    #[serde(flatten)]
    result: &'a BuildResult,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn resolve_config(opt: &Opt) -> Result<Config> {
    let mut config = match &opt.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(workspace_root) = &opt.workspace_root {
        config.workspace_root = workspace_root.clone();
    }
    if let Some(tag_namespace) = &opt.tag_namespace {
        config.tag_namespace = tag_namespace.clone();
    }
    if let Some(docker_host) = &opt.docker_host {
        config.docker_host = Some(docker_host.clone());
    }

    Ok(config)
}

fn main() -> Result<()> {
    pretty_env_logger::init_custom_env("LOG");

    let opt = Opt::from_args();
    let config = resolve_config(&opt)?;
    info!("using config {:?}", config);

    let engine = match DockerBackend::connect(config.docker_host.as_deref()) {
        Ok(backend) => {
            info!("connected to docker");
            Some(Box::new(backend) as Box<dyn ImageBuilder>)
        }
        Err(err) => {
            error!("failed to connect to docker: {:#}", err);
            None
        }
    };

    let workspaces = LocalWorkspaces::new(config.workspace_root);
    info!("workspaces live under {:?}", workspaces.root());

    let fetcher = GitFetcher::new(config.git_binary, config.clone_depth);
    let orchestrator = Orchestrator::init(engine, fetcher, workspaces, config.tag_namespace);

    let mut stdout = stdout();

    match opt.command {
        Command::Build { repo_url, json } => {
            match orchestrator.handle(&BuildRequest::new(repo_url)) {
                Ok(result) if json => {
                    let response = SuccessResponse {
                        status: "success",
                        result: &result,
                    };
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                Ok(result) => print_result(&mut stdout, &result)?,
                Err(err) => {
                    report_error(&mut stdout, &err, json)?;
                    process::exit(1);
                }
            }
        }
        Command::Health { json } => {
            let health = orchestrator.health();
            if json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                print_health(&mut stdout, &health)?;
            }
            if health.engine == EngineStatus::Disconnected {
                process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_result(stdout: &mut impl Write, result: &BuildResult) -> Result<()> {
    for line in result.log_lines.iter() {
        stdout.queue(style::Print(format!("{}\n", line)))?;
    }

    stdout
        .queue(style::PrintStyledContent("Stack: ".cyan().bold()))?
        .queue(style::Print(format!("{} (port {})\n", result.stack_type, result.port)))?
        .queue(style::PrintStyledContent("Image: ".cyan().bold()))?
        .queue(style::Print(format!("{}\n", result.image_tag)))?
        .queue(style::PrintStyledContent("Run:   ".green().bold()))?
        .queue(style::Print(format!("{}\n", result.run_command)))?
        .flush()?;

    Ok(())
}

fn print_health(stdout: &mut impl Write, health: &HealthStatus) -> Result<()> {
    let status = match health.engine {
        EngineStatus::Connected => "connected".green().bold(),
        EngineStatus::Disconnected => "disconnected".red().bold(),
    };

    stdout
        .queue(style::PrintStyledContent("docker: ".cyan().bold()))?
        .queue(style::PrintStyledContent(status))?
        .queue(style::Print(format!(" ({:.0})\n", health.timestamp)))?
        .flush()?;

    Ok(())
}

fn report_error(stdout: &mut impl Write, err: &BuildError, json: bool) -> Result<()> {
    let message = err.public_message();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ErrorResponse { error: message })?
        );
        return Ok(());
    }

    stdout
        .queue(style::PrintStyledContent("ERROR: ".red().bold()))?
        .queue(style::Print(format!("{} ({})\n", message, err.status_code())))?
        .flush()?;

    Ok(())
}
