use anyhow::{anyhow, Context, Result};
use bollard::{
    body_full, errors::Error as EngineError, models::BuildInfo,
    query_parameters::BuildImageOptionsBuilder, Docker, API_DEFAULT_VERSION,
};
use bytes::Bytes;
use futures::StreamExt;
use ignore::WalkBuilder;
use log::{debug, info};
use number_prefix::NumberPrefix;
use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    path::Path,
};
use tar::Builder as TarBuilder;
use tempfile::TempDir;
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};

use crate::{
    dockerfile::DOCKERFILE_NAME,
    error::BuildError,
    models::{BuiltImage, ImageBuildSpec},
    services::ImageBuilder,
};

const CONNECT_TIMEOUT_SECS: u64 = 120;

pub struct DockerBackend {
    runtime: Runtime,
    client: Docker,
}

impl DockerBackend {
    /// Connects to `host`, or to the local defaults (`DOCKER_HOST` or the
    /// platform socket) when no host is given, and checks that the engine
    /// answers.
    pub fn connect(host: Option<&str>) -> Result<DockerBackend> {
        let runtime = RuntimeBuilder::new_current_thread().enable_all().build()?;

        let client = {
            let _guard = runtime.enter();
            match host {
                Some(host) if host.starts_with("unix://") || host.starts_with("npipe://") => {
                    Docker::connect_with_socket(host, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)?
                }
                Some(host) => {
                    Docker::connect_with_http(host, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)?
                }
                None => Docker::connect_with_local_defaults()?,
            }
        };

        runtime
            .block_on(client.ping())
            .context("the container engine did not answer ping")?;

        Ok(DockerBackend { runtime, client })
    }
}

impl ImageBuilder for DockerBackend {
    fn build_image(&self, spec: &ImageBuildSpec) -> Result<BuiltImage, BuildError> {
        let context = archive_context(&spec.context)?;

        let labels = spec
            .labels
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect::<HashMap<_, _>>();

        let options = BuildImageOptionsBuilder::default()
            .dockerfile(DOCKERFILE_NAME)
            .t(&spec.tag.0)
            .rm(true)
            .forcerm(true)
            .labels(&labels)
            .build();

        info!("building image {}", spec.tag);

        let records = self.runtime.block_on(async {
            let mut stream = self
                .client
                .build_image(options, None, Some(body_full(Bytes::from(context))));

            let mut records = Vec::new();
            while let Some(record) = stream.next().await {
                records.push(record?);
            }

            Ok::<_, EngineError>(records)
        });

        let records = records.map_err(|err| BuildError::BuildFailed(engine_message(err)))?;

        if let Some(message) = records.iter().find_map(record_error) {
            return Err(BuildError::BuildFailed(message));
        }

        if let Some(id) = records
            .iter()
            .filter_map(|record| record.aux.as_ref())
            .find_map(|aux| aux.id.as_deref())
        {
            debug!("built image {} ({})", spec.tag, id);
        }

        let log_lines = stream_lines(records.iter().map(|record| record.stream.as_deref()));

        Ok(BuiltImage {
            tag: spec.tag.clone(),
            log_lines,
        })
    }

    fn ping(&self) -> bool {
        self.runtime.block_on(self.client.ping()).is_ok()
    }
}

fn engine_message(err: EngineError) -> String {
    match err {
        EngineError::DockerStreamError { error } => error,
        EngineError::DockerResponseServerError { message, .. } => message,
        other => other.to_string(),
    }
}

fn record_error(record: &BuildInfo) -> Option<String> {
    record
        .error_detail
        .as_ref()
        .and_then(|detail| detail.message.clone())
        .filter(|message| !message.trim().is_empty())
}

/// Keeps the textual `stream` field of each build record, trimmed, dropping
/// records without one and lines that are empty after trimming.
pub fn stream_lines<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    records
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Packs `context` into a tar archive, honouring `.dockerignore` and leaving
/// out the `.git` directory.
pub fn archive_context(context: &Path) -> Result<Vec<u8>> {
    let temp_dir = TempDir::new()?;
    let temp_context_path = temp_dir.path().join("context.tar");
    let temp_context = {
        let mut options = OpenOptions::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options.write(true).create(true).open(&temp_context_path)?
    };

    let mut tar = TarBuilder::new(temp_context);
    // links are stored as links, never as the host file they point at
    tar.follow_symlinks(false);

    let walk = WalkBuilder::new(context)
        .add_custom_ignore_filename(".dockerignore")
        .ignore(false)
        .git_global(false)
        .git_ignore(false)
        .git_exclude(false)
        .hidden(false)
        .parents(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut context_size = 0;
    for result in walk {
        let result = result?;
        let relative = result.path().strip_prefix(context)?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        tar.append_path_with_name(result.path(), relative)
            .with_context(|| format!("failed to archive {:?}", relative))?;
        if result.file_type().map(|t| t.is_file()).unwrap_or(false) {
            context_size += result.metadata()?.len();
        }
    }

    match NumberPrefix::binary(context_size as f32) {
        NumberPrefix::Standalone(bytes) => info!("archived build context ({} bytes)", bytes),
        NumberPrefix::Prefixed(prefix, n) => {
            info!("archived build context ({:.1} {}B)", n, prefix)
        }
    };

    tar.finish()?;
    drop(tar);

    let archive = fs::read(&temp_context_path)
        .map_err(|err| anyhow!("failed to read build context archive: {}", err))?;
    temp_dir.close()?;

    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::BTreeSet as Set, io::Cursor};

    #[test]
    fn keeps_trimmed_stream_lines_in_order() {
        let raw = vec![
            Some("Step 1/4 : FROM nginx:alpine\n"),
            None,
            Some("   \n"),
            Some(" ---> a1b2c3\n"),
            None,
            Some(""),
            Some("Successfully built a1b2c3\n"),
        ];

        let lines = stream_lines(raw);
        assert_eq!(
            lines,
            vec![
                "Step 1/4 : FROM nginx:alpine",
                "---> a1b2c3",
                "Successfully built a1b2c3",
            ]
        );

        let again = stream_lines(lines.iter().map(|line| Some(line.as_str())));
        assert_eq!(again, lines);
    }

    #[test]
    fn no_stream_records_means_no_lines() {
        assert!(stream_lines(vec![None, None]).is_empty());
    }

    #[test]
    fn archive_honours_dockerignore_and_skips_git() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/App.js"), "export default 1").unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();
        fs::write(root.join("secret.env"), "TOKEN=1").unwrap();
        fs::write(root.join(".dockerignore"), "secret.env\n").unwrap();
        fs::write(root.join("Dockerfile"), "FROM scratch").unwrap();

        let archive = archive_context(root).unwrap();
        let mut tar = tar::Archive::new(Cursor::new(archive));
        let names = tar
            .entries()
            .unwrap()
            .map(|entry| entry.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect::<Set<_>>();

        assert!(names.contains("Dockerfile"));
        assert!(names.contains("package.json"));
        assert!(names.contains("src/App.js"));
        assert!(!names.contains("secret.env"));
        assert!(names.iter().all(|name| !name.starts_with(".git/") && name != ".git"));
    }

    #[cfg(unix)]
    #[test]
    fn archive_keeps_symlinks_as_links() {
        use std::os::unix::fs::symlink;
        use tar::EntryType;

        let outside = TempDir::new().unwrap();
        let host_file = outside.path().join("shadow");
        fs::write(&host_file, "HOST-SECRET").unwrap();

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("index.html"), "<h1>hi</h1>").unwrap();
        symlink(&host_file, root.join("leak")).unwrap();
        symlink("/nonexistent/target", root.join("broken")).unwrap();
        symlink("index.html", root.join("home.html")).unwrap();

        let archive = archive_context(root).unwrap();
        let mut tar = tar::Archive::new(Cursor::new(archive));

        let mut links = Set::new();
        for entry in tar.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mut content = String::new();
            std::io::Read::read_to_string(&mut entry, &mut content).unwrap();
            assert!(!content.contains("HOST-SECRET"), "{} leaked a host file", name);

            if entry.header().entry_type() == EntryType::Symlink {
                links.insert(name);
            }
        }

        let expected = ["broken", "home.html", "leak"]
            .iter()
            .map(|name| name.to_string())
            .collect::<Set<_>>();
        assert_eq!(links, expected);
    }
}
