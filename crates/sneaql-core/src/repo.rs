//! Repo sources materialize step files on the local filesystem.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::TransformConfig;
use crate::error::{SneaqlError, SneaqlResult};
use crate::registry::{Capability, Registry};

/// A directory holding the transform's step files.
pub trait RepoSource {
    fn base_directory(&self) -> &Path;
}

/// Repo type implied by a URL: `git` if it mentions git, `http` if it
/// mentions http.
pub fn repo_type_from_url(url: &str) -> Option<&'static str> {
    let url = url.to_lowercase();
    if url.contains("git") {
        Some("git")
    } else if url.contains("http") {
        Some("http")
    } else {
        None
    }
}

/// An existing local directory, used as-is.
pub struct LocalRepoSource {
    base: PathBuf,
}

impl LocalRepoSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl RepoSource for LocalRepoSource {
    fn base_directory(&self) -> &Path {
        &self.base
    }
}

/// A branch of a remote git repository, cloned into
/// `<repo_base_dir>/<transform_name>`.
pub struct GitRepoSource {
    base: PathBuf,
}

impl GitRepoSource {
    pub fn checkout(config: &TransformConfig) -> SneaqlResult<Self> {
        let url = required(&config.repo_url, "repo_url")?;
        let base = download_directory(config);
        drop_and_rebuild(&base)?;

        tracing::info!(url = %url, dir = %base.display(), "Cloning git repo");
        run_git(Command::new("git").arg("clone").arg(url).arg(&base))?;

        if let Some(branch) = &config.git_branch {
            tracing::info!(branch = %branch, "Checking out branch");
            run_git(Command::new("git").arg("checkout").arg(branch).current_dir(&base))?;
        }
        Ok(Self { base })
    }
}

impl RepoSource for GitRepoSource {
    fn base_directory(&self) -> &Path {
        &self.base
    }
}

/// A single file fetched over HTTP into `<repo_base_dir>/<transform_name>`,
/// extracted in place when `compression` is `zip`.
pub struct HttpRepoSource {
    base: PathBuf,
}

impl HttpRepoSource {
    pub fn fetch(config: &TransformConfig) -> SneaqlResult<Self> {
        let url = required(&config.repo_url, "repo_url")?;
        let base = download_directory(config);
        drop_and_rebuild(&base)?;

        let target = base.join(file_name(url)?);
        tracing::info!(url = %url, target = %target.display(), "Downloading repo");
        let response = reqwest::blocking::get(url)?.error_for_status()?;
        let bytes = response.bytes()?;
        fs::write(&target, &bytes)?;

        if config.compression.as_deref() == Some("zip") {
            unzip(&target, &base)?;
        }
        Ok(Self { base })
    }
}

impl RepoSource for HttpRepoSource {
    fn base_directory(&self) -> &Path {
        &self.base
    }
}

fn download_directory(config: &TransformConfig) -> PathBuf {
    Path::new(&config.repo_base_dir).join(&config.transform_name)
}

fn required<'a>(value: &'a Option<String>, name: &str) -> SneaqlResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SneaqlError::Configuration(format!("{} is required for this repo type", name)))
}

/// Last path segment of a URL.
fn file_name(url: &str) -> SneaqlResult<&str> {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(SneaqlError::Configuration(format!(
            "cannot derive a file name from '{}'",
            url
        ))),
    }
}

/// Remove `dir` and everything under it, then recreate it empty.
fn drop_and_rebuild(dir: &Path) -> SneaqlResult<()> {
    tracing::info!(dir = %dir.display(), "Dropping and recreating repo directory");
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

fn unzip(archive: &Path, into: &Path) -> SneaqlResult<()> {
    tracing::info!(archive = %archive.display(), "Extracting archive");
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    zip.extract(into)?;
    Ok(())
}

fn run_git(command: &mut Command) -> SneaqlResult<()> {
    let output = command
        .output()
        .map_err(|e| SneaqlError::Process(format!("Failed to run git: {}", e)))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(SneaqlError::Process(format!(
            "git exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

pub(crate) fn register_builtins(registry: &mut Registry) {
    registry.register(
        "local",
        Capability::repo_manager(|config| {
            Ok(Box::new(LocalRepoSource::new(&config.repo_base_dir)) as Box<dyn RepoSource>)
        }),
    );
    registry.register(
        "git",
        Capability::repo_manager(|config| {
            Ok(Box::new(GitRepoSource::checkout(config)?) as Box<dyn RepoSource>)
        }),
    );
    registry.register(
        "http",
        Capability::repo_manager(|config| {
            Ok(Box::new(HttpRepoSource::fetch(config)?) as Box<dyn RepoSource>)
        }),
    );
}
