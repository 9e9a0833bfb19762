// src/runner/mod.rs

//! Build and install collaborators
//!
//! The executor does not know how packages are actually built or installed;
//! it hands a request to a `BuildRunner` or `InstallRunner` and supervises
//! the subprocess it gets back. The shipped runners execute a configurable
//! shell command with the request exported through `PACKRUN_*` environment
//! variables, which keeps the real build/install tooling out of process.

use crate::error::{Error, Result};
use crate::plan::Compilation;
use crate::worker::WorkerProcess;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Everything a build needs to know about one source package.
#[derive(Debug)]
pub struct BuildRequest<'a> {
    pub package: &'a str,
    pub version: &'a str,
    /// Source tarball or directory
    pub path: &'a Path,
    /// Scratch directory the archive must be produced in
    pub tmp_dir: &'a Path,
    /// Library-search path prefix for build-time dependencies
    pub lib: &'a Path,
    pub vignettes: bool,
    pub needs_compilation: Compilation,
}

/// Everything an install needs to know about one binary archive.
#[derive(Debug)]
pub struct InstallRequest<'a> {
    pub package: &'a str,
    pub version: &'a str,
    pub archive: &'a Path,
    pub lib: &'a Path,
    pub metadata: &'a BTreeMap<String, String>,
}

/// A spawned build worker plus the archive path it is expected to produce.
#[derive(Debug)]
pub struct SpawnedBuild {
    pub process: WorkerProcess,
    pub artifact: PathBuf,
}

/// Starts a subprocess that builds a source package into a binary archive.
pub trait BuildRunner {
    fn start_build(&self, req: &BuildRequest<'_>) -> Result<SpawnedBuild>;
}

/// Starts a subprocess that installs a binary archive into the library.
pub trait InstallRunner {
    fn start_install(&self, req: &InstallRequest<'_>) -> Result<WorkerProcess>;
}

/// Default build command: pack the source tree into the expected archive.
pub const DEFAULT_BUILD_CMD: &str = "tar czf \"$PACKRUN_ARTIFACT\" \
     -C \"$(dirname \"$PACKRUN_PATH\")\" \"$(basename \"$PACKRUN_PATH\")\"";

/// Default install command: unpack the archive into the library.
pub const DEFAULT_INSTALL_CMD: &str =
    "mkdir -p \"$PACKRUN_LIB\" && tar xzf \"$PACKRUN_ARCHIVE\" -C \"$PACKRUN_LIB\"";

/// Build runner that executes a shell command.
///
/// The command sees the request as `PACKRUN_PACKAGE`, `PACKRUN_VERSION`,
/// `PACKRUN_PATH`, `PACKRUN_TMPDIR`, `PACKRUN_LIB`, `PACKRUN_ARTIFACT`,
/// `PACKRUN_VIGNETTES` and `PACKRUN_NEEDS_COMPILATION`, and must leave the
/// binary archive at `$PACKRUN_ARTIFACT`.
#[derive(Debug, Clone)]
pub struct ShellBuildRunner {
    command: String,
}

impl ShellBuildRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for ShellBuildRunner {
    fn default() -> Self {
        Self::new(DEFAULT_BUILD_CMD)
    }
}

impl BuildRunner for ShellBuildRunner {
    fn start_build(&self, req: &BuildRequest<'_>) -> Result<SpawnedBuild> {
        let artifact = req
            .tmp_dir
            .join(format!("{}_{}.tar.gz", req.package, req.version));

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .env("PACKRUN_PACKAGE", req.package)
            .env("PACKRUN_VERSION", req.version)
            .env("PACKRUN_PATH", req.path)
            .env("PACKRUN_TMPDIR", req.tmp_dir)
            .env("PACKRUN_LIB", req.lib)
            .env("PACKRUN_ARTIFACT", &artifact)
            .env("PACKRUN_VIGNETTES", bool_str(req.vignettes))
            .env("PACKRUN_NEEDS_COMPILATION", req.needs_compilation.as_str());

        debug!(package = req.package, artifact = %artifact.display(), "starting build worker");
        let process = WorkerProcess::spawn(cmd).map_err(|source| Error::Spawn {
            package: req.package.to_string(),
            phase: "build",
            source,
        })?;

        Ok(SpawnedBuild { process, artifact })
    }
}

/// Install runner that executes a shell command.
///
/// The command sees `PACKRUN_PACKAGE`, `PACKRUN_VERSION`, `PACKRUN_ARCHIVE`
/// and `PACKRUN_LIB`, plus one `PACKRUN_META_<KEY>` variable per metadata
/// entry.
#[derive(Debug, Clone)]
pub struct ShellInstallRunner {
    command: String,
}

impl ShellInstallRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for ShellInstallRunner {
    fn default() -> Self {
        Self::new(DEFAULT_INSTALL_CMD)
    }
}

impl InstallRunner for ShellInstallRunner {
    fn start_install(&self, req: &InstallRequest<'_>) -> Result<WorkerProcess> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .env("PACKRUN_PACKAGE", req.package)
            .env("PACKRUN_VERSION", req.version)
            .env("PACKRUN_ARCHIVE", req.archive)
            .env("PACKRUN_LIB", req.lib);
        for (key, value) in req.metadata {
            cmd.env(format!("PACKRUN_META_{}", env_key(key)), value);
        }

        debug!(package = req.package, archive = %req.archive.display(), "starting install worker");
        WorkerProcess::spawn(cmd).map_err(|source| Error::Spawn {
            package: req.package.to_string(),
            phase: "install",
            source,
        })
    }
}

fn bool_str(v: bool) -> &'static str {
    if v {
        "true"
    } else {
        "false"
    }
}

/// Metadata keys become environment-safe: uppercased, non-alphanumerics
/// replaced with underscores.
fn env_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
