// src/plan/mod.rs

//! Installation plan data model
//!
//! A plan is a dependency-ordered table of package actions produced by an
//! external resolver. Each row names a package, where its source or binary
//! archive lives, and which other packages must be installed before it can
//! be built. The executor walks rows through `pending -> built -> installed`.

pub mod state;

use crate::error::{Error, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Where a package comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Cran,
    Bioc,
    Standard,
    Local,
    Github,
    /// Placeholder row for a dependency satisfied outside the plan
    Deps,
    /// Already present in the target library
    Installed,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cran => "cran",
            Self::Bioc => "bioc",
            Self::Standard => "standard",
            Self::Local => "local",
            Self::Github => "github",
            Self::Deps => "deps",
            Self::Installed => "installed",
        }
    }

    /// Rows of these types never build or install anything.
    pub fn is_preinstalled(&self) -> bool {
        matches!(self, Self::Deps | Self::Installed)
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a source package needs compilation (tri-state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compilation {
    Yes,
    No,
    #[default]
    Unknown,
}

impl Compilation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unknown => "unknown",
        }
    }
}

// Plans in the wild carry this as "yes"/"no", a bare boolean, or null.
impl<'de> Deserialize<'de> for Compilation {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CompilationVisitor;

        impl<'de> Visitor<'de> for CompilationVisitor {
            type Value = Compilation;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"yes\", \"no\", \"unknown\", a boolean, or null")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Compilation, E> {
                Ok(if v { Compilation::Yes } else { Compilation::No })
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Compilation, E> {
                match v {
                    "yes" | "true" => Ok(Compilation::Yes),
                    "no" | "false" => Ok(Compilation::No),
                    "unknown" | "" => Ok(Compilation::Unknown),
                    other => Err(E::unknown_variant(other, &["yes", "no", "unknown"])),
                }
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Compilation, E> {
                Ok(Compilation::Unknown)
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Compilation, E> {
                Ok(Compilation::Unknown)
            }
        }

        deserializer.deserialize_any(CompilationVisitor)
    }
}

/// Library status of a row, as computed by the resolver.
///
/// Consumed here only for the final summary counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibStatus {
    #[default]
    New,
    Update,
    NoUpdate,
    Current,
}

/// Wall-clock bookkeeping for one phase of one row.
///
/// A phase is either untouched, running (start stamp), or finished
/// (elapsed duration). Keeping the variants separate avoids the classic
/// overloaded-field bug where a timestamp is read as a duration.
#[derive(Debug, Clone, Copy, Default)]
pub enum Timing {
    #[default]
    NotStarted,
    Started(Instant),
    Elapsed(Duration),
}

impl Timing {
    /// Stamp the phase as running now.
    pub fn start() -> Self {
        Timing::Started(Instant::now())
    }

    /// Convert a running stamp into an elapsed duration.
    pub fn finish(&mut self) -> Duration {
        let elapsed = match *self {
            Timing::Started(at) => at.elapsed(),
            Timing::Elapsed(d) => d,
            Timing::NotStarted => Duration::ZERO,
        };
        *self = Timing::Elapsed(elapsed);
        elapsed
    }

    /// Elapsed duration, if the phase has finished.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Timing::Elapsed(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Timing::Started(_))
    }
}

/// Mutable execution state of one plan row.
///
/// Owned and mutated exclusively by the executor thread.
#[derive(Debug, Clone, Default)]
pub struct RowExecution {
    pub build_done: bool,
    pub install_done: bool,
    pub build_error: bool,
    pub install_error: bool,
    pub build_time: Timing,
    pub install_time: Timing,
    pub build_stdout: Vec<String>,
    pub build_stderr: Vec<String>,
    pub install_stdout: Vec<String>,
    pub install_stderr: Vec<String>,
    /// Worker currently acting on this row, if any
    pub worker_id: Option<u64>,
    /// Dependencies not yet installed
    pub deps_left: BTreeSet<String>,
}

/// One row of the installation plan.
///
/// The serialized columns are immutable inputs from the resolver; `run`
/// holds the execution fields and never round-trips through serde.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanRow {
    pub package: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: PackageType,
    /// True when `file` is already a binary archive
    #[serde(default)]
    pub binary: bool,
    /// Source tarball or binary archive; replaced by the built archive
    /// once a build succeeds
    #[serde(default)]
    pub file: PathBuf,
    /// Alternative local paths for the package sources
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    /// Names of packages that must be installed before this one builds
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default)]
    pub vignettes: bool,
    #[serde(default)]
    pub needs_compilation: Compilation,
    /// Provenance key/value pairs; recognised display keys are
    /// `RemoteUsername`, `RemoteRepo`, `RemoteSha`, `RemoteType`
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub lib_status: LibStatus,
    #[serde(skip)]
    pub run: RowExecution,
}

impl PlanRow {
    /// Seed the done flags from the row's type, and the residual
    /// dependency set from `dependencies`.
    ///
    /// `installed_names` must be the package names of every row that is
    /// pre-seeded as installed, so that `deps_left` starts out consistent
    /// with the install-done set.
    pub(crate) fn preseed(&mut self, installed_names: &BTreeSet<String>) {
        if self.kind.is_preinstalled() {
            self.run.build_done = true;
            self.run.install_done = true;
        } else if self.binary {
            self.run.build_done = true;
        }
        self.run.deps_left = self
            .dependencies
            .iter()
            .filter(|d| *d != &self.package && !installed_names.contains(*d))
            .cloned()
            .collect();
    }

    pub fn needs_build(&self) -> bool {
        !self.run.build_done
    }

    pub fn needs_install(&self) -> bool {
        !self.run.install_done
    }

    /// Provenance note shown next to the install alert.
    pub fn install_note(&self) -> String {
        match self.kind {
            PackageType::Bioc => "(BioC)".to_string(),
            PackageType::Local => "(local)".to_string(),
            PackageType::Github => {
                let user = self.meta_or("RemoteUsername", "?");
                let repo = self.meta_or("RemoteRepo", "?");
                let sha: String = self
                    .meta_or("RemoteSha", "")
                    .chars()
                    .take(7)
                    .collect();
                format!("(github::{}/{}@{})", user, repo, sha)
            }
            PackageType::Standard => match self.metadata.get("RemoteType") {
                Some(t) if t != "standard" && t != "cran" => format!("({})", t),
                _ => String::new(),
            },
            PackageType::Cran | PackageType::Deps | PackageType::Installed => String::new(),
        }
    }

    fn meta_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.metadata.get(key).map(String::as_str).unwrap_or(default)
    }
}

/// Validate a plan before anything is spawned.
///
/// Checks the fail-fast conditions: no duplicate package names, every
/// dependency resolves to a row of the plan, and rows that will actually
/// run have an input archive or source path.
pub fn validate_plan(rows: &[PlanRow]) -> Result<()> {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for row in rows {
        if !names.insert(&row.package) {
            return Err(Error::InvalidPlan(format!(
                "duplicate package '{}'",
                row.package
            )));
        }
    }

    for row in rows {
        for dep in &row.dependencies {
            if !names.contains(dep.as_str()) {
                return Err(Error::InvalidPlan(format!(
                    "package '{}' depends on '{}', which is not in the plan",
                    row.package, dep
                )));
            }
        }
        if !row.kind.is_preinstalled() && row.file.as_os_str().is_empty() {
            return Err(Error::InvalidPlan(format!(
                "package '{}' has no file to build or install",
                row.package
            )));
        }
    }

    Ok(())
}

/// Default target library directory.
///
/// The first entry of the `PACKRUN_LIBPATH` search path, falling back to
/// `./library`. Probed once per process.
pub fn default_library() -> &'static Path {
    static DEFAULT_LIB: OnceLock<PathBuf> = OnceLock::new();
    DEFAULT_LIB.get_or_init(|| {
        std::env::var_os("PACKRUN_LIBPATH")
            .and_then(|v| std::env::split_paths(&v).next())
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("library"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(package: &str, kind: PackageType, binary: bool, deps: &[&str]) -> PlanRow {
        PlanRow {
            package: package.to_string(),
            version: "1.0.0".to_string(),
            kind,
            binary,
            file: PathBuf::from(format!("{}.tar.gz", package)),
            sources: Vec::new(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            vignettes: false,
            needs_compilation: Compilation::Unknown,
            metadata: BTreeMap::new(),
            lib_status: LibStatus::New,
            run: RowExecution::default(),
        }
    }

    #[test]
    fn test_preseed_installed_row() {
        let mut r = row("a", PackageType::Installed, true, &[]);
        r.preseed(&BTreeSet::new());
        assert!(r.run.build_done);
        assert!(r.run.install_done);
    }

    #[test]
    fn test_preseed_binary_row_skips_build_only() {
        let mut r = row("a", PackageType::Cran, true, &[]);
        r.preseed(&BTreeSet::new());
        assert!(r.run.build_done);
        assert!(!r.run.install_done);
    }

    #[test]
    fn test_preseed_strips_self_and_installed_deps() {
        let installed: BTreeSet<String> = ["b".to_string()].into_iter().collect();
        let mut r = row("a", PackageType::Cran, false, &["a", "b", "c"]);
        r.preseed(&installed);
        assert_eq!(
            r.run.deps_left,
            ["c".to_string()].into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_compilation_accepts_strings_booleans_and_null() {
        #[derive(Deserialize)]
        struct Wrap {
            #[serde(default)]
            nc: Compilation,
        }

        let cases = [
            (r#"{"nc": "yes"}"#, Compilation::Yes),
            (r#"{"nc": false}"#, Compilation::No),
            (r#"{"nc": null}"#, Compilation::Unknown),
            (r#"{}"#, Compilation::Unknown),
        ];
        for (json, expected) in cases {
            let w: Wrap = serde_json::from_str(json).unwrap();
            assert_eq!(w.nc, expected, "input: {}", json);
        }

        assert!(serde_json::from_str::<Wrap>(r#"{"nc": "maybe"}"#).is_err());
    }

    #[test]
    fn test_lib_status_kebab_case() {
        #[derive(Deserialize)]
        struct Wrap {
            s: LibStatus,
        }
        let w: Wrap = serde_json::from_str(r#"{"s": "no-update"}"#).unwrap();
        assert_eq!(w.s, LibStatus::NoUpdate);
    }

    #[test]
    fn test_plan_row_from_json() {
        let json = r#"{
            "package": "curl",
            "version": "5.2.1",
            "type": "cran",
            "binary": false,
            "file": "/tmp/curl_5.2.1.tar.gz",
            "dependencies": ["jsonlite"],
            "vignettes": true,
            "needs_compilation": "yes",
            "metadata": {"RemoteSha": "0123456789abcdef"},
            "lib_status": "update"
        }"#;
        let r: PlanRow = serde_json::from_str(json).unwrap();
        assert_eq!(r.package, "curl");
        assert_eq!(r.kind, PackageType::Cran);
        assert_eq!(r.needs_compilation, Compilation::Yes);
        assert_eq!(r.lib_status, LibStatus::Update);
        assert!(!r.run.build_done);
    }

    #[test]
    fn test_install_note_variants() {
        let mut r = row("a", PackageType::Bioc, false, &[]);
        assert_eq!(r.install_note(), "(BioC)");

        r.kind = PackageType::Local;
        assert_eq!(r.install_note(), "(local)");

        r.kind = PackageType::Cran;
        assert_eq!(r.install_note(), "");

        r.kind = PackageType::Github;
        r.metadata
            .insert("RemoteUsername".to_string(), "r-lib".to_string());
        r.metadata.insert("RemoteRepo".to_string(), "curl".to_string());
        r.metadata
            .insert("RemoteSha".to_string(), "0123456789abcdef".to_string());
        assert_eq!(r.install_note(), "(github::r-lib/curl@0123456)");

        r.kind = PackageType::Standard;
        assert_eq!(r.install_note(), "");
        r.metadata
            .insert("RemoteType".to_string(), "url".to_string());
        assert_eq!(r.install_note(), "(url)");
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let rows = vec![
            row("a", PackageType::Cran, false, &[]),
            row("a", PackageType::Cran, false, &[]),
        ];
        assert!(matches!(
            validate_plan(&rows),
            Err(Error::InvalidPlan(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_dependency() {
        let rows = vec![row("a", PackageType::Cran, false, &["ghost"])];
        assert!(matches!(
            validate_plan(&rows),
            Err(Error::InvalidPlan(msg)) if msg.contains("ghost")
        ));
    }

    #[test]
    fn test_validate_requires_file_for_action_rows() {
        let mut r = row("a", PackageType::Cran, false, &[]);
        r.file = PathBuf::new();
        assert!(validate_plan(&[r]).is_err());

        let mut r = row("a", PackageType::Deps, false, &[]);
        r.file = PathBuf::new();
        assert!(validate_plan(&[r]).is_ok());
    }

    #[test]
    fn test_timing_transitions() {
        let mut t = Timing::start();
        assert!(t.is_running());
        assert_eq!(t.elapsed(), None);

        let d = t.finish();
        assert_eq!(t.elapsed(), Some(d));
        assert!(!t.is_running());

        let mut untouched = Timing::NotStarted;
        assert_eq!(untouched.finish(), Duration::ZERO);
    }
}
