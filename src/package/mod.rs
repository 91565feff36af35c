//! Package model
//!
//! Identity of a requested package, the metadata the configuration service
//! registers for it, and the on-disk result of an install.

mod family;
mod resolve;

pub use family::PackageFamily;
pub use resolve::resolve_dependencies;

use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Archive suffixes stripped from a tarball name to obtain its folder name.
const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar", ".zip"];

/// A requested (name, version) pair. Names compare case-insensitively.
#[derive(Debug, Clone, Serialize)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Lowercase name used for configuration lookups.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn family(&self) -> PackageFamily {
        PackageFamily::from_name(&self.name)
    }
}

impl PartialEq for PackageRef {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.version == other.version
    }
}

impl Eq for PackageRef {}

impl Hash for PackageRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Everything the configuration service knows about one package version.
/// Looked up fresh for every install attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageMetadata {
    /// Registered tarball name, e.g. `root_6.0.tgz` or `lcsim-1.2.jar`
    pub tarball: String,
    /// Full URL the tarball is fetched from
    pub artifact_url: String,
    /// Expected hex digest of the tarball, if registered
    pub checksum: Option<String>,
    pub overwrite: bool,
    pub dependencies: Vec<PackageRef>,
    /// Extra variables exported once the package is configured
    pub extra_env: Vec<(String, String)>,
}

impl PackageMetadata {
    /// File name the downloaded artifact is stored under.
    pub fn archive_name(&self) -> String {
        Path::new(&self.tarball)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.tarball.clone())
    }

    /// Folder the package occupies inside an install area.
    ///
    /// Single-file artifacts (jars and the like) keep their file name, so the
    /// downloaded file is itself the installed artifact.
    pub fn folder_name(&self, package: &PackageRef) -> String {
        if package.family().renames_extracted_root() {
            return format!("{}{}", package.key(), package.version);
        }

        let archive = self.archive_name();
        ARCHIVE_SUFFIXES
            .iter()
            .find_map(|suffix| {
                let split = archive.len().checked_sub(suffix.len())?;
                let tail = archive.get(split..)?;
                tail.eq_ignore_ascii_case(suffix)
                    .then(|| archive[..split].to_string())
            })
            .unwrap_or(archive)
    }
}

/// A package present in an install area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledArtifact {
    pub folder_name: String,
    pub area: PathBuf,
}

impl InstalledArtifact {
    pub fn new(folder_name: impl Into<String>, area: impl Into<PathBuf>) -> Self {
        Self {
            folder_name: folder_name.into(),
            area: area.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.area.join(&self.folder_name)
    }
}
