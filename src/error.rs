//! Error taxonomy of the installer.

use std::path::PathBuf;
use thiserror::Error;

use crate::package::PackageRef;

/// The configuration service has no usable entry for a package.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("could not find tarball for {package} on {platform}")]
    MissingTarball { package: PackageRef, platform: String },

    #[error("could not find tarball URL for {package} on {platform}")]
    MissingUrl { package: PackageRef, platform: String },
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("not allowed to create lock {path:?}: {source}")]
    AcquireDenied {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("lock {path:?} was never released after {cycles} wait cycles, removed it")]
    BuggyLock { path: PathBuf, cycles: u32 },

    #[error("failed to clear lock {path:?}: {source}")]
    ReleaseFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    LocateFailed(#[from] LocateError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("failed to download {url}: {source:#}")]
    DownloadFailed {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("checksum of {file:?} does not match after {attempts} attempts: expected {expected}, found {actual}")]
    ChecksumFailed {
        file: PathBuf,
        expected: String,
        actual: String,
        attempts: u32,
    },

    #[error("could not extract {archive:?}: {source:#}")]
    ExtractFailed {
        archive: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("incomplete install: the file {path:?} is missing")]
    IncompleteInstall { path: PathBuf },

    #[error("corrupted install: file {path:?} has a wrong checksum")]
    CorruptedInstall { path: PathBuf },

    #[error("could not configure environment for {package}: {reason}")]
    EnvResolutionFailed { package: PackageRef, reason: String },

    #[error("failed to install dependency {dependency}: {source}")]
    DependencyFailed {
        dependency: PackageRef,
        #[source]
        source: Box<InstallError>,
    },

    #[error("{}", no_area_message(.package, .last.as_deref()))]
    NoAreaAvailable {
        package: PackageRef,
        last: Option<Box<InstallError>>,
    },
}

fn no_area_message(package: &PackageRef, last: Option<&InstallError>) -> String {
    match last {
        Some(cause) => format!("failed to install {} in any area: {}", package, cause),
        None => format!("failed to install {}: no install area available", package),
    }
}

impl InstallError {
    /// The innermost failure, skipping the dependency and area wrappers.
    pub fn root_cause(&self) -> &InstallError {
        match self {
            Self::DependencyFailed { source, .. } => source.root_cause(),
            Self::NoAreaAvailable {
                last: Some(last), ..
            } => last.root_cause(),
            other => other,
        }
    }
}
