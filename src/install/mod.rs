//! Installing packages into shared install areas.
//!
//! # Structure
//!
//! - `pipeline` - One package in one area, under the area's advisory lock
//! - `area` - Area fallback and dependency ordering on top of the pipeline

mod area;
mod pipeline;

use serde::Serialize;
use std::sync::Arc;

use crate::archive::ArchiveExtractor;
use crate::config::PackageLocator;
use crate::env::{Configurator, EnvironmentContext};
use crate::fetch::Fetcher;
use crate::integrity::IgnoreList;
use crate::lock::{LockCoordinator, LockPolicy};
use crate::package::{InstalledArtifact, PackageRef};
use crate::runtime::Runtime;

/// Tunables of an install run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSettings {
    pub lock_policy: LockPolicy,
    /// Manifest entries and bundled libraries matching these are ignored
    pub ignore: IgnoreList,
    /// Downloads tried before a checksum mismatch is final
    pub checksum_attempts: u32,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            lock_policy: LockPolicy::default(),
            ignore: IgnoreList::default(),
            checksum_attempts: 2,
        }
    }
}

/// Result of a successful install request.
#[derive(Debug, Clone, Serialize)]
pub struct Installation {
    pub package: PackageRef,
    pub artifact: InstalledArtifact,
    /// Every package handled, dependencies first
    pub installed: Vec<(PackageRef, InstalledArtifact)>,
    pub environment: EnvironmentContext,
}

pub struct Installer<R: Runtime, F: Fetcher, E: ArchiveExtractor> {
    runtime: Arc<R>,
    fetcher: F,
    extractor: E,
    locator: PackageLocator,
    locks: LockCoordinator<R>,
    configurator: Configurator<R>,
    settings: InstallSettings,
}

impl<R: Runtime + 'static, F: Fetcher, E: ArchiveExtractor> Installer<R, F, E> {
    #[tracing::instrument(skip(runtime, fetcher, extractor, locator))]
    pub fn new(
        runtime: Arc<R>,
        fetcher: F,
        extractor: E,
        locator: PackageLocator,
        settings: InstallSettings,
    ) -> Self {
        let locks = LockCoordinator::new(Arc::clone(&runtime), settings.lock_policy);
        let configurator = Configurator::new(Arc::clone(&runtime), settings.ignore.clone());
        Self {
            runtime,
            fetcher,
            extractor,
            locator,
            locks,
            configurator,
            settings,
        }
    }

}
