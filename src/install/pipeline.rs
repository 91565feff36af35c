use anyhow::anyhow;
use log::{debug, error, info, warn};
use std::fmt;
use std::path::Path;

use super::Installer;
use crate::archive::ArchiveExtractor;
use crate::checksum::{self, Verification};
use crate::env::EnvironmentContext;
use crate::error::InstallError;
use crate::fetch::Fetcher;
use crate::integrity;
use crate::lock::lock_path;
use crate::package::{InstalledArtifact, PackageMetadata, PackageRef};
use crate::runtime::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Locating,
    LockCheck,
    SkipIfPresent,
    Locked,
    Downloading,
    Verifying,
    Extracting,
    IntegrityChecking,
    Configuring,
    Cleaning,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn enter(package: &PackageRef, stage: Stage) {
    debug!("{}: {}", package, stage);
}

impl<R: Runtime + 'static, F: Fetcher, E: ArchiveExtractor> Installer<R, F, E> {
    /// Install `package` into a single `area`.
    ///
    /// An install that is already present is left alone unless its metadata
    /// asks for an overwrite or an abandoned lock was found. In both cases
    /// `env` is updated for the package; on failure it is left untouched.
    #[tracing::instrument(skip(self, env))]
    pub async fn install_in_area(
        &self,
        package: &PackageRef,
        area: &Path,
        env: &mut EnvironmentContext,
    ) -> Result<InstalledArtifact, InstallError> {
        enter(package, Stage::Locating);
        let metadata = self.locator.locate(package)?;
        let artifact = InstalledArtifact::new(metadata.folder_name(package), area);
        let target = artifact.path();
        let lock = lock_path(area, &artifact.folder_name);

        let mut overwrite;
        loop {
            enter(package, Stage::LockCheck);
            overwrite = metadata.overwrite;
            if self.locks.wait_for_release(&lock).await?.forces_overwrite() {
                warn!(
                    "Previous install of {} in {:?} was abandoned, reinstalling",
                    package, area
                );
                overwrite = true;
            }

            enter(package, Stage::SkipIfPresent);
            if self.runtime.exists(&target) && !overwrite {
                info!(
                    "{} found in {:?}, skipping install",
                    artifact.folder_name, area
                );
                self.configure(package, &metadata, &artifact, env)?;
                enter(package, Stage::Done);
                return Ok(artifact);
            }

            enter(package, Stage::Locked);
            if self.locks.acquire(&lock)? {
                break;
            }
        }

        let result = self
            .install_locked(package, &metadata, &artifact, overwrite, env)
            .await;
        self.locks.release_quietly(&lock);

        match result {
            Ok(()) => {
                enter(package, Stage::Done);
                info!("Successfully installed {} in {:?}", package, area);
                Ok(artifact)
            }
            Err(e) => {
                error!("Could not install {} in {:?}: {}", package, area, e);
                Err(e)
            }
        }
    }

    async fn install_locked(
        &self,
        package: &PackageRef,
        metadata: &PackageMetadata,
        artifact: &InstalledArtifact,
        overwrite: bool,
        env: &mut EnvironmentContext,
    ) -> Result<(), InstallError> {
        let target = artifact.path();
        if overwrite && self.runtime.exists(&target) {
            info!("Overwriting {:?}", target);
            self.remove_quietly(&target);
        }

        let archive = artifact.area.join(metadata.archive_name());
        self.download_verified(package, metadata, &archive, &target)
            .await?;

        let installed = self.unpack(package, &archive, artifact).and_then(|()| {
            enter(package, Stage::IntegrityChecking);
            integrity::check(self.runtime.as_ref(), &target, &self.settings.ignore)
        });
        if let Err(e) = installed {
            // existence marks success, so nothing untrusted may stay behind
            self.remove_quietly(&archive);
            self.remove_quietly(&target);
            return Err(e);
        }

        self.configure(package, metadata, artifact, env)?;

        enter(package, Stage::Cleaning);
        if archive != target && self.runtime.exists(&archive) {
            match self.runtime.remove_file(&archive) {
                Ok(()) => debug!("Removed {:?}", archive),
                Err(e) => warn!("Failed to clean {:?}: {:#}", archive, e),
            }
        }
        Ok(())
    }

    /// Fetch the artifact, fetching again after a checksum mismatch until the
    /// attempt bound is reached.
    async fn download_verified(
        &self,
        package: &PackageRef,
        metadata: &PackageMetadata,
        archive: &Path,
        target: &Path,
    ) -> Result<(), InstallError> {
        let attempts = self.settings.checksum_attempts.max(1);
        let url = &metadata.artifact_url;
        let mut attempt = 0;

        loop {
            attempt += 1;
            enter(package, Stage::Downloading);
            if let Err(source) = self.fetcher.fetch(url, archive).await {
                self.remove_quietly(archive);
                return Err(InstallError::DownloadFailed {
                    url: url.clone(),
                    source,
                });
            }
            if !self.runtime.exists(archive) {
                return Err(InstallError::DownloadFailed {
                    url: url.clone(),
                    source: anyhow!("{:?} not found after download", archive),
                });
            }

            enter(package, Stage::Verifying);
            match checksum::verify(self.runtime.as_ref(), archive, metadata.checksum.as_deref()) {
                Verification::Mismatch { expected, actual } => {
                    self.remove_quietly(archive);
                    self.remove_quietly(target);
                    if attempt >= attempts {
                        return Err(InstallError::ChecksumFailed {
                            file: archive.to_path_buf(),
                            expected,
                            actual,
                            attempts: attempt,
                        });
                    }
                    warn!(
                        "Checksum of {:?} is wrong (attempt {}/{}), downloading again",
                        archive, attempt, attempts
                    );
                }
                Verification::Matched | Verification::Skipped => return Ok(()),
            }
        }
    }

    /// Unpack archives in place; anything else is the artifact itself.
    fn unpack(
        &self,
        package: &PackageRef,
        archive: &Path,
        artifact: &InstalledArtifact,
    ) -> Result<(), InstallError> {
        enter(package, Stage::Extracting);
        let target = artifact.path();
        let extract_failed = |source: anyhow::Error| InstallError::ExtractFailed {
            archive: archive.to_path_buf(),
            source,
        };

        if self.extractor.can_handle(archive) {
            let top_level = self
                .extractor
                .extract(self.runtime.as_ref(), archive, &artifact.area)
                .map_err(extract_failed)?;

            if package.family().renames_extracted_root() {
                let first = top_level
                    .first()
                    .ok_or_else(|| extract_failed(anyhow!("archive has no top-level entry")))?;
                let extracted = artifact.area.join(first);
                if extracted != target {
                    if self.runtime.exists(&target) {
                        self.remove_quietly(&target);
                    }
                    debug!("Renaming {:?} to {:?}", extracted, target);
                    self.runtime
                        .rename(&extracted, &target)
                        .map_err(extract_failed)?;
                }
            }
        } else {
            debug!("{:?} is not an archive, using it as is", archive);
        }

        if !self.runtime.exists(&target) {
            return Err(extract_failed(anyhow!(
                "{:?} not found after extraction",
                target
            )));
        }
        if self.runtime.is_dir(&target) {
            let entries = self.runtime.read_dir(&target).map_err(extract_failed)?;
            if entries.is_empty() {
                return Err(extract_failed(anyhow!("{:?} is empty", target)));
            }
        }
        Ok(())
    }

    /// Configure into a scratch copy, committed to `env` only on success.
    fn configure(
        &self,
        package: &PackageRef,
        metadata: &PackageMetadata,
        artifact: &InstalledArtifact,
        env: &mut EnvironmentContext,
    ) -> Result<(), InstallError> {
        enter(package, Stage::Configuring);
        let mut scratch = env.clone();
        self.configurator
            .configure(package, metadata, artifact, &mut scratch)?;
        *env = scratch;
        Ok(())
    }

    fn remove_quietly(&self, path: &Path) {
        if !self.runtime.exists(path) {
            return;
        }
        let result = if self.runtime.is_dir(path) {
            self.runtime.remove_dir_all(path)
        } else {
            self.runtime.remove_file(path)
        };
        if let Err(e) = result {
            warn!("Failed to remove {:?}: {:#}", path, e);
        }
    }
}
