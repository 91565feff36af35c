use log::{debug, info, warn};
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use super::{Installation, Installer};
use crate::archive::ArchiveExtractor;
use crate::env::EnvironmentContext;
use crate::error::InstallError;
use crate::fetch::Fetcher;
use crate::package::{InstalledArtifact, PackageRef, resolve_dependencies};
use crate::runtime::Runtime;

type InstallFuture<'a> = Pin<Box<dyn Future<Output = Result<InstalledArtifact, InstallError>> + 'a>>;

/// Bookkeeping shared by one install request.
#[derive(Default)]
struct Progress {
    visited: HashSet<PackageRef>,
    installed: Vec<(PackageRef, InstalledArtifact)>,
}

impl<R: Runtime + 'static, F: Fetcher, E: ArchiveExtractor> Installer<R, F, E> {
    /// Try `areas` in order until one takes the package.
    #[tracing::instrument(skip(self, env))]
    pub async fn install_anywhere(
        &self,
        package: &PackageRef,
        areas: &[PathBuf],
        env: &mut EnvironmentContext,
    ) -> Result<InstalledArtifact, InstallError> {
        let mut last = None;
        for area in areas {
            match self.install_in_area(package, area, env).await {
                Ok(artifact) => return Ok(artifact),
                Err(e) => {
                    warn!("Failed to install {} in {:?}, trying the next area", package, area);
                    last = Some(Box::new(e));
                }
            }
        }
        Err(InstallError::NoAreaAvailable {
            package: package.clone(),
            last,
        })
    }

    /// Install `package` and, before it, everything it depends on.
    #[tracing::instrument(skip(self, env))]
    pub async fn install(
        &self,
        package: &PackageRef,
        areas: &[PathBuf],
        env: EnvironmentContext,
    ) -> Result<Installation, InstallError> {
        let mut env = env;
        let mut progress = Progress::default();
        let artifact = self
            .install_tree(package, areas, &mut env, &mut progress)
            .await?;
        info!(
            "Installed {} with {} package(s)",
            package,
            progress.installed.len()
        );
        Ok(Installation {
            package: package.clone(),
            artifact,
            installed: progress.installed,
            environment: env,
        })
    }

    fn install_tree<'a>(
        &'a self,
        package: &'a PackageRef,
        areas: &'a [PathBuf],
        env: &'a mut EnvironmentContext,
        progress: &'a mut Progress,
    ) -> InstallFuture<'a> {
        Box::pin(async move {
            progress.visited.insert(package.clone());

            let dependencies =
                resolve_dependencies(self.locator.config(), self.locator.platform(), package);
            for dependency in dependencies {
                if progress.visited.contains(&dependency) {
                    debug!("{} already handled, not installing it again", dependency);
                    continue;
                }
                info!("Installing {}, needed by {}", dependency, package);
                self.install_tree(&dependency, areas, env, progress)
                    .await
                    .map_err(|source| InstallError::DependencyFailed {
                        dependency: dependency.clone(),
                        source: Box::new(source),
                    })?;
            }

            let artifact = self.install_anywhere(package, areas, env).await?;
            progress
                .installed
                .push((package.clone(), artifact.clone()));
            Ok(artifact)
        })
    }
}
