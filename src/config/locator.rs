use log::{debug, warn};
use std::sync::Arc;

use super::{
    ADDITIONAL_ENV, ConfigSource, MD5SUM, OVERWRITE, TARBALL, TARBALL_URL, package_key,
    version_key,
};
use crate::error::LocateError;
use crate::package::{PackageMetadata, PackageRef, resolve_dependencies};

/// Looks up package metadata for one platform.
#[derive(Clone)]
pub struct PackageLocator {
    config: Arc<dyn ConfigSource>,
    platform: String,
}

impl PackageLocator {
    pub fn new(config: Arc<dyn ConfigSource>, platform: impl Into<String>) -> Self {
        Self {
            config,
            platform: platform.into(),
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn config(&self) -> &dyn ConfigSource {
        self.config.as_ref()
    }

    /// Fresh lookup of everything registered for `package`.
    #[tracing::instrument(skip(self))]
    pub fn locate(&self, package: &PackageRef) -> Result<PackageMetadata, LocateError> {
        let tarball = self
            .config
            .value(&version_key(&self.platform, package, TARBALL))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| LocateError::MissingTarball {
                package: package.clone(),
                platform: self.platform.clone(),
            })?;

        let base_url = self
            .config
            .value(&version_key(&self.platform, package, TARBALL_URL))
            .or_else(|| {
                self.config
                    .value(&package_key(&self.platform, package, TARBALL_URL))
            })
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| LocateError::MissingUrl {
                package: package.clone(),
                platform: self.platform.clone(),
            })?;

        let overwrite = self
            .config
            .value(&version_key(&self.platform, package, OVERWRITE))
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let checksum = self
            .config
            .value(&version_key(&self.platform, package, MD5SUM))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if checksum.is_none() {
            warn!("No checksum registered for {}", package);
        }

        let extra_env = self
            .config
            .options(&version_key(&self.platform, package, ADDITIONAL_ENV));

        let metadata = PackageMetadata {
            artifact_url: join_url(&base_url, &tarball),
            tarball,
            checksum,
            overwrite,
            dependencies: resolve_dependencies(self.config.as_ref(), &self.platform, package),
            extra_env,
        };
        debug!("Located {}: {:?}", package, metadata);
        Ok(metadata)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

fn join_url(base: &str, tarball: &str) -> String {
    let base = base.trim();
    if base.ends_with('/') {
        format!("{}{}", base, tarball)
    } else {
        format!("{}/{}", base, tarball)
    }
}
