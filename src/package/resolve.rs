use log::{debug, warn};

use super::PackageRef;
use crate::config::{ConfigSource, DEPENDENCIES, TARBALL, version_key};

/// Direct dependencies of `package`, in declaration order.
///
/// Entries without a version, or naming a version that has no tarball
/// registered on `platform`, are skipped.
pub fn resolve_dependencies(
    config: &dyn ConfigSource,
    platform: &str,
    package: &PackageRef,
) -> Vec<PackageRef> {
    let section = version_key(platform, package, DEPENDENCIES);
    config
        .sections(&section)
        .into_iter()
        .filter_map(|name| {
            let Some(version) = config
                .value(&format!("{}/{}/version", section, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
            else {
                warn!("Dependency {} of {} has no version, skipping", name, package);
                return None;
            };

            let dependency = PackageRef::new(name, version);
            if config.value(&version_key(platform, &dependency, TARBALL)).is_none() {
                warn!(
                    "Dependency {} of {} is not available on {}, skipping",
                    dependency, package, platform
                );
                return None;
            }
            debug!("{} depends on {}", package, dependency);
            Some(dependency)
        })
        .collect()
}
