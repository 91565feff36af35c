use anyhow::{Context, Result};
use log::debug;

use crate::{config::PackageLocator, package::PackageMetadata, package::PackageRef, runtime::Runtime};

use super::config::{Config, ConfigOptions};

/// Show what the configuration service registers for a package
#[tracing::instrument(skip(runtime, options))]
pub fn locate<R: Runtime + 'static>(
    runtime: R,
    options: ConfigOptions,
    package: &PackageRef,
    json: bool,
) -> Result<()> {
    let config = Config::new(runtime, options)?;
    let metadata = lookup(&config.locator, package)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    } else {
        print!("{}", describe(package, config.locator.platform(), &metadata));
    }
    Ok(())
}

fn lookup(locator: &PackageLocator, package: &PackageRef) -> Result<PackageMetadata> {
    debug!("Locating {} on {}", package, locator.platform());
    locator
        .locate(package)
        .with_context(|| format!("Failed to locate {}", package))
}

fn describe(package: &PackageRef, platform: &str, metadata: &PackageMetadata) -> String {
    let mut out = format!("Package: {} ({})\n", package, platform);
    out.push_str(&format!("Tarball: {}\n", metadata.tarball));
    out.push_str(&format!("URL: {}\n", metadata.artifact_url));
    out.push_str(&format!(
        "Checksum: {}\n",
        metadata.checksum.as_deref().unwrap_or("(none)")
    ));
    out.push_str(&format!("Overwrite: {}\n", metadata.overwrite));
    out.push_str(&format!("Folder: {}\n", metadata.folder_name(package)));

    if !metadata.dependencies.is_empty() {
        out.push_str("\nDependencies:\n");
        for dependency in &metadata.dependencies {
            out.push_str(&format!("  {}\n", dependency));
        }
    }
    if !metadata.extra_env.is_empty() {
        out.push_str("\nAdditional environment:\n");
        for (key, value) in &metadata.extra_env {
            out.push_str(&format!("  {}={}\n", key, value));
        }
    }
    out
}
