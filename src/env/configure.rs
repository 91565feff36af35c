use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;

use super::EnvironmentContext;
use crate::error::InstallError;
use crate::integrity::IgnoreList;
use crate::package::{InstalledArtifact, PackageFamily, PackageMetadata, PackageRef};
use crate::runtime::Runtime;

/// Directories a package may bundle system libraries in.
const LIBRARY_DIRS: &[&str] = &["LDLibs", "lib"];

const JAVA_PROBE_ARGS: &[&str] = &["-Xmx1536m", "-Xms256m", "-version"];

/// `ddsim` -> `DDSIM_DIR`, `lc-fi` -> `LC_FI_DIR`.
pub fn dir_variable(name: &str) -> String {
    let mut var: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    var.push_str("_DIR");
    var
}

/// Applies the environment rules of a freshly installed package.
pub struct Configurator<R: Runtime + ?Sized> {
    runtime: Arc<R>,
    ignore: IgnoreList,
}

impl<R: Runtime + ?Sized> Configurator<R> {
    pub fn new(runtime: Arc<R>, ignore: IgnoreList) -> Self {
        Self { runtime, ignore }
    }

    /// Update `env` for `package`. Only a missing mandatory piece (a Java
    /// runtime, SLIC sub-packages) is an error; everything else is logged.
    #[tracing::instrument(skip(self, metadata, env))]
    pub fn configure(
        &self,
        package: &PackageRef,
        metadata: &PackageMetadata,
        artifact: &InstalledArtifact,
        env: &mut EnvironmentContext,
    ) -> Result<(), InstallError> {
        let folder = artifact.path();
        let is_dir = self.runtime.is_dir(&folder);

        if is_dir {
            self.remove_system_libs(&folder);

            let lib = folder.join("lib");
            if self.runtime.is_dir(&lib) {
                env.prepend_path("LD_LIBRARY_PATH", &lib.to_string_lossy());
            }
            env.set(dir_variable(&package.name), folder.to_string_lossy());
        }

        match package.family() {
            PackageFamily::Root => {
                env.set("ROOTSYS", folder.to_string_lossy());
                env.prepend_path("PATH", &folder.join("bin").to_string_lossy());
                env.prepend_path("PYTHONPATH", &folder.join("lib").to_string_lossy());
            }
            PackageFamily::Java => {
                env.prepend_path("PATH", &folder.join("bin").to_string_lossy());
                env.prepend_path("LD_LIBRARY_PATH", &folder.join("lib").to_string_lossy());
            }
            PackageFamily::Lcio => {
                self.require_java(package, env)?;
                env.set("LCIO", folder.to_string_lossy());
                env.prepend_path("PATH", &folder.join("bin").to_string_lossy());
            }
            PackageFamily::Lcsim | PackageFamily::StdhepCutJava => {
                self.require_java(package, env)?;
            }
            PackageFamily::Slic => self.configure_slic(package, &folder, env)?,
            PackageFamily::Generic => {}
        }

        for (key, value) in &metadata.extra_env {
            debug!("Setting {}={} for {}", key, value, package);
            env.set(key.as_str(), value.as_str());
        }

        info!("Environment configured for {}", package);
        Ok(())
    }

    fn remove_system_libs(&self, folder: &Path) {
        for dir in LIBRARY_DIRS.iter().map(|d| folder.join(d)) {
            if !self.runtime.is_dir(&dir) {
                continue;
            }
            let entries = match self.runtime.read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Could not list {:?}: {:#}", dir, e);
                    continue;
                }
            };
            for entry in entries {
                let name = entry
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if !self.ignore.matches(&name) {
                    continue;
                }
                match self.runtime.remove_file(&entry) {
                    Ok(()) => info!("Removed bundled system library {:?}", entry),
                    Err(e) => warn!("Could not remove {:?}: {:#}", entry, e),
                }
            }
        }
    }

    fn require_java(
        &self,
        package: &PackageRef,
        env: &EnvironmentContext,
    ) -> Result<(), InstallError> {
        let args: Vec<String> = JAVA_PROBE_ARGS.iter().map(|a| a.to_string()).collect();
        if self
            .runtime
            .probe("java", &args, env.get("PATH").map(String::from))
        {
            debug!("Found a working java for {}", package);
            return Ok(());
        }
        Err(InstallError::EnvResolutionFailed {
            package: package.clone(),
            reason: "no usable java found in PATH, install java first".to_string(),
        })
    }

    fn configure_slic(
        &self,
        package: &PackageRef,
        folder: &Path,
        env: &mut EnvironmentContext,
    ) -> Result<(), InstallError> {
        env.set("SLIC_DIR", folder.to_string_lossy());

        let packages = folder.join("packages");
        for (sub, var) in [("slic", "SLIC_VERSION"), ("lcdd", "LCDD_VERSION")] {
            let version = self.first_subdir(&packages.join(sub)).ok_or_else(|| {
                InstallError::EnvResolutionFailed {
                    package: package.clone(),
                    reason: format!("could not find the {} version below {:?}", sub, packages),
                }
            })?;
            env.set(var, version);
        }

        match self.first_subdir(&packages.join("xerces")) {
            Some(version) => env.set("XERCES_VERSION", version),
            None => warn!("Could not find the xerces version below {:?}", packages),
        }
        Ok(())
    }

    fn first_subdir(&self, dir: &Path) -> Option<String> {
        let mut names: Vec<String> = self
            .runtime
            .read_dir(dir)
            .ok()?
            .into_iter()
            .filter(|p| self.runtime.is_dir(p))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names.into_iter().next()
    }
}
