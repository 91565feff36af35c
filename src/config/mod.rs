//! Read-only access to the package configuration service.
//!
//! Keys are slash separated paths rooted at the platform, e.g.
//! `/x86_64-slc5-gcc43-opt/root/6.0/TarBall`. Missing keys are a normal
//! condition and surface as `None` or an empty listing.

mod locator;

pub use locator::PackageLocator;

use anyhow::{Context, Result};
use log::warn;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::package::PackageRef;
use crate::runtime::Runtime;

pub const TARBALL: &str = "TarBall";
pub const TARBALL_URL: &str = "TarBallURL";
pub const OVERWRITE: &str = "Overwrite";
pub const MD5SUM: &str = "Md5Sum";
pub const ADDITIONAL_ENV: &str = "AdditionalEnvVar";
pub const DEPENDENCIES: &str = "Dependencies";

/// Key/value lookup into the configuration service.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigSource: Send + Sync {
    /// Scalar value stored at `path`.
    fn value(&self, path: &str) -> Option<String>;

    /// Names of the sub-sections directly below `path`, in declaration order.
    fn sections(&self, path: &str) -> Vec<String>;

    /// Scalar options directly below `path`, in declaration order.
    fn options(&self, path: &str) -> Vec<(String, String)>;
}

/// Path of `leaf` below the version section of `package`.
pub fn version_key(platform: &str, package: &PackageRef, leaf: &str) -> String {
    format!(
        "/{}/{}/{}/{}",
        platform,
        package.key(),
        package.version,
        leaf
    )
}

/// Path of `leaf` below the package section (shared by all versions).
pub fn package_key(platform: &str, package: &PackageRef, leaf: &str) -> String {
    format!("/{}/{}/{}", platform, package.key(), leaf)
}

/// Configuration tree backed by a JSON document whose nested objects mirror
/// the key paths.
#[derive(Debug, Clone, Default)]
pub struct JsonConfigSource {
    root: Value,
}

impl JsonConfigSource {
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn parse(json: &str) -> Result<Self> {
        let root = serde_json::from_str(json).context("Failed to parse package configuration")?;
        Ok(Self { root })
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read package configuration {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Invalid package configuration {:?}", path))
    }

    fn node(&self, path: &str) -> Option<&Value> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.root, |node, segment| node.as_object()?.get(segment))
    }
}

/// Configuration file read again on every lookup, so edits made while an
/// install is waiting on a lock take effect right away.
pub struct ConfigFile<R: Runtime + ?Sized> {
    runtime: Arc<R>,
    path: PathBuf,
}

impl<R: Runtime + ?Sized> ConfigFile<R> {
    /// Fails when the file cannot be read or parsed right now.
    pub fn open(runtime: Arc<R>, path: PathBuf) -> Result<Self> {
        let file = Self { runtime, path };
        file.snapshot()?;
        Ok(file)
    }

    fn snapshot(&self) -> Result<JsonConfigSource> {
        JsonConfigSource::load(self.runtime.as_ref(), &self.path)
    }

    fn current(&self) -> Option<JsonConfigSource> {
        match self.snapshot() {
            Ok(source) => Some(source),
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        }
    }
}

impl<R: Runtime + ?Sized> ConfigSource for ConfigFile<R> {
    fn value(&self, path: &str) -> Option<String> {
        self.current()?.value(path)
    }

    fn sections(&self, path: &str) -> Vec<String> {
        self.current()
            .map(|source| source.sections(path))
            .unwrap_or_default()
    }

    fn options(&self, path: &str) -> Vec<(String, String)> {
        self.current()
            .map(|source| source.options(path))
            .unwrap_or_default()
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl ConfigSource for JsonConfigSource {
    fn value(&self, path: &str) -> Option<String> {
        self.node(path).and_then(scalar)
    }

    fn sections(&self, path: &str) -> Vec<String> {
        self.node(path)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter(|(_, v)| v.is_object())
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn options(&self, path: &str) -> Vec<(String, String)> {
        self.node(path)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| scalar(v).map(|v| (k.clone(), v)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use serde_json::json;

    fn source() -> JsonConfigSource {
        JsonConfigSource::from_value(json!({
            "linux": {
                "root": {
                    "TarBallURL": "http://example.com/root/",
                    "6.0": {
                        "TarBall": "root_6.0.tgz",
                        "Overwrite": false,
                        "Md5Sum": "d41d8cd98f00b204e9800998ecf8427e",
                        "Dependencies": {
                            "gcc": { "version": "4.3" },
                            "python": { "version": 2.7 }
                        },
                        "AdditionalEnvVar": { "ROOT_EXTRA": "1", "NESTED": {} }
                    }
                }
            }
        }))
    }

    #[test]
    fn test_value_lookup() {
        let config = source();
        assert_eq!(
            config.value("/linux/root/6.0/TarBall").as_deref(),
            Some("root_6.0.tgz")
        );
        assert_eq!(
            config.value("/linux/root/6.0/Overwrite").as_deref(),
            Some("false")
        );
        assert_eq!(
            config
                .value("/linux/root/6.0/Dependencies/python/version")
                .as_deref(),
            Some("2.7")
        );
        assert_eq!(config.value("/linux/root/6.0/Missing"), None);
        assert_eq!(config.value("/linux/root/6.0"), None);
    }

    #[test]
    fn test_sections_keep_declaration_order() {
        let config = source();
        assert_eq!(
            config.sections("/linux/root/6.0/Dependencies"),
            vec!["gcc".to_string(), "python".to_string()]
        );
        assert!(config.sections("/linux/nothing").is_empty());
    }

    #[test]
    fn test_options_skip_sections() {
        let config = source();
        assert_eq!(
            config.options("/linux/root/6.0/AdditionalEnvVar"),
            vec![("ROOT_EXTRA".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn test_key_helpers_use_lowercase_name() {
        let pkg = PackageRef::new("ROOT", "6.0");
        assert_eq!(version_key("linux", &pkg, TARBALL), "/linux/root/6.0/TarBall");
        assert_eq!(
            package_key("linux", &pkg, TARBALL_URL),
            "/linux/root/TarBallURL"
        );
    }

    #[test]
    fn test_load_from_runtime() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(r#"{"linux": {"java": {"8": {"TarBall": "java8.tgz"}}}}"#.to_string()));

        let config = JsonConfigSource::load(&runtime, Path::new("/etc/tarsoft.json")).unwrap();
        assert_eq!(
            config.value("/linux/java/8/TarBall").as_deref(),
            Some("java8.tgz")
        );
    }

    #[test]
    fn test_load_invalid_json() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("{ not json".to_string()));

        let result = JsonConfigSource::load(&runtime, Path::new("/etc/tarsoft.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_sees_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packages.json");
        std::fs::write(&path, r#"{"linux": {"root": {"6.0": {"TarBall": "root_6.0.tgz"}}}}"#).unwrap();

        let file = ConfigFile::open(Arc::new(RealRuntime), path.clone()).unwrap();
        let locator = PackageLocator::new(Arc::new(file), "linux");
        let root = PackageRef::new("root", "6.0");
        assert!(matches!(
            locator.locate(&root),
            Err(crate::error::LocateError::MissingUrl { .. })
        ));

        std::fs::write(
            &path,
            r#"{"linux": {"root": {"6.0": {"TarBall": "root_6.0.tgz", "TarBallURL": "http://example.com"}}}}"#,
        )
        .unwrap();
        let meta = locator.locate(&root).unwrap();
        assert_eq!(meta.artifact_url, "http://example.com/root_6.0.tgz");
    }

    #[test]
    fn test_config_file_unreadable_later_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packages.json");
        std::fs::write(&path, r#"{"linux": {"root": {"TarBallURL": "http://example.com"}}}"#).unwrap();

        let file = ConfigFile::open(Arc::new(RealRuntime), path.clone()).unwrap();
        assert!(file.value("/linux/root/TarBallURL").is_some());

        std::fs::remove_file(&path).unwrap();
        assert_eq!(file.value("/linux/root/TarBallURL"), None);
        assert!(file.sections("/linux").is_empty());
    }

    #[test]
    fn test_config_file_open_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigFile::open(Arc::new(RealRuntime), dir.path().join("missing.json")).is_err());
    }
}
