//! Post-install integrity verification against a per-package manifest.
//!
//! A package may ship `md5_checksum.md5` at the top of its folder, with one
//! `<hexdigest> <relative path>` line per file. Every listed file must exist
//! and match. Entries naming system libraries the package is not supposed to
//! bring along are exempt, as are the manifest itself and `-` entries.

use log::{debug, error, info, warn};
use std::path::{Component, Path};

use crate::checksum::{ChecksumKind, digest_file};
use crate::error::InstallError;
use crate::runtime::Runtime;

pub const MANIFEST_NAME: &str = "md5_checksum.md5";

/// System libraries that must come from the host, never from a package.
pub const DEFAULT_IGNORED_LIBS: &[&str] = &[
    "libc.so",
    "libc-2.",
    "libm.so",
    "libpthread.so",
    "libdl.so",
    "librt.so",
    "ld-linux",
    "libstdc++.so",
    "libgcc_s.so",
];

/// Patterns exempting manifest entries (and bundled libraries) from checks.
///
/// A pattern containing glob metacharacters is matched as a glob against the
/// full relative path and against the file name; anything else matches as a
/// substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreList {
    patterns: Vec<String>,
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_LIBS.iter().map(|s| s.to_string()))
    }
}

impl IgnoreList {
    pub fn new(patterns: impl IntoIterator<Item = String>) -> Self {
        Self {
            patterns: patterns.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    pub fn extend(&mut self, patterns: impl IntoIterator<Item = String>) {
        self.patterns
            .extend(patterns.into_iter().filter(|p| !p.is_empty()));
    }

    pub fn matches(&self, path: &str) -> bool {
        let file_name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.patterns.iter().any(|pattern| {
            if pattern.contains(['*', '?', '[']) {
                glob::Pattern::new(pattern)
                    .map(|p| p.matches(path) || p.matches(&file_name))
                    .unwrap_or(false)
            } else {
                path.contains(pattern.as_str())
            }
        })
    }
}

/// Result of an integrity check that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityReport {
    /// All listed files were present and matched
    Verified { checked: usize, skipped: usize },
    /// The package has no manifest
    Unverified,
    /// Single-file artifacts are not checked
    NotApplicable,
}

struct ManifestEntry<'a> {
    digest: &'a str,
    path: &'a str,
}

fn parse_line(line: &str) -> Option<ManifestEntry<'_>> {
    let line = line.trim();
    let (digest, rest) = line.split_once(char::is_whitespace)?;
    let path = rest.trim_start();
    // md5sum marks binary mode with a leading '*'
    let path = path.strip_prefix('*').unwrap_or(path);
    if digest.is_empty() || path.is_empty() {
        return None;
    }
    Some(ManifestEntry { digest, path })
}

/// Check the installed `folder` against its manifest.
#[tracing::instrument(skip(runtime, ignore))]
pub fn check<R: Runtime + ?Sized>(
    runtime: &R,
    folder: &Path,
    ignore: &IgnoreList,
) -> Result<IntegrityReport, InstallError> {
    if !runtime.is_dir(folder) {
        debug!("{:?} is a single file, nothing to verify", folder);
        return Ok(IntegrityReport::NotApplicable);
    }

    let manifest = folder.join(MANIFEST_NAME);
    if !runtime.exists(&manifest) {
        warn!("{:?} does not come with a checksum manifest", folder);
        return Ok(IntegrityReport::Unverified);
    }

    let content = runtime.read_to_string(&manifest).map_err(|e| {
        error!("Failed to read manifest {:?}: {:#}", manifest, e);
        InstallError::CorruptedInstall {
            path: manifest.clone(),
        }
    })?;

    let mut checked = 0;
    let mut skipped = 0;
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let Some(entry) = parse_line(line) else {
            warn!("Skipping malformed manifest line: {:?}", line);
            skipped += 1;
            continue;
        };

        if entry.path == "-" || entry.path.contains(MANIFEST_NAME) || ignore.matches(entry.path) {
            skipped += 1;
            continue;
        }

        let relative = Path::new(entry.path);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            error!("Manifest entry {:?} points outside {:?}", entry.path, folder);
            return Err(InstallError::CorruptedInstall {
                path: manifest.clone(),
            });
        }
        let file = folder.join(relative);
        if !runtime.exists(&file) {
            error!("File missing: {:?}", file);
            return Err(InstallError::IncompleteInstall { path: file });
        }

        let actual = digest_file(runtime, &file, ChecksumKind::from_hex(entry.digest)).map_err(|e| {
            error!("Failed to compute checksum of {:?}: {:#}", file, e);
            InstallError::CorruptedInstall { path: file.clone() }
        })?;
        if !actual.eq_ignore_ascii_case(entry.digest) {
            error!(
                "File {:?} has wrong checksum: found {}, expected {}",
                file, actual, entry.digest
            );
            return Err(InstallError::CorruptedInstall { path: file });
        }
        checked += 1;
    }

    info!(
        "Verified {} file(s) of {:?} ({} skipped)",
        checked, folder, skipped
    );
    Ok(IntegrityReport::Verified { checked, skipped })
}
