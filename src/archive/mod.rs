mod tar;
mod zip;

use crate::runtime::Runtime;
use anyhow::{Result, anyhow};
use std::path::{Component, Path};

pub use self::tar::TarExtractor;
pub use self::zip::ZipExtractor;

/// Trait for format-specific archive extractors
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle the given archive format
    fn can_handle(&self, archive_path: &Path) -> bool;

    /// Unpack the archive in place below `extract_to`.
    ///
    /// Returns the distinct top-level entry names in archive order.
    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<Vec<String>>;
}

/// Dispatcher that selects the appropriate extractor based on archive format.
pub struct ArchiveExtractorImpl {
    tar: TarExtractor,
    zip: ZipExtractor,
}

impl Default for ArchiveExtractorImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractorImpl {
    pub fn new() -> Self {
        Self {
            tar: TarExtractor,
            zip: ZipExtractor,
        }
    }
}

impl ArchiveExtractor for ArchiveExtractorImpl {
    fn can_handle(&self, archive_path: &Path) -> bool {
        self.tar.can_handle(archive_path) || self.zip.can_handle(archive_path)
    }

    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<Vec<String>> {
        if self.tar.can_handle(archive_path) {
            return self.tar.extract(runtime, archive_path, extract_to);
        }
        if self.zip.can_handle(archive_path) {
            return self.zip.extract(runtime, archive_path, extract_to);
        }
        Err(anyhow!(
            "Unsupported archive format: {}",
            archive_path.display()
        ))
    }
}

/// First normal component of an archive member path, if the path is safe to
/// unpack (relative, no `..`).
fn top_level_name(entry_path: &Path) -> Option<String> {
    let mut top = None;
    for component in entry_path.components() {
        match component {
            Component::Normal(name) => {
                if top.is_none() {
                    top = Some(name.to_string_lossy().into_owned());
                }
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    top
}

fn record_top_level(names: &mut Vec<String>, entry_path: &Path) {
    if let Some(name) = top_level_name(entry_path)
        && !names.contains(&name)
    {
        names.push(name);
    }
}
