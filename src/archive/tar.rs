use crate::runtime::Runtime;
use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::io::Read;
use std::path::Path;
use tar::Archive;

use super::{ArchiveExtractor, record_top_level};

/// Extractor for plain and gzip-compressed tar archives
pub struct TarExtractor;

impl TarExtractor {
    fn is_gzip(archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }
}

impl ArchiveExtractor for TarExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        Self::is_gzip(archive_path) || name.ends_with(".tar")
    }

    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<Vec<String>> {
        debug!("Extracting tar archive {:?} into {:?}...", archive_path, extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        let reader: Box<dyn Read> = if Self::is_gzip(archive_path) {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let mut archive = Archive::new(reader);

        let mut top_level = Vec::new();
        for entry in archive
            .entries()
            .with_context(|| format!("Failed to read entries of {:?}", archive_path))?
        {
            let mut entry = entry.context("Failed to read tar entry")?;
            let entry_path = entry
                .path()
                .context("Tar entry has an invalid path")?
                .into_owned();

            // unpack_in refuses paths escaping extract_to and reports false
            let unpacked = entry
                .unpack_in(extract_to)
                .with_context(|| format!("Failed to extract {:?}", entry_path))?;
            if unpacked {
                record_top_level(&mut top_level, &entry_path);
            } else {
                debug!("Skipping entry outside of target: {:?}", entry_path);
            }
        }

        if top_level.is_empty() {
            bail!("Archive {:?} appears to be empty", archive_path);
        }

        info!("Extraction complete.");
        Ok(top_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use tar::{Builder, EntryType, Header};
    use tempfile::tempdir;

    fn tar_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append(&header, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        use std::io::Write;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_can_handle() {
        let extractor = TarExtractor;
        assert!(extractor.can_handle(Path::new("a.tar.gz")));
        assert!(extractor.can_handle(Path::new("A.TGZ")));
        assert!(extractor.can_handle(Path::new("a.tar")));
        assert!(!extractor.can_handle(Path::new("a.zip")));
        assert!(!extractor.can_handle(Path::new("a.jar")));
    }

    #[test]
    fn test_extract_gzip_in_place() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("slic.tgz");
        fs::write(
            &archive,
            gzip(&tar_bytes(&[
                ("SLIC_v2/packages/slic/v2r9/bin/slic", "bin"),
                ("SLIC_v2/packages/lcdd/v1r2/lib/liblcdd.so", "lib"),
            ])),
        )
        .unwrap();

        let top = TarExtractor
            .extract(&RealRuntime, &archive, dir.path())
            .unwrap();

        assert_eq!(top, vec!["SLIC_v2".to_string()]);
        assert!(dir.path().join("SLIC_v2/packages/slic/v2r9/bin/slic").exists());
    }

    #[test]
    fn test_extract_plain_tar_multiple_roots() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("multi.tar");
        fs::write(&archive, tar_bytes(&[("a/one", "1"), ("b/two", "2"), ("a/three", "3")])).unwrap();

        let top = TarExtractor
            .extract(&RealRuntime, &archive, dir.path())
            .unwrap();

        assert_eq!(top, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(fs::read_to_string(dir.path().join("b/two")).unwrap(), "2");
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_keeps_symlinks() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(Vec::new());

        let mut header = Header::new_gnu();
        header.set_path("pkg/lib/libfoo.so.1").unwrap();
        header.set_size(3);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, "elf".as_bytes()).unwrap();

        let mut link = Header::new_gnu();
        link.set_entry_type(EntryType::Symlink);
        link.set_size(0);
        builder
            .append_link(&mut link, "pkg/lib/libfoo.so", "libfoo.so.1")
            .unwrap();

        let archive = dir.path().join("pkg.tar");
        fs::write(&archive, builder.into_inner().unwrap()).unwrap();

        TarExtractor
            .extract(&RealRuntime, &archive, dir.path())
            .unwrap();

        let link_path = dir.path().join("pkg/lib/libfoo.so");
        assert!(fs::symlink_metadata(&link_path).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(link_path).unwrap(), "elf");
    }

    #[test]
    fn test_extract_corrupted_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("broken.tgz");
        fs::write(&archive, b"definitely not gzip").unwrap();

        let result = TarExtractor.extract(&RealRuntime, &archive, dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_empty_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("empty.tar");
        fs::write(&archive, tar_bytes(&[])).unwrap();

        let result = TarExtractor.extract(&RealRuntime, &archive, dir.path());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }
}
