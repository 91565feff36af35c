//! Digest computation and verification for downloaded artifacts and
//! installed files.

use anyhow::{Context, Result};
use log::{debug, warn};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use crate::runtime::Runtime;

/// Supported checksum types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Md5,
    Sha256,
}

impl ChecksumKind {
    /// Detect checksum type from length of hex string.
    /// Anything unrecognised is treated as MD5, the registry's historical format.
    pub fn from_hex(hex: &str) -> Self {
        match hex.trim().len() {
            64 => ChecksumKind::Sha256,
            _ => ChecksumKind::Md5,
        }
    }
}

/// Outcome of checking an artifact against its registered checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// No checksum registered, or the artifact could not be read
    Skipped,
    Matched,
    Mismatch { expected: String, actual: String },
}

fn feed(hasher: &mut impl Digest, mut reader: impl Read) -> std::io::Result<()> {
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            return Ok(());
        }
        hasher.update(&buffer[..read]);
    }
}

/// Compute the lowercase hex digest of a file.
#[tracing::instrument(skip(runtime))]
pub fn digest_file<R: Runtime + ?Sized>(
    runtime: &R,
    path: &Path,
    kind: ChecksumKind,
) -> Result<String> {
    let reader = runtime
        .open(path)
        .with_context(|| format!("Failed to open {:?} for hashing", path))?;
    let read_failed = || format!("Failed to read {:?} for hashing", path);
    let digest = match kind {
        ChecksumKind::Md5 => {
            let mut hasher = Md5::new();
            feed(&mut hasher, reader).with_context(read_failed)?;
            format!("{:x}", hasher.finalize())
        }
        ChecksumKind::Sha256 => {
            let mut hasher = Sha256::new();
            feed(&mut hasher, reader).with_context(read_failed)?;
            format!("{:x}", hasher.finalize())
        }
    };
    Ok(digest)
}

/// Compare a file against an optional expected checksum.
///
/// An absent expected value needs no verification. A file that cannot be read
/// is reported as skipped, leaving the decision to later integrity checks.
#[tracing::instrument(skip(runtime))]
pub fn verify<R: Runtime + ?Sized>(
    runtime: &R,
    path: &Path,
    expected: Option<&str>,
) -> Verification {
    let Some(expected) = expected.map(str::trim).filter(|e| !e.is_empty()) else {
        debug!("No checksum registered for {:?}, skipping verification", path);
        return Verification::Skipped;
    };

    let actual = match digest_file(runtime, path, ChecksumKind::from_hex(expected)) {
        Ok(actual) => actual,
        Err(e) => {
            warn!("Failed to get checksum of {:?}, continuing without: {:#}", path, e);
            return Verification::Skipped;
        }
    };

    if actual.eq_ignore_ascii_case(expected) {
        debug!("Checksum of {:?} matches", path);
        Verification::Matched
    } else {
        Verification::Mismatch {
            expected: expected.to_lowercase(),
            actual,
        }
    }
}
