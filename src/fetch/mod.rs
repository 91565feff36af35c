//! Retrieval of artifact bytes into an install area.
//!
//! The transport is opaque to the install pipeline: it only sees the
//! [`Fetcher`] trait. HTTP(S) URLs go through [`HttpClient`], `file://` URLs
//! and plain paths are copied from shared storage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

use crate::http::HttpClient;
use crate::runtime::Runtime;

/// Retrieve the artifact at `url` into the local file `dest`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Where an artifact URL points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    File,
}

impl Transport {
    pub fn of(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Transport::Http
        } else {
            Transport::File
        }
    }
}

/// Dispatches on the URL scheme.
pub struct TransportFetcher<R: Runtime + ?Sized> {
    runtime: Arc<R>,
    http: HttpClient,
}

impl<R: Runtime + ?Sized> TransportFetcher<R> {
    pub fn new(runtime: Arc<R>, http: HttpClient) -> Self {
        Self { runtime, http }
    }

    async fn fetch_http(&self, url: &str, dest: &Path) -> Result<u64> {
        self.http
            .download_file(url, || {
                self.runtime
                    .create_file(dest)
                    .with_context(|| format!("Failed to create download file at {:?}", dest))
            })
            .await
    }

    fn fetch_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let source = url.strip_prefix("file://").unwrap_or(url);
        let source = Path::new(source);
        if !self.runtime.exists(source) {
            anyhow::bail!("Artifact {:?} does not exist", source);
        }
        self.runtime
            .copy(source, dest)
            .with_context(|| format!("Failed to copy {:?} to {:?}", source, dest))
    }
}

#[async_trait]
impl<R: Runtime + ?Sized + 'static> Fetcher for TransportFetcher<R> {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {}...", url);
        let bytes = match Transport::of(url) {
            Transport::Http => self.fetch_http(url, dest).await?,
            Transport::File => self.fetch_file(url, dest)?,
        };
        debug!("Fetched {} bytes into {:?}", bytes, dest);
        Ok(bytes)
    }
}
