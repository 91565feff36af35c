use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    archive::{ArchiveExtractor, ArchiveExtractorImpl},
    config::{ConfigFile, PackageLocator},
    fetch::{Fetcher, TransportFetcher},
    http::HttpClient,
    install::InstallSettings,
    runtime::Runtime,
};

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    /// Package configuration file; `<config_dir>/tarsoft/packages.json` when absent
    pub config_file: Option<PathBuf>,
    pub platform: String,
    pub settings: InstallSettings,
}

pub struct Config<R: Runtime, F: Fetcher, E: ArchiveExtractor> {
    pub runtime: Arc<R>,
    pub locator: PackageLocator,
    pub fetcher: F,
    pub extractor: E,
    pub settings: InstallSettings,
}

impl<R: Runtime + 'static> Config<R, TransportFetcher<R>, ArchiveExtractorImpl> {
    pub fn new(runtime: R, options: ConfigOptions) -> Result<Self> {
        let runtime = Arc::new(runtime);

        let config_file = match options.config_file {
            Some(path) => path,
            None => default_config_file(runtime.as_ref())?,
        };
        debug!("Using package configuration {:?}", config_file);
        let source = ConfigFile::open(Arc::clone(&runtime), config_file)?;
        let locator = PackageLocator::new(Arc::new(source), options.platform);

        let client = Client::builder()
            .user_agent(concat!("tarsoft/", env!("TARSOFT_VERSION")))
            .build()?;
        let fetcher = TransportFetcher::new(Arc::clone(&runtime), HttpClient::new(client));

        Ok(Self {
            runtime,
            locator,
            fetcher,
            extractor: ArchiveExtractorImpl::new(),
            settings: options.settings,
        })
    }
}

pub fn default_config_file<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    let dir = runtime
        .config_dir()
        .context("Could not determine the user configuration directory, use --config")?;
    Ok(dir.join("tarsoft").join("packages.json"))
}
