use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use crate::{
    archive::ArchiveExtractor,
    env::EnvironmentContext,
    fetch::Fetcher,
    install::{Installation, Installer},
    package::PackageRef,
    runtime::Runtime,
};

use super::config::{Config, ConfigOptions};

/// What to install and what to do with the resulting environment.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub package: PackageRef,
    pub areas: Vec<PathBuf>,
    pub json: bool,
    /// Program and arguments run with the resulting environment
    pub command: Vec<String>,
}

#[tracing::instrument(skip(runtime, options))]
pub async fn install<R: Runtime + 'static>(
    runtime: R,
    options: ConfigOptions,
    request: InstallRequest,
) -> Result<()> {
    let config = Config::new(runtime, options)?;
    let installation = run(config, &request).await?;
    finish(&installation, &request)
}

/// Install the requested package against a fully built configuration.
#[tracing::instrument(skip(config))]
pub async fn run<R: Runtime + 'static, F: Fetcher, E: ArchiveExtractor>(
    config: Config<R, F, E>,
    request: &InstallRequest,
) -> Result<Installation> {
    let env = EnvironmentContext::from_vars(config.runtime.env_vars());
    let installer = Installer::new(
        Arc::clone(&config.runtime),
        config.fetcher,
        config.extractor,
        config.locator,
        config.settings,
    );

    let installation = installer
        .install(&request.package, &request.areas, env)
        .await
        .with_context(|| format!("Failed to install {}", request.package))?;
    info!(
        "{} is available in {:?}",
        request.package,
        installation.artifact.path()
    );
    Ok(installation)
}

fn finish(installation: &Installation, request: &InstallRequest) -> Result<()> {
    if let Some((program, args)) = request.command.split_first() {
        return exec(program, args, &installation.environment);
    }

    if request.json {
        println!("{}", serde_json::to_string_pretty(installation)?);
    } else {
        print!("{}", installation.environment.exports());
    }
    Ok(())
}

/// Run `program` with the configured environment and mirror its exit status.
fn exec(program: &str, args: &[String], env: &EnvironmentContext) -> Result<()> {
    debug!("Running {} {:?}", program, args);
    let status = Command::new(program)
        .args(args)
        .env_clear()
        .envs(env.vars())
        .status()
        .with_context(|| format!("Failed to run {}", program))?;

    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => std::process::exit(code),
        None => bail!("{} was terminated by a signal", program),
    }
}
