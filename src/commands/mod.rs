pub mod config;
mod install;
mod locate;

pub use config::ConfigOptions;
pub use install::{InstallRequest, install};
pub use locate::locate;
