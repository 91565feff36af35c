//! Environment produced by installed packages.
//!
//! # Structure
//!
//! - `context` - The explicit variable set handed through an install
//! - `configure` - Per-family rules applied after a package lands on disk

mod configure;
mod context;

pub use configure::{Configurator, dir_variable};
pub use context::EnvironmentContext;
