pub mod archive;
pub mod checksum;
pub mod commands;
pub mod config;
pub mod env;
pub mod error;
pub mod fetch;
pub mod http;
pub mod install;
pub mod integrity;
pub mod lock;
pub mod package;
pub mod runtime;
