//! Probing companion executables (e.g. a Java runtime).

use log::debug;
use std::process::{Command, Stdio};

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self, search_path))]
    pub(crate) fn probe_impl(
        &self,
        program: &str,
        args: &[String],
        search_path: Option<String>,
    ) -> bool {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(path) = search_path {
            command.env("PATH", path);
        }

        match command.status() {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("Failed to run {}: {}", program, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};

    #[test]
    fn test_probe_missing_program() {
        let runtime = RealRuntime;
        assert!(!runtime.probe("tarsoft-no-such-program", &[], None));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_success_and_failure() {
        let runtime = RealRuntime;
        assert!(runtime.probe("true", &[], None));
        assert!(!runtime.probe("false", &[], None));
    }
}
