//! Advisory locking through marker files in a shared install area.
//!
//! A lock is nothing more than the presence of `<area>/<folder>.lock`. Every
//! worker honours it cooperatively; there is no in-memory state, so the same
//! protocol works across processes and across hosts sharing a network
//! filesystem. A marker older than the staleness threshold is presumed to
//! belong to a crashed install and may be removed by anyone.

use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::error::LockError;
use crate::runtime::Runtime;

/// Timing rules for waiting on someone else's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Age after which a marker is considered abandoned
    pub stale_threshold: Duration,
    /// Number of waits before the marker is declared buggy
    pub max_wait_cycles: u32,
    /// Pause between two checks
    pub cycle_interval: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            stale_threshold: Duration::from_secs(30 * 60),
            max_wait_cycles: 60,
            cycle_interval: Duration::from_secs(60),
        }
    }
}

/// How a wait on an existing marker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockWait {
    /// No marker, or its owner removed it
    Released,
    /// The marker was abandoned and has been removed by us
    StaleCleared,
}

impl LockWait {
    /// Content left behind by an abandoned install cannot be trusted.
    pub fn forces_overwrite(self) -> bool {
        matches!(self, LockWait::StaleCleared)
    }
}

/// Marker path guarding `folder_name` inside `area`.
pub fn lock_path(area: &Path, folder_name: &str) -> PathBuf {
    area.join(format!("{}.lock", folder_name))
}

pub struct LockCoordinator<R: Runtime + ?Sized> {
    runtime: Arc<R>,
    policy: LockPolicy,
}

impl<R: Runtime + ?Sized> LockCoordinator<R> {
    pub fn new(runtime: Arc<R>, policy: LockPolicy) -> Self {
        Self { runtime, policy }
    }

    /// Create the marker if nobody holds it.
    ///
    /// Returns `false` when another worker created it first; its marker is
    /// left untouched. Fails when the area is not writable for us.
    #[tracing::instrument(skip(self))]
    pub fn acquire(&self, path: &Path) -> Result<bool, LockError> {
        let content = format!("Locking this directory (pid {})\n", std::process::id());
        let created = self
            .runtime
            .create_new(path, content.as_bytes())
            .map_err(|source| {
                error!("Failed creating lock {:?}: {:#}", path, source);
                LockError::AcquireDenied {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        if created {
            debug!("Acquired lock {:?}", path);
        } else {
            info!("Lock {:?} was taken by another worker", path);
        }
        Ok(created)
    }

    /// Remove the marker.
    #[tracing::instrument(skip(self))]
    pub fn release(&self, path: &Path) -> Result<(), LockError> {
        self.runtime
            .remove_file(path)
            .map_err(|source| LockError::ReleaseFailed {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Released lock {:?}", path);
        Ok(())
    }

    /// Remove the marker, logging instead of failing.
    pub fn release_quietly(&self, path: &Path) {
        if let Err(e) = self.release(path) {
            error!("{:#}", e);
        }
    }

    /// Block while another worker holds the marker.
    ///
    /// Staleness is checked before the cycle bound, so a marker that is both
    /// old and over-waited resolves as [`LockWait::StaleCleared`].
    #[tracing::instrument(skip(self))]
    pub async fn wait_for_release(&self, path: &Path) -> Result<LockWait, LockError> {
        let mut cycles = 0;
        let mut stale_seen = false;

        loop {
            if !self.runtime.exists(path) {
                return Ok(resolution(stale_seen));
            }

            match self.runtime.modified(path) {
                Ok(modified) => {
                    let age = SystemTime::now()
                        .duration_since(modified)
                        .unwrap_or_default();
                    if age > self.policy.stale_threshold {
                        info!(
                            "Lock {:?} is {}s old, considering it abandoned",
                            path,
                            age.as_secs()
                        );
                        stale_seen = true;
                        match self.release(path) {
                            Ok(()) => return Ok(LockWait::StaleCleared),
                            Err(e) => warn!("{:#}", e),
                        }
                    }
                }
                Err(e) => {
                    warn!("Lock {:?} not available, assuming removed: {:#}", path, e);
                    return Ok(resolution(stale_seen));
                }
            }

            if cycles >= self.policy.max_wait_cycles {
                error!(
                    "Waited {} cycles on lock {:?}, assuming it is buggy",
                    cycles, path
                );
                self.release_quietly(path);
                return Err(LockError::BuggyLock {
                    path: path.to_path_buf(),
                    cycles,
                });
            }

            cycles += 1;
            warn!(
                "Lock {:?} is held, waiting {:?} before proceeding ({}/{})",
                path, self.policy.cycle_interval, cycles, self.policy.max_wait_cycles
            );
            tokio::time::sleep(self.policy.cycle_interval).await;
        }
    }
}

fn resolution(stale_seen: bool) -> LockWait {
    if stale_seen {
        LockWait::StaleCleared
    } else {
        LockWait::Released
    }
}
