//! Single-instance lease backed by an owner record on disk

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::LogwatchError;

/// Identity of the process holding the lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseOwner {
    pub pid: u32,
    /// Epoch seconds
    pub acquired_at: u64,
}

impl LeaseOwner {
    pub fn current(now: u64) -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: now,
        }
    }
}

/// Decides whether a recorded owner is still running
pub trait LivenessProbe: Send + Sync {
    fn is_alive(&self, owner: &LeaseOwner) -> bool;
}

/// Probes the OS process table by sending signal 0 to the owner's pid
#[derive(Debug, Default)]
pub struct ProcessProbe;

impl LivenessProbe for ProcessProbe {
    #[cfg(unix)]
    fn is_alive(&self, owner: &LeaseOwner) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal;
        use nix::unistd::Pid;

        let Ok(pid) = i32::try_from(owner.pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        match signal::kill(Pid::from_raw(pid), None) {
            Ok(()) => true,
            // exists, owned by someone else
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _owner: &LeaseOwner) -> bool {
        true
    }
}

/// Held exclusively by one running instance; released on `release` or drop
#[derive(Debug)]
pub struct Lease {
    path: PathBuf,
    owner: LeaseOwner,
    released: bool,
}

impl Lease {
    /// Take the lease at `path` for `owner`.
    ///
    /// A record naming a live owner fails with `AlreadyRunning` and is left
    /// untouched. A record naming a dead owner, or one that cannot be parsed,
    /// is stale and gets reclaimed with `reclaim_stale`.
    pub fn acquire(
        path: &Path,
        owner: LeaseOwner,
        probe: &dyn LivenessProbe,
    ) -> crate::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    file.write_all(&serde_json::to_vec(&owner)?)?;
                    file.sync_all()?;
                    tracing::debug!("Acquired lease {:?} for pid {}", path, owner.pid);
                    return Ok(Self {
                        path: path.to_path_buf(),
                        owner,
                        released: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let seen = match std::fs::read(path) {
                        Ok(seen) => seen,
                        // released between our create and read
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    };
                    match parse_owner(&seen) {
                        Some(holder) if probe.is_alive(&holder) => {
                            return Err(LogwatchError::AlreadyRunning { pid: holder.pid });
                        }
                        Some(holder) => {
                            tracing::warn!(
                                "Reclaiming stale lease {:?} from dead pid {}",
                                path,
                                holder.pid
                            );
                        }
                        None => {
                            tracing::warn!("Reclaiming unreadable lease {:?}", path);
                        }
                    }
                    reclaim_stale(path, &seen)?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Lost the race to another instance reclaiming the same stale record
        match read_owner(path) {
            Some(holder) => Err(LogwatchError::AlreadyRunning { pid: holder.pid }),
            None => Err(LogwatchError::Lease(format!(
                "could not acquire {:?}",
                path
            ))),
        }
    }

    pub fn owner(&self) -> &LeaseOwner {
        &self.owner
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the record, but only if it still names this owner
    pub fn release(mut self) -> crate::Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> crate::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        if read_owner(&self.path) != Some(self.owner) {
            tracing::warn!("Lease {:?} no longer names this instance; leaving it", self.path);
            return Ok(());
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Released lease {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            tracing::warn!("Failed to release lease {:?}: {}", self.path, e);
        }
    }
}

/// Read the owner recorded at `path`, if the record exists and parses
pub fn read_owner(path: &Path) -> Option<LeaseOwner> {
    parse_owner(&std::fs::read(path).ok()?)
}

fn parse_owner(content: &[u8]) -> Option<LeaseOwner> {
    serde_json::from_slice(content).ok()
}

/// Move the record judged stale out of the way.
///
/// The record is renamed to a unique sibling first, so only one contender can
/// take it. If the moved record is no longer the one judged stale, another
/// instance reclaimed the lease in the meantime: its record is linked back
/// into place and the attempt fails with `AlreadyRunning`.
fn reclaim_stale(path: &Path, judged: &[u8]) -> crate::Result<()> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let aside = path.with_file_name(format!(
        "{}.{}.{}.stale",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    match std::fs::rename(path, &aside) {
        Ok(()) => {}
        // someone else already moved it; retry create_new
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    let moved = std::fs::read(&aside)?;
    if moved == judged {
        std::fs::remove_file(&aside)?;
        return Ok(());
    }

    let restored = std::fs::hard_link(&aside, path);
    if let Err(e) = std::fs::remove_file(&aside) {
        tracing::warn!("Failed to remove {:?}: {}", aside, e);
    }
    let holder = parse_owner(&moved);
    match restored {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e.into()),
    }
    tracing::debug!("Lease {:?} was reclaimed concurrently; backing off", path);
    match holder.or_else(|| read_owner(path)) {
        Some(holder) => Err(LogwatchError::AlreadyRunning { pid: holder.pid }),
        None => Err(LogwatchError::Lease(format!(
            "{:?} changed while being reclaimed",
            path
        ))),
    }
}
