//! Persisted per-file monitor state

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::LogwatchError;

/// Where the detector stands for one monitored file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Next qualifying burst fires an alert
    Idle,
    /// An alert fired recently; bursts are logged but not notified
    Cooldown,
}

/// State carried between polls of a single file. All times are epoch seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorState {
    pub last_check_time: u64,
    /// 0 when no alert has ever fired
    pub last_alert_time: u64,
    pub last_offset: u64,
}

impl MonitorState {
    /// Seconds since the last fired alert, or `None` if none ever fired.
    ///
    /// A clock that moved backwards reads as zero elapsed.
    pub fn time_since_last_alert(&self, now: u64) -> Option<u64> {
        (self.last_alert_time != 0).then(|| now.saturating_sub(self.last_alert_time))
    }

    pub fn phase(&self, now: u64, cooldown_seconds: u64) -> Phase {
        match self.time_since_last_alert(now) {
            Some(elapsed) if elapsed < cooldown_seconds => Phase::Cooldown,
            _ => Phase::Idle,
        }
    }
}

/// File-name-safe, reversible encoding: ASCII alphanumerics, `-` and `.`
/// pass through, every other byte becomes `%XX`
fn encode_component(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for &b in raw {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Loads and atomically replaces one file's `MonitorState`
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for the monitored file `source`, kept under `state_dir`.
    ///
    /// The file name is `<target>_<path>.json` with both parts passed through
    /// `encode_component`, which never emits `_`, so distinct (target, path)
    /// pairs always get distinct records.
    pub fn for_source(state_dir: &Path, target_name: &str, source: &Path) -> Self {
        let name = format!(
            "{}_{}.json",
            encode_component(target_name.as_bytes()),
            encode_component(source.as_os_str().as_encoded_bytes())
        );
        Self::new(state_dir.join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted state. A missing file yields zeroed state; an
    /// unreadable or malformed one is `StateCorrupt`.
    pub fn load(&self) -> crate::Result<MonitorState> {
        let content = match std::fs::read(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(MonitorState::default())
            }
            Err(e) => {
                return Err(LogwatchError::StateCorrupt {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_slice(&content).map_err(|e| LogwatchError::StateCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Like `load`, but a corrupt record is logged and replaced by zeroed state
    pub fn load_or_reset(&self) -> MonitorState {
        match self.load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("{}; reinitializing monitor state", e);
                MonitorState::default()
            }
        }
    }

    /// Replace the persisted state: write a unique temp file, fsync, rename.
    pub fn save(&self, state: &MonitorState) -> crate::Result<()> {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut file = File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            if let Err(cleanup) = std::fs::remove_file(&tmp_path) {
                tracing::warn!("Failed to remove {:?}: {}", tmp_path, cleanup);
            }
            return Err(e.into());
        }
        tracing::trace!("Saved state to {:?}: {:?}", self.path, state);
        Ok(())
    }
}
