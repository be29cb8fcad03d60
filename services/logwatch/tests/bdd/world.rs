//! BDD test world for logwatch service

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use cucumber::World;
use tempfile::TempDir;

use logwatch::config::{Config, TargetConfig};
use logwatch::lease::Lease;
use logwatch::notifier::{Notification, Notifier};
use logwatch::state::{MonitorState, StateStore};
use logwatch::watcher::{CycleReport, Watcher};

pub const TARGET: &str = "app";

/// Notifier that records every notification it is asked to send
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    fn type_name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, notification: &Notification) -> logwatch::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Debug, Default, World)]
pub struct LogwatchWorld {
    pub dir: Option<TempDir>,
    pub pattern: String,
    pub threshold: usize,
    pub cooldown_seconds: u64,
    pub recorder: Arc<RecordingNotifier>,
    pub last_report: Option<CycleReport>,

    // Lease testing
    pub lease: Option<Lease>,
    pub lease_result: Option<logwatch::Result<Lease>>,
}

impl LogwatchWorld {
    pub fn dir(&mut self) -> PathBuf {
        self.dir
            .get_or_insert_with(|| tempfile::tempdir().unwrap())
            .path()
            .to_path_buf()
    }

    pub fn log_path(&mut self) -> PathBuf {
        self.dir().join("app.log")
    }

    pub fn lock_path(&mut self) -> PathBuf {
        self.dir().join("logwatch.lock")
    }

    pub fn config(&mut self) -> Config {
        let dir = self.dir();
        Config {
            targets: vec![TargetConfig {
                name: TARGET.to_string(),
                path: self.log_path().to_string_lossy().into_owned(),
                pattern: self.pattern.clone(),
                case_sensitive: true,
                threshold: self.threshold,
                cooldown_seconds: self.cooldown_seconds,
            }],
            state_dir: dir.join("state"),
            lock_file: dir.join("logwatch.lock"),
            ..Config::default()
        }
    }

    pub fn watcher(&mut self) -> Watcher {
        let notifier: Arc<dyn Notifier> = self.recorder.clone();
        Watcher::new(&self.config(), vec![notifier]).unwrap()
    }

    pub fn store(&mut self) -> StateStore {
        let state_dir = self.dir().join("state");
        StateStore::for_source(&state_dir, TARGET, &self.log_path())
    }

    pub fn stored_state(&mut self) -> MonitorState {
        self.store().load().unwrap()
    }

    pub fn append(&mut self, content: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    pub fn append_lines(&mut self, matching: usize, other: usize) {
        let mut content = String::new();
        for i in 0..matching {
            content.push_str(&format!("{} request {} failed\n", self.pattern, i));
        }
        for i in 0..other {
            content.push_str(&format!("INFO request {} ok\n", i));
        }
        self.append(&content);
    }
}
