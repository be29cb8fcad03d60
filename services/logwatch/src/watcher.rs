//! Watcher: runs poll cycles over every target and dispatches alerts

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, TargetConfig};
use crate::detector::{AlertPayload, Detector, Verdict};
use crate::notifier::{Notification, Notifier};
use crate::state::{MonitorState, Phase, StateStore};
use crate::tracker;

/// A configured target with its compiled detector
#[derive(Debug, Clone)]
pub struct Target {
    pub config: TargetConfig,
    pub detector: Detector,
}

/// What happened to one monitored file during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStatus {
    Evaluated {
        error_count: usize,
        verdict: Verdict,
        rotated: bool,
        dispatch: DispatchSummary,
    },
    SourceUnavailable(String),
}

/// Outcome of one file's poll, with the state that was persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub target: String,
    pub path: PathBuf,
    pub state: MonitorState,
    pub status: CycleStatus,
}

impl CycleReport {
    pub fn alerted(&self) -> bool {
        matches!(
            self.status,
            CycleStatus::Evaluated {
                verdict: Verdict::Fire,
                ..
            }
        )
    }
}

/// Delivery results across all notifiers for one alert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Persisted view of one monitored file, for operators
#[derive(Debug, Clone, Serialize)]
pub struct TargetStatus {
    pub target: String,
    pub path: PathBuf,
    pub phase: Phase,
    #[serde(flatten)]
    pub state: MonitorState,
}

/// Polls targets, evaluates bursts, persists state and sends alerts
#[derive(Debug)]
pub struct Watcher {
    targets: Vec<Target>,
    notifiers: Vec<Arc<dyn Notifier>>,
    state_dir: PathBuf,
    max_sample_lines: usize,
    max_read_bytes: u64,
}

impl Watcher {
    pub fn new(config: &Config, notifiers: Vec<Arc<dyn Notifier>>) -> crate::Result<Self> {
        let targets = config
            .targets
            .iter()
            .map(|t| {
                Ok(Target {
                    config: t.clone(),
                    detector: Detector::from_target(t)?,
                })
            })
            .collect::<crate::Result<Vec<_>>>()?;

        Ok(Self {
            targets,
            notifiers,
            state_dir: config.state_dir.clone(),
            max_sample_lines: config.max_sample_lines,
            max_read_bytes: config.max_read_bytes,
        })
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Files a target currently refers to. A plain path is returned as-is so
    /// a missing file is reported; a glob yields only existing files.
    pub fn resolve_paths(target: &TargetConfig) -> Vec<PathBuf> {
        if !target.is_glob() {
            return vec![PathBuf::from(&target.path)];
        }
        match glob::glob(&target.path) {
            Ok(paths) => {
                let mut found: Vec<PathBuf> = paths
                    .filter_map(|entry| match entry {
                        Ok(path) => Some(path),
                        Err(e) => {
                            tracing::warn!("Target '{}': {}", target.name, e);
                            None
                        }
                    })
                    .filter(|path| path.is_file())
                    .collect();
                found.sort();
                found
            }
            Err(e) => {
                tracing::warn!("Target '{}': invalid glob: {}", target.name, e);
                Vec::new()
            }
        }
    }

    fn store(&self, target: &TargetConfig, path: &Path) -> StateStore {
        StateStore::for_source(&self.state_dir, &target.name, path)
    }

    /// Run one cycle over every target and file
    pub async fn run_cycle(&self, now: u64) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        for target in &self.targets {
            let paths = Self::resolve_paths(&target.config);
            if paths.is_empty() {
                tracing::warn!(
                    "Target '{}': no files match {}",
                    target.config.name,
                    target.config.path
                );
            }
            for path in paths {
                reports.push(self.poll_file(target, &path, now).await);
            }
        }
        reports
    }

    /// Read, evaluate, persist, then notify for a single file
    pub async fn poll_file(&self, target: &Target, path: &Path, now: u64) -> CycleReport {
        let name = &target.config.name;
        let store = self.store(&target.config, path);
        let mut state = store.load_or_reset();

        let read = tracker::read_new_lines_capped(path, state.last_offset, self.max_read_bytes);
        let read = match read {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!("Target '{}': skipping cycle: {}", name, e);
                state.last_check_time = now;
                persist(&store, &state);
                return CycleReport {
                    target: name.clone(),
                    path: path.to_path_buf(),
                    state,
                    status: CycleStatus::SourceUnavailable(e.to_string()),
                };
            }
        };

        if read.rotated {
            tracing::info!(
                "Target '{}': {:?} shrank below offset {}; rotation detected, reading from start",
                name,
                path,
                state.last_offset
            );
        }

        let outcome = target
            .detector
            .evaluate_cycle(path, &read.lines, now, state);
        let mut state = outcome.state;
        state.last_offset = read.new_offset;
        persist(&store, &state);

        let verdict = outcome.verdict();
        let error_count = outcome.decision.error_count;
        tracing::debug!(
            "Target '{}': {:?}: {} new lines, {} matched, offset {}",
            name,
            path,
            read.lines.len(),
            error_count,
            state.last_offset
        );
        if read.pending > 0 {
            tracing::debug!(
                "Target '{}': {} bytes of {:?} left for the next cycle",
                name,
                read.pending,
                path
            );
        }

        let dispatch = match (verdict, outcome.alert) {
            (_, Some(alert)) => {
                tracing::warn!(
                    "Target '{}': {} errors in {:?} (threshold {}); alerting",
                    name,
                    error_count,
                    path,
                    target.detector.threshold()
                );
                self.dispatch(&alert).await
            }
            (Verdict::Suppressed { remaining }, None) => {
                tracing::info!(
                    "Target '{}': {} errors in {:?}, alert suppressed for another {}",
                    name,
                    error_count,
                    path,
                    humantime::format_duration(Duration::from_secs(remaining))
                );
                DispatchSummary::default()
            }
            _ => DispatchSummary::default(),
        };

        CycleReport {
            target: name.clone(),
            path: path.to_path_buf(),
            state,
            status: CycleStatus::Evaluated {
                error_count,
                verdict,
                rotated: read.rotated,
                dispatch,
            },
        }
    }

    /// Send an alert through every notifier. Failures are logged and counted;
    /// they never undo the recorded alert time.
    pub async fn dispatch(&self, alert: &AlertPayload) -> DispatchSummary {
        let notification = Notification::from_alert(alert, self.max_sample_lines);
        let mut summary = DispatchSummary::default();

        for notifier in &self.notifiers {
            match notifier.notify(&notification).await {
                Ok(()) => {
                    tracing::debug!("Alert delivered via '{}'", notifier.type_name());
                    summary.sent += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Notification via '{}' for {:?} failed: {}",
                        notifier.type_name(),
                        alert.source_path,
                        e
                    );
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Send a synthetic alert so operators can verify delivery
    pub async fn send_test_alert(&self, now: u64) -> DispatchSummary {
        let alert = AlertPayload {
            count: 1,
            sample_lines: vec!["logwatch test alert".to_string()],
            timestamp: now,
            source_path: PathBuf::from("logwatch-test"),
        };
        self.dispatch(&alert).await
    }

    /// Current persisted state of every resolved file
    pub fn status(&self, now: u64) -> Vec<TargetStatus> {
        let mut out = Vec::new();
        for target in &self.targets {
            for path in Self::resolve_paths(&target.config) {
                let state = self.store(&target.config, &path).load_or_reset();
                out.push(TargetStatus {
                    target: target.config.name.clone(),
                    phase: state.phase(now, target.detector.cooldown().as_secs()),
                    path,
                    state,
                });
            }
        }
        out
    }

    /// Poll on a fixed interval until cancelled. Cancellation is observed
    /// between cycles only.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Watcher cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }
            self.run_cycle(current_epoch_secs()).await;
        }
    }
}

fn persist(store: &StateStore, state: &MonitorState) {
    if let Err(e) = store.save(state) {
        tracing::error!("Failed to persist state to {:?}: {}", store.path(), e);
    }
}

pub fn current_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
