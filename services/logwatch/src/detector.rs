//! Burst detection: per-cycle error counting against a threshold and cooldown

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::TargetConfig;
use crate::state::MonitorState;
use crate::LogwatchError;

/// Inputs to the fire/suppress decision for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDecision {
    pub error_count: usize,
    pub threshold: usize,
    /// `None` when no alert has ever fired
    pub time_since_last_alert: Option<u64>,
    pub cooldown: u64,
}

/// What the detector concluded for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No matching lines
    Quiet,
    /// Some matches, fewer than the threshold
    BelowThreshold,
    /// Threshold met outside the cooldown window
    Fire,
    /// Threshold met but an alert fired less than `cooldown` seconds ago
    Suppressed { remaining: u64 },
}

impl AlertDecision {
    pub fn verdict(&self) -> Verdict {
        if self.error_count == 0 {
            return Verdict::Quiet;
        }
        if self.error_count < self.threshold {
            return Verdict::BelowThreshold;
        }
        match self.time_since_last_alert {
            Some(elapsed) if elapsed < self.cooldown => Verdict::Suppressed {
                remaining: self.cooldown - elapsed,
            },
            _ => Verdict::Fire,
        }
    }

    pub fn should_fire(&self) -> bool {
        self.verdict() == Verdict::Fire
    }
}

/// Alert content handed to notifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub count: usize,
    pub sample_lines: Vec<String>,
    /// Epoch seconds
    pub timestamp: u64,
    pub source_path: PathBuf,
}

/// Result of evaluating one cycle's lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub state: MonitorState,
    pub decision: AlertDecision,
    pub alert: Option<AlertPayload>,
}

impl CycleOutcome {
    pub fn verdict(&self) -> Verdict {
        self.decision.verdict()
    }
}

/// Matches lines against an error pattern and applies threshold/cooldown
#[derive(Debug, Clone)]
pub struct Detector {
    pattern: Regex,
    threshold: usize,
    cooldown: Duration,
}

impl Detector {
    pub fn new(pattern: Regex, threshold: usize, cooldown: Duration) -> Self {
        Self {
            pattern,
            threshold,
            cooldown,
        }
    }

    pub fn from_target(target: &TargetConfig) -> crate::Result<Self> {
        let pattern = Regex::new(&target.effective_pattern()).map_err(|e| {
            LogwatchError::Config(format!(
                "target '{}': invalid pattern: {}",
                target.name, e
            ))
        })?;
        Ok(Self::new(
            pattern,
            target.threshold,
            Duration::from_secs(target.cooldown_seconds),
        ))
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    /// Evaluate one cycle's new lines. Counting is per cycle: matches from
    /// earlier polls never carry over.
    ///
    /// `last_check_time` always advances to `now`; `last_alert_time` moves
    /// only when the alert fires. The offset is left for the caller.
    pub fn evaluate_cycle(
        &self,
        source_path: &Path,
        new_lines: &[String],
        now: u64,
        state: MonitorState,
    ) -> CycleOutcome {
        let matched: Vec<String> = new_lines
            .iter()
            .filter(|line| self.matches(line))
            .cloned()
            .collect();

        let decision = AlertDecision {
            error_count: matched.len(),
            threshold: self.threshold,
            time_since_last_alert: state.time_since_last_alert(now),
            cooldown: self.cooldown.as_secs(),
        };

        let mut state = state;
        state.last_check_time = now;

        let alert = if decision.should_fire() {
            state.last_alert_time = now;
            Some(AlertPayload {
                count: matched.len(),
                sample_lines: matched,
                timestamp: now,
                source_path: source_path.to_path_buf(),
            })
        } else {
            None
        };

        CycleOutcome {
            state,
            decision,
            alert,
        }
    }
}
