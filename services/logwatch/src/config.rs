//! Configuration types for the logwatch service

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::LogwatchError;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,
    #[serde(default = "default_polling_interval")]
    pub polling_interval_seconds: u64,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,
    #[serde(default = "default_max_sample_lines")]
    pub max_sample_lines: usize,
    /// Bytes read from one file per cycle; the rest waits for the next cycle
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            notifiers: Vec::new(),
            polling_interval_seconds: default_polling_interval(),
            state_dir: default_state_dir(),
            lock_file: default_lock_file(),
            max_sample_lines: default_max_sample_lines(),
            max_read_bytes: default_max_read_bytes(),
        }
    }
}

/// A monitored log file (or glob of files) and its alerting policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    /// File path; glob patterns expand to one monitored file per match
    pub path: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,
}

impl TargetConfig {
    /// True when `path` contains glob metacharacters
    pub fn is_glob(&self) -> bool {
        self.path.contains(['*', '?', '['])
    }

    /// The regex actually compiled for this target, with case folding applied
    pub fn effective_pattern(&self) -> String {
        if self.case_sensitive {
            self.pattern.clone()
        } else {
            format!("(?i){}", self.pattern)
        }
    }
}

/// Notifier configuration with tagged enum for extensibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotifierConfig {
    #[serde(rename = "log")]
    Log,
    #[serde(rename = "pushover")]
    Pushover {
        api_token: String,
        user_key: String,
        #[serde(default = "default_pushover_title")]
        default_title: String,
        #[serde(default)]
        default_priority: i8,
    },
    #[serde(rename = "webhook")]
    Webhook { url: String },
    #[serde(rename = "mail")]
    Mail {
        recipients: Vec<String>,
        #[serde(default = "default_mail_programs")]
        programs: Vec<String>,
    },
}

impl NotifierConfig {
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Log => "log",
            NotifierConfig::Pushover { .. } => "pushover",
            NotifierConfig::Webhook { .. } => "webhook",
            NotifierConfig::Mail { .. } => "mail",
        }
    }
}

impl Config {
    /// Check the invariants the watcher relies on. Called once at startup.
    pub fn validate(&self) -> crate::Result<()> {
        if self.targets.is_empty() {
            return Err(LogwatchError::Config("no targets configured".to_string()));
        }
        if self.polling_interval_seconds == 0 {
            return Err(LogwatchError::Config(
                "polling_interval_seconds must be at least 1".to_string(),
            ));
        }

        if self.max_read_bytes == 0 {
            return Err(LogwatchError::Config(
                "max_read_bytes must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            if !names.insert(target.name.as_str()) {
                return Err(LogwatchError::Config(format!(
                    "duplicate target name '{}'",
                    target.name
                )));
            }
            if target.threshold == 0 {
                return Err(LogwatchError::Config(format!(
                    "target '{}': threshold must be at least 1",
                    target.name
                )));
            }
            if let Err(e) = regex::Regex::new(&target.effective_pattern()) {
                return Err(LogwatchError::Config(format!(
                    "target '{}': invalid pattern: {}",
                    target.name, e
                )));
            }
            if target.is_glob() {
                if let Err(e) = glob::Pattern::new(&target.path) {
                    return Err(LogwatchError::Config(format!(
                        "target '{}': invalid glob: {}",
                        target.name, e
                    )));
                }
            }
        }

        for notifier in &self.notifiers {
            if let NotifierConfig::Mail {
                recipients,
                programs,
            } = notifier
            {
                if recipients.is_empty() || programs.is_empty() {
                    return Err(LogwatchError::Config(
                        "mail notifier needs at least one recipient and one program".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn default_polling_interval() -> u64 {
    60
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/logwatch")
}

fn default_lock_file() -> PathBuf {
    PathBuf::from("/var/lib/logwatch/logwatch.lock")
}

fn default_max_sample_lines() -> usize {
    10
}

fn default_max_read_bytes() -> u64 {
    crate::tracker::DEFAULT_MAX_READ_BYTES
}

/// Matches a 5xx status field in common/combined access log lines
fn default_pattern() -> String {
    r#"" 5[0-9]{2} "#.to_string()
}

fn default_threshold() -> usize {
    10
}

fn default_cooldown() -> u64 {
    1800
}

fn default_pushover_title() -> String {
    "Log Alert".to_string()
}

fn default_mail_programs() -> Vec<String> {
    vec![
        "mail".to_string(),
        "mailx".to_string(),
        "sendmail".to_string(),
    ]
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LogwatchError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
