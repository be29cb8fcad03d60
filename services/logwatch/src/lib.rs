//! Logwatch - log file error-burst detection and alerting service
//!
//! Tails log files, counts lines matching an error pattern each cycle, and
//! sends rate-limited alerts when a burst crosses the threshold.

pub mod config;
pub mod detector;
pub mod error;
pub mod event;
pub mod io;
pub mod lease;
pub mod mail;
pub mod notifier;
pub mod pushover;
pub mod state;
pub mod tracker;
pub mod watcher;
pub mod webhook;

pub use config::{load_config, Config};
pub use error::{LogwatchError, Result};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::NotifierConfig;
use crate::io::{CommandRunner, HttpClient, ReqwestHttpClient, TokioCommandRunner};
use crate::lease::{Lease, LeaseOwner, ProcessProbe};
use crate::mail::MailNotifier;
use crate::notifier::{LogNotifier, Notifier};
use crate::pushover::PushoverNotifier;
use crate::watcher::{current_epoch_secs, CycleReport, DispatchSummary, TargetStatus, Watcher};
use crate::webhook::WebhookNotifier;

/// Build one notifier per configured sender. With none configured, alerts
/// go to the log.
pub fn build_notifiers(
    config: &Config,
    http: Arc<dyn HttpClient>,
    runner: Arc<dyn CommandRunner>,
) -> Vec<Arc<dyn Notifier>> {
    if config.notifiers.is_empty() {
        return vec![Arc::new(LogNotifier)];
    }

    config
        .notifiers
        .iter()
        .map(|notifier_config| -> Arc<dyn Notifier> {
            match notifier_config {
                NotifierConfig::Log => Arc::new(LogNotifier),
                NotifierConfig::Pushover {
                    api_token,
                    user_key,
                    default_title,
                    default_priority,
                } => Arc::new(PushoverNotifier::new(
                    api_token,
                    user_key,
                    default_title,
                    *default_priority,
                    Arc::clone(&http),
                )),
                NotifierConfig::Webhook { url } => {
                    Arc::new(WebhookNotifier::new(url, Arc::clone(&http)))
                }
                NotifierConfig::Mail {
                    recipients,
                    programs,
                } => Arc::new(MailNotifier::new(
                    recipients.clone(),
                    programs.clone(),
                    Arc::clone(&runner),
                )),
            }
        })
        .collect()
}

/// Build a watcher wired to the production HTTP client and process runner
pub fn build_watcher(config: &Config) -> Result<Watcher> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::default());
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
    Watcher::new(config, build_notifiers(config, http, runner))
}

fn acquire_lease(config: &Config) -> Result<Lease> {
    Lease::acquire(
        &config.lock_file,
        LeaseOwner::current(current_epoch_secs()),
        &ProcessProbe,
    )
}

/// Run continuously until `cancel` fires
pub async fn run(config: &Config, cancel: CancellationToken) -> Result<()> {
    let watcher = build_watcher(config)?;
    let lease = acquire_lease(config)?;
    let interval = Duration::from_secs(config.polling_interval_seconds);

    tracing::info!(
        "Logwatch started: {} target(s), polling every {}",
        watcher.targets().len(),
        humantime::format_duration(interval)
    );

    watcher.run(interval, cancel).await;

    lease.release()?;
    tracing::info!("Logwatch stopped");
    Ok(())
}

/// Run a single cycle under the lease
pub async fn run_once(config: &Config) -> Result<Vec<CycleReport>> {
    let watcher = build_watcher(config)?;
    let lease = acquire_lease(config)?;

    let reports = watcher.run_cycle(current_epoch_secs()).await;

    lease.release()?;
    Ok(reports)
}

/// Persisted state of every resolved file. Does not take the lease.
pub fn status(config: &Config) -> Result<Vec<TargetStatus>> {
    Ok(build_watcher(config)?.status(current_epoch_secs()))
}

/// Send a synthetic alert through every notifier; any failed send is an error
pub async fn send_test_alert(config: &Config) -> Result<DispatchSummary> {
    let summary = build_watcher(config)?
        .send_test_alert(current_epoch_secs())
        .await;

    if summary.failed > 0 {
        return Err(LogwatchError::NotificationFailed(format!(
            "{} of {} notifier(s) failed",
            summary.failed,
            summary.sent + summary.failed
        )));
    }
    Ok(summary)
}

/// Cancel `cancel` on Ctrl-C or SIGTERM
pub fn spawn_shutdown_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping after the current cycle");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::warn!("Failed to listen for SIGTERM: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
            }
        }
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
    }
}
