//! BDD step definitions for alerting feature

use cucumber::{given, then, when};

use logwatch::detector::Verdict;
use logwatch::state::Phase;
use logwatch::watcher::CycleStatus;

use crate::world::LogwatchWorld;

#[given(expr = "a log file watched for {string} with threshold {int} and cooldown {int} seconds")]
fn watched_log(world: &mut LogwatchWorld, pattern: String, threshold: usize, cooldown: u64) {
    world.pattern = pattern;
    world.threshold = threshold;
    world.cooldown_seconds = cooldown;
    world.append("");
}

#[given(expr = "the log file contains {int} matching lines and {int} other line(s)")]
fn log_contains(world: &mut LogwatchWorld, matching: usize, other: usize) {
    world.append_lines(matching, other);
}

#[when(expr = "{int} more matching lines are appended")]
fn more_matching(world: &mut LogwatchWorld, matching: usize) {
    world.append_lines(matching, 0);
}

#[when(expr = "a poll cycle runs at time {int}")]
async fn poll_cycle(world: &mut LogwatchWorld, now: u64) {
    let watcher = world.watcher();
    let mut reports = watcher.run_cycle(now).await;
    assert_eq!(reports.len(), 1, "expected exactly one monitored file");
    world.last_report = reports.pop();
}

#[then(expr = "{int} alert(s) has/have been sent")]
fn alerts_sent(world: &mut LogwatchWorld, expected: usize) {
    assert_eq!(world.recorder.sent().len(), expected);
}

#[then("no alert has been sent")]
fn no_alert(world: &mut LogwatchWorld) {
    assert!(world.recorder.sent().is_empty());
}

#[then(expr = "the latest alert reports {int} error lines")]
fn latest_alert_count(world: &mut LogwatchWorld, count: usize) {
    let sent = world.recorder.sent();
    let latest = sent.last().expect("no alert was sent");
    assert_eq!(latest.alert.count, count);
    assert_eq!(latest.alert.sample_lines.len(), count);
    assert!(latest.title.contains(&format!("({} lines)", count)));
}

#[then("the stored offset equals the file size")]
fn offset_is_file_size(world: &mut LogwatchWorld) {
    let size = std::fs::metadata(world.log_path()).unwrap().len();
    assert_eq!(world.stored_state().last_offset, size);
}

#[then(expr = "the last alert time is {int}")]
fn last_alert_time(world: &mut LogwatchWorld, expected: u64) {
    assert_eq!(world.stored_state().last_alert_time, expected);
}

#[then(expr = "the last check time is {int}")]
fn last_check_time(world: &mut LogwatchWorld, expected: u64) {
    assert_eq!(world.stored_state().last_check_time, expected);
}

#[then(expr = "the burst was suppressed with {int} seconds of cooldown remaining")]
fn suppressed(world: &mut LogwatchWorld, remaining: u64) {
    match &world.last_report.as_ref().expect("no cycle ran").status {
        CycleStatus::Evaluated { verdict, .. } => {
            assert_eq!(*verdict, Verdict::Suppressed { remaining });
        }
        other => panic!("expected an evaluated cycle, got {other:?}"),
    }
}

#[then(expr = "the file is in {word} phase at time {int}")]
fn phase_at(world: &mut LogwatchWorld, phase: String, now: u64) {
    let expected = match phase.as_str() {
        "idle" => Phase::Idle,
        "cooldown" => Phase::Cooldown,
        other => panic!("unknown phase {other}"),
    };
    let cooldown = world.cooldown_seconds;
    assert_eq!(world.stored_state().phase(now, cooldown), expected);
}
