//! BDD step definitions for rotation and unavailable-source features

use cucumber::{given, then};

use logwatch::state::MonitorState;
use logwatch::watcher::CycleStatus;

use crate::world::LogwatchWorld;

#[given(expr = "the stored offset is {int}")]
fn stored_offset(world: &mut LogwatchWorld, offset: u64) {
    let state = MonitorState {
        last_offset: offset,
        ..MonitorState::default()
    };
    world.store().save(&state).unwrap();
}

#[given("the log file has been removed")]
fn log_removed(world: &mut LogwatchWorld) {
    let path = world.log_path();
    if path.exists() {
        std::fs::remove_file(path).unwrap();
    }
}

#[then("the cycle detected a rotation")]
fn rotation_detected(world: &mut LogwatchWorld) {
    match &world.last_report.as_ref().expect("no cycle ran").status {
        CycleStatus::Evaluated { rotated, .. } => assert!(*rotated),
        other => panic!("expected an evaluated cycle, got {other:?}"),
    }
}

#[then("the cycle was skipped because the source is unavailable")]
fn source_unavailable(world: &mut LogwatchWorld) {
    let report = world.last_report.as_ref().expect("no cycle ran");
    assert!(
        matches!(report.status, CycleStatus::SourceUnavailable(_)),
        "unexpected status {:?}",
        report.status
    );
}

#[then(expr = "the stored offset is still {int}")]
fn offset_unchanged(world: &mut LogwatchWorld, offset: u64) {
    assert_eq!(world.stored_state().last_offset, offset);
}
