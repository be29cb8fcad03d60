//! BDD step definitions for single-instance lease feature

use cucumber::{given, then, when};

use logwatch::lease::{read_owner, Lease, LeaseOwner, LivenessProbe};
use logwatch::LogwatchError;

use crate::world::LogwatchWorld;

const HOLDER_PID: u32 = 4242;
const NEWCOMER_PID: u32 = 4343;

/// Probe that treats only the configured pid as running
struct OnlyAlive(Option<u32>);

impl LivenessProbe for OnlyAlive {
    fn is_alive(&self, owner: &LeaseOwner) -> bool {
        self.0 == Some(owner.pid)
    }
}

fn owner(pid: u32) -> LeaseOwner {
    LeaseOwner {
        pid,
        acquired_at: 1_000,
    }
}

#[given("a lease held by a running instance")]
fn lease_held(world: &mut LogwatchWorld) {
    let path = world.lock_path();
    let lease = Lease::acquire(&path, owner(HOLDER_PID), &OnlyAlive(Some(HOLDER_PID))).unwrap();
    world.lease = Some(lease);
}

#[given("a lease record left behind by a process that has exited")]
fn stale_lease(world: &mut LogwatchWorld) {
    let path = world.lock_path();
    std::fs::write(&path, serde_json::to_vec(&owner(HOLDER_PID)).unwrap()).unwrap();
}

#[given("an unreadable lease record")]
fn garbage_lease(world: &mut LogwatchWorld) {
    let path = world.lock_path();
    std::fs::write(&path, "not a lease").unwrap();
}

#[when("a second instance tries to take the lease")]
fn second_instance(world: &mut LogwatchWorld) {
    let path = world.lock_path();
    let probe = OnlyAlive(world.lease.as_ref().map(|l| l.owner().pid));
    world.lease_result = Some(Lease::acquire(&path, owner(NEWCOMER_PID), &probe));
}

#[then("it is refused because an instance is already running")]
fn refused(world: &mut LogwatchWorld) {
    match world.lease_result.as_ref().expect("no acquisition attempted") {
        Err(LogwatchError::AlreadyRunning { pid }) => assert_eq!(*pid, HOLDER_PID),
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
}

#[then("the lease record still names the running instance")]
fn record_unchanged(world: &mut LogwatchWorld) {
    let path = world.lock_path();
    assert_eq!(read_owner(&path).map(|o| o.pid), Some(HOLDER_PID));
}

#[then("the second instance holds the lease")]
fn newcomer_holds(world: &mut LogwatchWorld) {
    let path = world.lock_path();
    match world.lease_result.as_ref().expect("no acquisition attempted") {
        Ok(lease) => assert_eq!(lease.owner().pid, NEWCOMER_PID),
        Err(e) => panic!("expected the lease, got {e}"),
    }
    assert_eq!(read_owner(&path).map(|o| o.pid), Some(NEWCOMER_PID));
}

#[then("releasing it removes the lease record")]
fn release_removes(world: &mut LogwatchWorld) {
    let path = world.lock_path();
    let lease = world
        .lease_result
        .take()
        .expect("no acquisition attempted")
        .unwrap();
    lease.release().unwrap();
    assert!(!path.exists());
}
