//! BDD test entry point for logwatch service

#[path = "bdd/world.rs"]
mod world;

#[path = "bdd/steps/mod.rs"]
mod steps;

use cucumber::World as _;
use world::LogwatchWorld;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    LogwatchWorld::run("tests/features").await;
}
