//! Steps configuring the simulated backend and checking script outcomes.

use std::time::Duration;

use cucumber::{given, then, when};
use pokerwire::{ActorId, model::Chips};

use crate::world::HarnessWorld;

#[given("a simulated backend")]
fn backend(_world: &mut HarnessWorld) {}

#[given(expr = "a simulated backend that registers subscriptions after {int} ms")]
fn slow_backend(world: &mut HarnessWorld, millis: u64) {
    world.options_mut().subscribe_latency = Duration::from_millis(millis);
}

#[given(expr = "a simulated backend that sends {int} keepalives before every event")]
fn chatty_backend(world: &mut HarnessWorld, keepalives: usize) {
    world.options_mut().keepalives_before_data = keepalives;
}

#[given("a simulated backend that pushes every event twice")]
fn duplicating_backend(world: &mut HarnessWorld) { world.options_mut().duplicate_data = true; }

#[given("commands are not gated on subscriptions")]
fn ungated(world: &mut HarnessWorld) { world.disable_gate(); }

#[when("the three-hand script runs")]
async fn run_script(world: &mut HarnessWorld) { world.run_script().await; }

#[then("the script passes")]
fn passes(world: &mut HarnessWorld) {
    if let Err(e) = world.outcome() {
        panic!("script failed: {e}");
    }
}

#[then(expr = "the final stacks are {int}, {int} and {int}")]
fn final_stacks(world: &mut HarnessWorld, one: u64, two: u64, three: u64) {
    let report = world.outcome().as_ref().expect("script passed");
    let stacks: Vec<_> = ["player_one", "player_two", "player_three"]
        .map(ActorId::new)
        .iter()
        .map(|id| report.state.stack(id))
        .collect();
    assert_eq!(
        stacks,
        [one, two, three].map(|n| Some(Chips::new(n)))
    );
}

#[then(expr = "the step {string} fails while {word}")]
fn fails_at(world: &mut HarnessWorld, step: String, phase: String) {
    let Err(err) = world.outcome() else {
        panic!("script unexpectedly passed");
    };
    assert_eq!(err.step, step);
    assert_eq!(err.phase.to_string(), phase);
}
