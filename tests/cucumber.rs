//! Cucumber test runner for behavioural scenarios.
//!
//! Every feature runs against a fresh [`HarnessWorld`]: an in-memory backend
//! configured by the `Given` steps and an orchestrator driving it.
//!
//! ```text
//! tests/features/three_hands.feature -> HarnessWorld context
//! tests/features/arming.feature      -> HarnessWorld context
//! ```

mod steps;

use cucumber::World;
use world::HarnessWorld;

#[tokio::main]
async fn main() {
    HarnessWorld::run("tests/features/three_hands.feature").await;
    HarnessWorld::run("tests/features/arming.feature").await;
}
