//! Scenario steps, their orchestration and the cross-hand invariants
//! checked between them.

pub mod invariants;
pub mod orchestrator;
pub mod script;
pub mod state;
pub mod step;

pub use invariants::Checkpoint;
pub use orchestrator::{Orchestrator, Phase, ScenarioError, StepReport};
pub use script::{STARTING_STACK, ScenarioReport, Script, three_player_hands};
pub use state::ScenarioState;
pub use step::{Expectation, FixtureScope, StackSource, Step, StepAction};
