//! Shared fixtures for integration tests.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::{sync::Arc, time::Duration};

use pokerwire::{
    ActorId,
    HarnessConfig,
    Orchestrator,
    ScenarioState,
    TableId,
    Timeouts,
    scenario::STARTING_STACK,
};
use pokerwire_testing::{BackendOptions, SimulatedBackend};

/// The three participants every scenario seats, in table order.
#[must_use]
pub fn players() -> [ActorId; 3] {
    [
        ActorId::new("player_one"),
        ActorId::new("player_two"),
        ActorId::new("player_three"),
    ]
}

#[must_use]
pub fn table() -> TableId { TableId::new("123") }

/// Fresh state for the three participants at [`table`].
#[must_use]
pub fn state() -> ScenarioState { ScenarioState::new(table(), players().to_vec(), STARTING_STACK) }

/// Configuration with bounds short enough for failing tests to end quickly.
#[must_use]
pub fn config() -> HarnessConfig {
    HarnessConfig::default().with_timeouts(Timeouts {
        silence: Duration::from_millis(20),
        ..Timeouts::uniform(Duration::from_millis(500))
    })
}

/// Orchestrator wired to `backend` for both seams.
#[must_use]
pub fn orchestrator(backend: &SimulatedBackend, config: HarnessConfig) -> Orchestrator {
    Orchestrator::new(config, Arc::new(backend.clone()), Arc::new(backend.clone()))
}

/// Backend with `options` and an orchestrator using [`config`].
#[must_use]
pub fn harness(options: BackendOptions) -> (SimulatedBackend, Orchestrator) {
    let backend = SimulatedBackend::new(options);
    let orchestrator = orchestrator(&backend, config());
    (backend, orchestrator)
}
