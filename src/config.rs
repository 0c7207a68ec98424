//! Harness configuration.
//!
//! Every blocking operation the harness performs is bounded by one of the
//! values in [`Timeouts`]; nothing waits indefinitely.

use std::time::Duration;

use crate::{stream::DEFAULT_MAX_IGNORED, transport::ws::GRAPHQL_WS};

/// Default subscription endpoint.
pub const DEFAULT_WS_ENDPOINT: &str = "ws://127.0.0.1:3000/ws";
/// Default command endpoint.
pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "http://localhost:3000/graphql";

/// Bounds applied to each blocking operation of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum wait of a gated command for its readiness permits.
    pub rendezvous: Duration,
    /// Deadline of each stream receive.
    pub next: Duration,
    /// Timeout of a command request.
    pub command: Duration,
    /// Quiet window used to detect surplus frames after a step.
    pub silence: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            rendezvous: Duration::from_secs(5),
            next: Duration::from_secs(5),
            command: Duration::from_secs(5),
            silence: Duration::from_millis(100),
        }
    }
}

impl Timeouts {
    /// Use `limit` for the rendezvous, receive and command bounds.
    #[must_use]
    pub fn uniform(limit: Duration) -> Self {
        Self {
            rendezvous: limit,
            next: limit,
            command: limit,
            ..Self::default()
        }
    }
}

/// Settings shared by every step of a scenario.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use pokerwire::config::HarnessConfig;
///
/// let config = HarnessConfig::default()
///     .with_ws_endpoint("ws://backend:3000/ws")
///     .with_max_ignored_frames(10);
/// assert_eq!(config.ws_endpoint(), "ws://backend:3000/ws");
/// assert_eq!(config.timeouts().next, Duration::from_secs(5));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarnessConfig {
    ws_endpoint: String,
    graphql_endpoint: String,
    subprotocol: String,
    timeouts: Timeouts,
    max_ignored_frames: usize,
    gate_commands: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            ws_endpoint: DEFAULT_WS_ENDPOINT.to_owned(),
            graphql_endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_owned(),
            subprotocol: GRAPHQL_WS.to_owned(),
            timeouts: Timeouts::default(),
            max_ignored_frames: DEFAULT_MAX_IGNORED,
            gate_commands: true,
        }
    }
}

impl HarnessConfig {
    #[must_use]
    pub fn with_ws_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.ws_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_graphql_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.graphql_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = subprotocol.into();
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn with_max_ignored_frames(mut self, max: usize) -> Self {
        self.max_ignored_frames = max;
        self
    }

    /// Send commands without waiting for subscribers.
    ///
    /// Only useful to reproduce the subscribe-after-publish race.
    #[must_use]
    pub fn without_gate(mut self) -> Self {
        self.gate_commands = false;
        self
    }

    #[must_use]
    pub fn ws_endpoint(&self) -> &str { &self.ws_endpoint }

    #[must_use]
    pub fn graphql_endpoint(&self) -> &str { &self.graphql_endpoint }

    #[must_use]
    pub fn subprotocol(&self) -> &str { &self.subprotocol }

    #[must_use]
    pub fn timeouts(&self) -> Timeouts { self.timeouts }

    #[must_use]
    pub fn max_ignored_frames(&self) -> usize { self.max_ignored_frames }

    #[must_use]
    pub fn gate_commands(&self) -> bool { self.gate_commands }
}
