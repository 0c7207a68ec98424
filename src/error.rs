//! Error taxonomy for the harness.
//!
//! Each actor reports failures through its own type; [`HarnessError`]
//! composes them for the orchestrator. Nothing here is retried: every error
//! fails the step that produced it.

use std::{fmt, time::Duration};

use serde_json::Value;
use thiserror::Error;

use crate::{
    command::CommandError,
    context::ActorId,
    rendezvous::RendezvousError,
    transport::TransportError,
};

/// Why a connection became unusable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// The transport failed to connect, send or receive.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
    /// An inbound frame could not be decoded.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// An outbound frame could not be encoded.
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// Transport-level failure of one stream actor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{actor}: {kind}")]
pub struct ConnectionError {
    pub actor: ActorId,
    #[source]
    pub kind: ConnectionFailure,
}

/// Which bound a receive exceeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutReason {
    /// The deadline passed.
    Deadline,
    /// More non-matching frames arrived than the receive tolerates.
    IgnoredBudget,
}

impl fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutReason::Deadline => f.write_str("deadline passed"),
            TimeoutReason::IgnoredBudget => f.write_str("ignored-frame budget exhausted"),
        }
    }
}

/// An expected frame never arrived.
#[derive(Debug, Error, Clone, PartialEq)]
#[error(
    "{actor} waiting for {waiting_for}: {reason} after {elapsed:?} ({ignored} frames ignored, last frame: {})",
    .last_frame.as_ref().map_or_else(|| "none".to_string(), Value::to_string)
)]
pub struct ProtocolTimeoutError {
    pub actor: ActorId,
    /// Description of the filter that was being waited on.
    pub waiting_for: String,
    pub reason: TimeoutReason,
    pub ignored: usize,
    pub elapsed: Duration,
    /// Wire form of the last frame seen, for diagnostics.
    pub last_frame: Option<Value>,
}

/// The server reported an error on a subscription.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{actor} subscription {} failed: {message}", .id.as_deref().unwrap_or("<connection>"))]
pub struct SubscriptionError {
    pub actor: ActorId,
    pub id: Option<String>,
    pub message: String,
    /// Wire form of the offending frame.
    pub frame: Value,
}

/// Failures of a stream actor operation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Timeout(#[from] ProtocolTimeoutError),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

/// An observed value did not match its expected fixture.
#[derive(Debug, Error, Clone, PartialEq)]
#[error(
    "{actor}: `{path}` expected {} but observed {}",
    render(.expected.as_ref()),
    render(.actual.as_ref())
)]
pub struct AssertionFailure {
    /// Step the failure belongs to; empty until the orchestrator attributes
    /// it.
    pub step: String,
    pub actor: String,
    /// Path of the first differing field, e.g. `handEvent.playerEvent.currentStack`.
    pub path: String,
    /// `None` when the field is absent from the fixture.
    pub expected: Option<Value>,
    /// `None` when the field is absent from the observed frame.
    pub actual: Option<Value>,
}

fn render(value: Option<&Value>) -> String {
    value.map_or_else(|| "<missing>".to_string(), Value::to_string)
}

/// Any failure that aborts a scenario step.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("protocol timeout: {0}")]
    ProtocolTimeout(#[from] ProtocolTimeoutError),
    #[error("subscription error: {0}")]
    Subscription(#[from] SubscriptionError),
    #[error("command error: {0}")]
    Command(#[from] CommandError),
    #[error("assertion failed: {0}")]
    Assertion(#[from] AssertionFailure),
    #[error("rendezvous error: {0}")]
    Rendezvous(#[from] RendezvousError),
    /// An asserted payload could not be read as its typed view.
    #[error("{actor}: payload is not a valid {view}: {reason}")]
    Payload {
        actor: String,
        view: &'static str,
        reason: String,
    },
    /// The actor was torn down because a sibling failed.
    #[error("{actor} cancelled after a sibling actor failed")]
    Cancelled { actor: String },
    /// An actor task panicked.
    #[error("{actor} panicked: {reason}")]
    Panicked { actor: String, reason: String },
    /// A step cannot be run against the current scenario state.
    #[error("invalid step: {0}")]
    Script(String),
}

impl From<StreamError> for HarnessError {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Connection(e) => HarnessError::Connection(e),
            StreamError::Timeout(e) => HarnessError::ProtocolTimeout(e),
            StreamError::Subscription(e) => HarnessError::Subscription(e),
        }
    }
}

impl HarnessError {
    /// Whether this is a teardown side effect rather than a root cause.
    #[must_use]
    pub fn is_cancellation(&self) -> bool { matches!(self, HarnessError::Cancelled { .. }) }
}
