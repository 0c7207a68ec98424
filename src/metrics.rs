//! Metric helpers for `pokerwire`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Without the
//! `metrics` feature the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open subscription streams.
pub const STREAMS_OPEN: &str = "pokerwire_streams_open";
/// Name of the counter tracking received frames, labelled by kind.
pub const FRAMES_RECEIVED: &str = "pokerwire_frames_received_total";
/// Name of the counter tracking frames skipped by a receive filter.
pub const FRAMES_SKIPPED: &str = "pokerwire_frames_skipped_total";
/// Name of the counter tracking issued commands, labelled by outcome.
pub const COMMANDS_TOTAL: &str = "pokerwire_commands_total";
/// Name of the counter tracking rendezvous waits that timed out.
pub const RENDEZVOUS_STALLS: &str = "pokerwire_rendezvous_stalls_total";

/// Outcome label for [`COMMANDS_TOTAL`].
#[derive(Clone, Copy, Debug)]
pub enum CommandOutcome {
    /// The command was accepted.
    Accepted,
    /// The backend rejected the command.
    Rejected,
    /// The request never produced a response.
    Transport,
}

impl CommandOutcome {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            CommandOutcome::Accepted => "accepted",
            CommandOutcome::Rejected => "rejected",
            CommandOutcome::Transport => "transport",
        }
    }
}

/// Increment the open streams gauge.
pub fn inc_streams() {
    #[cfg(feature = "metrics")]
    gauge!(STREAMS_OPEN).increment(1.0);
}

/// Decrement the open streams gauge.
pub fn dec_streams() {
    #[cfg(feature = "metrics")]
    gauge!(STREAMS_OPEN).decrement(1.0);
}

/// Record a received frame of the given kind.
pub fn inc_frames(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_RECEIVED, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record a frame skipped by a receive filter.
pub fn inc_skipped() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_SKIPPED).increment(1);
}

/// Record a finished command.
pub fn inc_commands(outcome: CommandOutcome) {
    #[cfg(feature = "metrics")]
    counter!(COMMANDS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a rendezvous wait that ran out of time.
pub fn inc_stalls() {
    #[cfg(feature = "metrics")]
    counter!(RENDEZVOUS_STALLS).increment(1);
}
