//! Subscription protocol frames.
//!
//! [`ClientFrame`] covers everything a stream actor writes to the socket.
//! [`ServerFrame`] is the decoded form of everything it reads: frames are
//! decoded once, at the actor boundary, and travel as typed values from then
//! on.

mod client;
mod server;

pub use client::{ClientFrame, StartPayload};
pub use server::{ControlFrame, DataFrame, ErrorFrame, FrameDecodeError, ServerFrame};

#[cfg(test)]
mod tests;
