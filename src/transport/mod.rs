//! Transport seams for the subscription socket and the command endpoint.
//!
//! Actors only ever talk to these traits. [`ws::WsConnector`] and
//! [`http::HttpCommandTransport`] are the network implementations; tests
//! substitute in-memory backends.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod http;
pub mod ws;

pub use http::HttpCommandTransport;
pub use ws::WsConnector;

/// Errors produced by a transport implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect {
        /// Endpoint that was dialled.
        endpoint: String,
        /// Underlying failure.
        reason: String,
    },
    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),
    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),
    /// A command request failed before a response arrived.
    #[error("request to {endpoint} failed: {reason}")]
    Request {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// Underlying failure.
        reason: String,
    },
    /// A command request exceeded its timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Opens subscription connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open one persistent bidirectional connection to `endpoint`.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FrameChannel>, TransportError>;
}

/// One open subscription connection carrying text frames.
#[async_trait]
pub trait FrameChannel: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Read the next text frame; `None` once the peer has closed.
    async fn recv_text(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// One request to the command endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandRequest {
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub timeout: Duration,
}

/// Raw response of the command endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandResponse {
    pub status: u16,
    pub body: String,
}

impl CommandResponse {
    /// Whether the status code is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

/// Sends single command requests.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Send `request` and return the raw response.
    async fn send(&self, request: CommandRequest) -> Result<CommandResponse, TransportError>;
}
