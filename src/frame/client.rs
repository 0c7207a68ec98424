//! Frames written by the harness.

use serde::Serialize;
use serde_json::Value;

/// Outbound subscription protocol frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Connection-level handshake carrying the session credentials.
    ConnectionInit {
        /// Credential map rendered from a session context.
        payload: Value,
    },
    /// Register one named subscription.
    Start {
        /// Subscription id, unique on the connection.
        id: String,
        /// Operation to subscribe to.
        payload: StartPayload,
    },
    /// Cancel one subscription.
    Stop {
        /// Subscription id given to the matching `start`.
        id: String,
    },
    /// Ask the server to drop the connection.
    ConnectionTerminate,
}

/// Body of a `start` frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub variables: Value,
    pub extensions: Value,
    pub operation_name: String,
    pub query: String,
}

impl ClientFrame {
    /// Render the frame as socket text.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if a payload value cannot be encoded.
    pub fn to_text(&self) -> Result<String, serde_json::Error> { serde_json::to_string(self) }
}
