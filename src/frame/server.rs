//! Frames read by the harness.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Errors raised while decoding socket text into a [`ServerFrame`].
#[derive(Debug, Error)]
pub enum FrameDecodeError {
    /// The text was not a JSON object.
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerFrame {
    /// Acknowledgements, keepalives and unknown frame types.
    Control(ControlFrame),
    /// A state update pushed for a subscription.
    Data(DataFrame),
    /// The server reported a failure.
    Error(ErrorFrame),
    /// A subscription finished.
    Complete {
        /// Subscription id, when the server named one.
        id: Option<String>,
    },
}

/// Control frames carry no state update and are skipped by data filters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlFrame {
    ConnectionAck,
    SubscriptionAck { id: Option<String> },
    KeepAlive,
    /// Any frame type the harness has no meaning for.
    Other { kind: String },
}

/// A pushed state update.
#[derive(Clone, Debug, PartialEq)]
pub struct DataFrame {
    id: Option<String>,
    operation: Option<String>,
    payload: Value,
}

/// A server-reported error.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorFrame {
    id: Option<String>,
    message: String,
    payload: Value,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
}

impl ServerFrame {
    /// Decode one frame of socket text.
    ///
    /// # Errors
    ///
    /// Returns [`FrameDecodeError`] when the text is not a JSON object with a
    /// string `type` field.
    pub fn decode(text: &str) -> Result<Self, FrameDecodeError> {
        let RawFrame { kind, id, payload } = serde_json::from_str(text)?;
        let payload = payload.unwrap_or(Value::Null);
        Ok(match kind.as_str() {
            "data" | "next" => ServerFrame::Data(DataFrame {
                id,
                operation: None,
                payload,
            }),
            "error" | "connection_error" => ServerFrame::Error(ErrorFrame::new(id, payload)),
            "complete" => ServerFrame::Complete { id },
            "connection_ack" => ServerFrame::Control(ControlFrame::ConnectionAck),
            "start_ack" | "subscription_ack" => {
                ServerFrame::Control(ControlFrame::SubscriptionAck { id })
            }
            "ka" | "keepalive" | "ping" => ServerFrame::Control(ControlFrame::KeepAlive),
            _ => ServerFrame::Control(ControlFrame::Other { kind }),
        })
    }

    /// Short label used for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServerFrame::Control(_) => "control",
            ServerFrame::Data(_) => "data",
            ServerFrame::Error(_) => "error",
            ServerFrame::Complete { .. } => "complete",
        }
    }

    /// Subscription id carried by the frame, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            ServerFrame::Data(frame) => frame.id(),
            ServerFrame::Error(frame) => frame.id(),
            ServerFrame::Complete { id }
            | ServerFrame::Control(ControlFrame::SubscriptionAck { id }) => id.as_deref(),
            ServerFrame::Control(_) => None,
        }
    }

    /// Render the frame back into its wire shape for diagnostics.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            ServerFrame::Data(frame) => frame.to_wire(),
            ServerFrame::Error(frame) => with_id(
                json!({"type": "error", "payload": frame.payload}),
                frame.id.as_deref(),
            ),
            ServerFrame::Complete { id } => with_id(json!({"type": "complete"}), id.as_deref()),
            ServerFrame::Control(ControlFrame::ConnectionAck) => json!({"type": "connection_ack"}),
            ServerFrame::Control(ControlFrame::SubscriptionAck { id }) => {
                with_id(json!({"type": "start_ack"}), id.as_deref())
            }
            ServerFrame::Control(ControlFrame::KeepAlive) => json!({"type": "ka"}),
            ServerFrame::Control(ControlFrame::Other { kind }) => json!({"type": kind}),
        }
    }
}

fn with_id(mut frame: Value, id: Option<&str>) -> Value {
    if let (Some(id), Value::Object(map)) = (id, &mut frame) {
        map.insert("id".into(), Value::from(id));
    }
    frame
}

impl DataFrame {
    /// Build a data frame, as a backend would push it.
    #[must_use]
    pub fn new(id: Option<String>, payload: Value) -> Self {
        Self {
            id,
            operation: None,
            payload,
        }
    }

    /// Tag the frame with the operation its subscription id was registered for.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> { self.id.as_deref() }

    /// Operation name of the subscription that produced this frame.
    #[must_use]
    pub fn operation(&self) -> Option<&str> { self.operation.as_deref() }

    /// The whole `payload` object.
    #[must_use]
    pub fn payload(&self) -> &Value { &self.payload }

    /// The `payload.data` object, or `null` when absent.
    #[must_use]
    pub fn data(&self) -> &Value { self.payload.get("data").unwrap_or(&Value::Null) }

    /// Non-empty GraphQL `errors` list carried beside the data, if any.
    #[must_use]
    pub fn errors(&self) -> Option<&[Value]> {
        self.payload
            .get("errors")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .filter(|errors| !errors.is_empty())
    }

    /// Render the frame in its wire shape, `{type, id, payload}`.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut frame = Map::new();
        frame.insert("type".into(), Value::from("data"));
        if let Some(id) = &self.id {
            frame.insert("id".into(), Value::from(id.as_str()));
        }
        frame.insert("payload".into(), self.payload.clone());
        Value::Object(frame)
    }
}

impl ErrorFrame {
    fn new(id: Option<String>, payload: Value) -> Self {
        let message = error_message(&payload);
        Self {
            id,
            message,
            payload,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> { self.id.as_deref() }

    /// Human-readable message extracted from the payload.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }

    #[must_use]
    pub fn payload(&self) -> &Value { &self.payload }
}

fn error_message(payload: &Value) -> String {
    match payload {
        Value::String(message) => message.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| payload.to_string(), str::to_owned),
        Value::Array(entries) => entries
            .first()
            .map_or_else(|| payload.to_string(), error_message),
        other => other.to_string(),
    }
}
