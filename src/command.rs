//! Command actor issuing single mutating requests.
//!
//! A [`CommandActor`] may be gated on a [`Rendezvous`]: before sending it
//! acquires one permit per party that must be subscribed. Nothing is
//! retried.

use std::{sync::Arc, time::Duration};

use serde_json::Value;
use thiserror::Error;

use crate::{
    context::{ActorId, SessionContext},
    graphql::Operation,
    metrics::{self, CommandOutcome},
    rendezvous::{Rendezvous, RendezvousError},
    transport::{CommandRequest, CommandTransport, TransportError},
};

/// Errors returned by [`CommandActor::execute`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The required parties never became ready.
    #[error(transparent)]
    NotReady(#[from] RendezvousError),
    /// The request produced no response.
    #[error("{actor} {operation} failed: {source}")]
    Transport {
        actor: ActorId,
        operation: String,
        #[source]
        source: TransportError,
    },
    /// The backend answered but rejected the command: a non-2xx status, a
    /// body that is not a response envelope, or an envelope carrying errors.
    #[error("{actor} {operation} rejected with status {status}: {body}")]
    Rejected {
        actor: ActorId,
        operation: String,
        status: u16,
        body: String,
    },
}

/// Successful command response.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandReply {
    status: u16,
    data: Value,
}

impl CommandReply {
    #[must_use]
    pub fn status(&self) -> u16 { self.status }

    /// The `data` object of the response envelope.
    #[must_use]
    pub fn data(&self) -> &Value { &self.data }

    /// A string-valued top-level result field, such as a returned hand id.
    #[must_use]
    pub fn string_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

#[derive(Clone, Debug)]
struct Gate {
    ready: Rendezvous,
    parties: u32,
    max_wait: Duration,
}

/// Issues commands on behalf of one participant.
#[derive(Clone)]
pub struct CommandActor {
    transport: Arc<dyn CommandTransport>,
    endpoint: String,
    context: SessionContext,
    gate: Option<Gate>,
}

impl std::fmt::Debug for CommandActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandActor")
            .field("participant", self.context.participant())
            .field("endpoint", &self.endpoint)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl CommandActor {
    /// Create an ungated actor.
    #[must_use]
    pub fn new(
        transport: Arc<dyn CommandTransport>,
        endpoint: impl Into<String>,
        context: SessionContext,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            context,
            gate: None,
        }
    }

    /// Wait for `parties` permits on `ready`, at most `max_wait`, before each
    /// send.
    #[must_use]
    pub fn gated(mut self, ready: Rendezvous, parties: u32, max_wait: Duration) -> Self {
        self.gate = Some(Gate {
            ready,
            parties,
            max_wait,
        });
        self
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext { &self.context }

    /// Send `operation` once, after the gate (if any) opens.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NotReady`] if the gate stalls,
    /// [`CommandError::Transport`] if no response arrives within `timeout`
    /// and [`CommandError::Rejected`] if the backend refuses the command.
    pub async fn execute(
        &self,
        operation: &Operation,
        timeout: Duration,
    ) -> Result<CommandReply, CommandError> {
        let actor = self.context.participant();
        if let Some(gate) = &self.gate {
            gate.ready
                .acquire_many(actor.as_str(), gate.parties, gate.max_wait)
                .await?;
            tracing::debug!(%actor, point = gate.ready.point(), parties = gate.parties, "gate open");
        }

        let request = CommandRequest {
            endpoint: self.endpoint.clone(),
            headers: self
                .context
                .headers()
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
            body: operation.request_body(),
            timeout,
        };
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(source) => {
                metrics::inc_commands(CommandOutcome::Transport);
                return Err(CommandError::Transport {
                    actor: actor.clone(),
                    operation: operation.name().to_owned(),
                    source,
                });
            }
        };

        let rejected = || {
            metrics::inc_commands(CommandOutcome::Rejected);
            tracing::warn!(%actor, operation = operation.name(), status = response.status, "command rejected");
            CommandError::Rejected {
                actor: actor.clone(),
                operation: operation.name().to_owned(),
                status: response.status,
                body: response.body.clone(),
            }
        };
        if !response.is_success() {
            return Err(rejected());
        }
        let Ok(envelope) = serde_json::from_str::<Value>(&response.body) else {
            return Err(rejected());
        };
        let has_errors = envelope
            .get("errors")
            .and_then(Value::as_array)
            .is_some_and(|errors| !errors.is_empty());
        if has_errors || !envelope.is_object() {
            return Err(rejected());
        }

        metrics::inc_commands(CommandOutcome::Accepted);
        tracing::info!(%actor, operation = operation.name(), "command accepted");
        Ok(CommandReply {
            status: response.status,
            data: envelope.get("data").cloned().unwrap_or(Value::Null),
        })
    }
}
