//! Stream actor owning one subscription connection.
//!
//! The actor registers subscriptions, signals readiness through a
//! [`Rendezvous`], and hands out decoded frames one at a time. It never
//! drains frames on its own: every expected frame costs one call to
//! [`StreamActor::next`], so a surplus frame stays queued until
//! [`StreamActor::expect_silence`] reports it.

mod options;

use std::{collections::HashMap, collections::VecDeque, time::Duration};

use serde_json::Value;
use tokio::time::{Instant, timeout_at};

pub use self::options::{DEFAULT_MAX_IGNORED, DEFAULT_NEXT_TIMEOUT, FrameFilter, NextOptions};
use crate::{
    context::{ActorId, SessionContext},
    error::{
        ConnectionError,
        ConnectionFailure,
        ProtocolTimeoutError,
        StreamError,
        SubscriptionError,
        TimeoutReason,
    },
    frame::{ClientFrame, DataFrame, ServerFrame},
    graphql::Operation,
    metrics,
    rendezvous::Rendezvous,
    transport::{Connector, FrameChannel},
};

/// Number of recent inbound frames kept for diagnostics.
const TRAIL_CAPACITY: usize = 16;

enum Verdict<T> {
    /// Hand the value to the caller.
    Take(T),
    /// Not wanted; counts against the ignored-frame budget.
    Skip,
    /// Not wanted, but a data frame the caller chose to pass over.
    Pass,
}

/// Actor owning one persistent subscription connection.
pub struct StreamActor {
    context: SessionContext,
    endpoint: String,
    channel: Box<dyn FrameChannel>,
    /// Subscription id to operation name.
    subscriptions: HashMap<String, String>,
    next_id: u64,
    trail: VecDeque<Value>,
    open: bool,
}

impl std::fmt::Debug for StreamActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamActor")
            .field("participant", self.context.participant())
            .field("endpoint", &self.endpoint)
            .field("subscriptions", &self.subscriptions)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl StreamActor {
    /// Open a connection to `endpoint` on behalf of `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the transport cannot connect.
    pub async fn connect(
        connector: &dyn Connector,
        endpoint: &str,
        context: SessionContext,
    ) -> Result<Self, ConnectionError> {
        let channel = connector
            .connect(endpoint)
            .await
            .map_err(|e| ConnectionError {
                actor: context.participant().clone(),
                kind: e.into(),
            })?;
        tracing::info!(actor = %context.participant(), endpoint, "stream connected");
        Ok(Self::from_channel(channel, endpoint, context))
    }

    /// Wrap an already open channel.
    #[must_use]
    pub fn from_channel(
        channel: Box<dyn FrameChannel>,
        endpoint: impl Into<String>,
        context: SessionContext,
    ) -> Self {
        metrics::inc_streams();
        Self {
            context,
            endpoint: endpoint.into(),
            channel,
            subscriptions: HashMap::new(),
            next_id: 1,
            trail: VecDeque::with_capacity(TRAIL_CAPACITY),
            open: true,
        }
    }

    #[must_use]
    pub fn participant(&self) -> &ActorId { self.context.participant() }

    #[must_use]
    pub fn context(&self) -> &SessionContext { &self.context }

    #[must_use]
    pub fn endpoint(&self) -> &str { &self.endpoint }

    /// Operation registered under a subscription id.
    #[must_use]
    pub fn subscription(&self, id: &str) -> Option<&str> {
        self.subscriptions.get(id).map(String::as_str)
    }

    /// Wire form of the most recent inbound frames, oldest first.
    pub fn trail(&self) -> impl Iterator<Item = &Value> { self.trail.iter() }

    /// Send the handshake carrying the session credentials.
    ///
    /// Does not wait for `connection_ack`; use [`FrameFilter::ConnectionAck`]
    /// with [`next`](Self::next) where a backend is known to acknowledge.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the frame cannot be written.
    pub async fn initialize(&mut self) -> Result<(), ConnectionError> {
        let payload = self.context.handshake_payload();
        self.send(&ClientFrame::ConnectionInit { payload }).await
    }

    /// Register `operation` and then release one permit on `ready`.
    ///
    /// Ids are assigned per connection, starting at `"1"`. The permit is
    /// released only after the `start` frame was written.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the frame cannot be written; no permit
    /// is released in that case.
    pub async fn subscribe(
        &mut self,
        operation: &Operation,
        ready: &Rendezvous,
    ) -> Result<String, ConnectionError> {
        let id = self.next_id.to_string();
        self.next_id += 1;
        self.send(&ClientFrame::Start {
            id: id.clone(),
            payload: operation.start_payload(),
        })
        .await?;
        self.subscriptions.insert(id.clone(), operation.name().to_owned());
        tracing::debug!(
            actor = %self.context.participant(),
            id = %id,
            operation = operation.name(),
            point = ready.point(),
            "subscribed"
        );
        ready.release();
        Ok(id)
    }

    /// Cancel a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the frame cannot be written.
    pub async fn unsubscribe(&mut self, id: &str) -> Result<(), ConnectionError> {
        self.send(&ClientFrame::Stop { id: id.to_owned() }).await?;
        self.subscriptions.remove(id);
        Ok(())
    }

    /// Wait for the next frame accepted by `options.filter`.
    ///
    /// Frames the filter rejects are skipped and counted; error frames and
    /// data frames carrying GraphQL errors fail immediately.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Timeout`] when the deadline passes or more than
    /// `options.max_ignored` frames were skipped, [`StreamError::Subscription`]
    /// on a server-reported error, and [`StreamError::Connection`] when the
    /// connection fails or closes.
    pub async fn next(&mut self, options: &NextOptions) -> Result<ServerFrame, StreamError> {
        let filter = &options.filter;
        self.receive(options, |frame| {
            if filter.matches(&frame) {
                Verdict::Take(frame)
            } else {
                Verdict::Skip
            }
        })
        .await
    }

    /// [`next`](Self::next), returning the data frame itself.
    ///
    /// A [`FrameFilter::ConnectionAck`] filter never yields data and so
    /// always times out here.
    ///
    /// # Errors
    ///
    /// As for [`next`](Self::next).
    pub async fn next_data(&mut self, options: &NextOptions) -> Result<DataFrame, StreamError> {
        let filter = &options.filter;
        self.receive(options, |frame| {
            let wanted = filter.matches(&frame);
            match frame {
                ServerFrame::Data(data) if wanted => Verdict::Take(data),
                _ => Verdict::Skip,
            }
        })
        .await
    }

    /// Wait for a data frame accepted by the filter that also satisfies
    /// `predicate`.
    ///
    /// Accepted data frames failing the predicate are passed over without
    /// counting against the ignored-frame budget; only the deadline bounds
    /// them.
    ///
    /// # Errors
    ///
    /// As for [`next`](Self::next).
    pub async fn next_matching<P>(
        &mut self,
        options: &NextOptions,
        mut predicate: P,
    ) -> Result<DataFrame, StreamError>
    where
        P: FnMut(&DataFrame) -> bool + Send,
    {
        let filter = &options.filter;
        self.receive(options, |frame| {
            let wanted = filter.matches(&frame);
            match frame {
                ServerFrame::Data(data) if wanted => {
                    if predicate(&data) {
                        Verdict::Take(data)
                    } else {
                        Verdict::Pass
                    }
                }
                _ => Verdict::Skip,
            }
        })
        .await
    }

    /// Collect every data frame arriving within `window`.
    ///
    /// Control frames are ignored. A peer close ends the window early.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Subscription`] on a server-reported error and
    /// [`StreamError::Connection`] on transport failure.
    pub async fn expect_silence(&mut self, window: Duration) -> Result<Vec<DataFrame>, StreamError> {
        let deadline = Instant::now() + window;
        let mut extra = Vec::new();
        loop {
            let frame = match timeout_at(deadline, self.recv_frame()).await {
                Err(_) => break,
                Ok(Err(ConnectionError {
                    kind: ConnectionFailure::Closed,
                    ..
                })) => {
                    tracing::debug!(actor = %self.context.participant(), "peer closed during quiet window");
                    break;
                }
                Ok(frame) => frame?,
            };
            self.check_errors(&frame)?;
            if let ServerFrame::Data(data) = frame {
                extra.push(data);
            }
        }
        Ok(extra)
    }

    /// Terminate the session and close the socket.
    ///
    /// Safe to call more than once; only the first call touches the socket.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the socket fails to close cleanly.
    pub async fn close(&mut self) -> Result<(), ConnectionError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        metrics::dec_streams();
        if let Err(e) = self.send(&ClientFrame::ConnectionTerminate).await {
            tracing::debug!(actor = %self.context.participant(), error = %e, "terminate not delivered");
        }
        self.channel.close().await.map_err(|e| self.failure(e.into()))?;
        tracing::info!(actor = %self.context.participant(), "stream closed");
        Ok(())
    }

    async fn receive<T, F>(&mut self, options: &NextOptions, mut verdict: F) -> Result<T, StreamError>
    where
        F: FnMut(ServerFrame) -> Verdict<T>,
    {
        let started = Instant::now();
        let deadline = started + options.timeout;
        let mut ignored = 0usize;
        loop {
            let Ok(frame) = timeout_at(deadline, self.recv_frame()).await else {
                return Err(self.timed_out(options, TimeoutReason::Deadline, ignored, started));
            };
            let frame = frame?;
            self.check_errors(&frame)?;
            let kind = frame.kind();
            match verdict(frame) {
                Verdict::Take(value) => return Ok(value),
                Verdict::Pass => {
                    tracing::trace!(actor = %self.context.participant(), "passed over data frame");
                }
                Verdict::Skip => {
                    ignored += 1;
                    metrics::inc_skipped();
                    tracing::trace!(actor = %self.context.participant(), kind, ignored, "skipped frame");
                    if ignored > options.max_ignored {
                        return Err(self.timed_out(
                            options,
                            TimeoutReason::IgnoredBudget,
                            ignored,
                            started,
                        ));
                    }
                }
            }
        }
    }

    async fn recv_frame(&mut self) -> Result<ServerFrame, ConnectionError> {
        let text = match self.channel.recv_text().await {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Err(self.failure(e.into())),
            None => return Err(self.failure(ConnectionFailure::Closed)),
        };
        let frame = ServerFrame::decode(&text)
            .map_err(|e| self.failure(ConnectionFailure::Malformed(e.to_string())))?;
        let frame = match frame {
            ServerFrame::Data(data) => {
                let operation = data.id().and_then(|id| self.subscriptions.get(id)).cloned();
                ServerFrame::Data(match operation {
                    Some(operation) => data.with_operation(operation),
                    None => data,
                })
            }
            other => other,
        };
        metrics::inc_frames(frame.kind());
        if self.trail.len() == TRAIL_CAPACITY {
            self.trail.pop_front();
        }
        self.trail.push_back(frame.to_wire());
        Ok(frame)
    }

    fn check_errors(&self, frame: &ServerFrame) -> Result<(), SubscriptionError> {
        let error = match frame {
            ServerFrame::Error(error) => SubscriptionError {
                actor: self.context.participant().clone(),
                id: error.id().map(str::to_owned),
                message: error.message().to_owned(),
                frame: frame.to_wire(),
            },
            ServerFrame::Data(data) => match data.errors() {
                Some(errors) => SubscriptionError {
                    actor: self.context.participant().clone(),
                    id: data.id().map(str::to_owned),
                    message: errors
                        .iter()
                        .map(|e| e.get("message").and_then(Value::as_str).unwrap_or("unknown error"))
                        .collect::<Vec<_>>()
                        .join("; "),
                    frame: frame.to_wire(),
                },
                None => return Ok(()),
            },
            _ => return Ok(()),
        };
        tracing::warn!(actor = %error.actor, message = %error.message, "subscription error");
        Err(error)
    }

    async fn send(&mut self, frame: &ClientFrame) -> Result<(), ConnectionError> {
        let text = frame
            .to_text()
            .map_err(|e| self.failure(ConnectionFailure::Encode(e.to_string())))?;
        self.channel
            .send_text(text)
            .await
            .map_err(|e| self.failure(e.into()))
    }

    fn failure(&self, kind: ConnectionFailure) -> ConnectionError {
        ConnectionError {
            actor: self.context.participant().clone(),
            kind,
        }
    }

    fn timed_out(
        &self,
        options: &NextOptions,
        reason: TimeoutReason,
        ignored: usize,
        started: Instant,
    ) -> StreamError {
        let error = ProtocolTimeoutError {
            actor: self.context.participant().clone(),
            waiting_for: options.filter.to_string(),
            reason,
            ignored,
            elapsed: started.elapsed(),
            last_frame: self.trail.back().cloned(),
        };
        tracing::warn!(error = %error, "receive timed out");
        error.into()
    }
}

impl Drop for StreamActor {
    fn drop(&mut self) {
        if self.open {
            metrics::dec_streams();
            tracing::debug!(actor = %self.context.participant(), "stream dropped without close");
        }
    }
}

#[cfg(test)]
mod tests;
