//! In-memory poker backend speaking the harness's wire formats.
//!
//! [`SimulatedBackend`] implements both transport seams, so an
//! [`Orchestrator`](pokerwire::Orchestrator) can be driven without a network.
//! Subscriptions are registered synchronously inside the `start` write and
//! events are only delivered to subscriptions registered at publish time.
//! [`BackendOptions`] switches on the misbehaviours the harness must detect.

pub mod table;

use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use pokerwire::{
    context::{ActorId, HandId, TABLE_TOKEN, TableId, USER_TOKEN},
    graphql::{
        DEAL_FIELD,
        DEAL_MUTATION,
        DEAL_SUBSCRIPTION,
        HAND_EVENT_FIELD,
        HAND_EVENT_SUBSCRIPTION,
        HAND_FIELD,
        HAND_QUERY,
        PLAY_TURN_FIELD,
        PLAY_TURN_MUTATION,
    },
    model::{Chips, PlayerAction},
    transport::{
        CommandRequest,
        CommandResponse,
        CommandTransport,
        Connector,
        FrameChannel,
        TransportError,
    },
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;

pub use self::table::{Hand, RuleError};

/// Misbehaviours and delays the backend can be asked to exhibit.
#[derive(Clone, Debug)]
pub struct BackendOptions {
    /// Keepalive frames pushed ahead of every data frame.
    pub keepalives_before_data: usize,
    /// Delay between receiving a `start` frame and registering it.
    pub subscribe_latency: Duration,
    /// Accept commands but never push their events.
    pub suppress_data: bool,
    /// Push every data frame twice.
    pub duplicate_data: bool,
    /// Answer every `start` with an error frame.
    pub reject_subscriptions: bool,
    /// Answer `connection_init` with `connection_ack`.
    pub ack_connection: bool,
    /// Answer every command with HTTP 500.
    pub fail_commands: bool,
    /// Deal the next hand as soon as one completes. The finished hand's deal
    /// is pushed again first, as a replay observers must pass over.
    pub auto_deal: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            keepalives_before_data: 0,
            subscribe_latency: Duration::ZERO,
            suppress_data: false,
            duplicate_data: false,
            reject_subscriptions: false,
            ack_connection: true,
            fail_commands: false,
            auto_deal: false,
        }
    }
}

#[derive(Debug)]
struct Subscriber {
    table: TableId,
    field: &'static str,
    outbound: mpsc::UnboundedSender<String>,
}

#[derive(Debug, Default)]
struct Tables {
    hands: HashMap<HandId, Hand>,
    dealt: u64,
}

impl Tables {
    fn next_id(&mut self) -> HandId {
        self.dealt += 1;
        HandId::new(format!("hand-{}", self.dealt))
    }
}

#[derive(Debug)]
struct Inner {
    options: BackendOptions,
    subscribers: DashMap<(u64, String), Subscriber>,
    connections: AtomicU64,
    tables: Mutex<Tables>,
    requests: Mutex<Vec<CommandRequest>>,
}

/// Shared handle to one simulated backend.
#[derive(Clone, Debug)]
pub struct SimulatedBackend {
    inner: Arc<Inner>,
}

impl Default for SimulatedBackend {
    fn default() -> Self { Self::new(BackendOptions::default()) }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DealRequest {
    table_id: TableId,
    button_index: usize,
    small_blind: Chips,
    big_blind: Chips,
    players: Vec<SeatRequest>,
}

#[derive(Deserialize)]
struct SeatRequest {
    id: ActorId,
    stack: Chips,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayRequest {
    id: HandId,
    player_id: ActorId,
    action: PlayerAction,
    amount: Chips,
}

#[derive(Deserialize)]
struct HandRequest {
    id: HandId,
}

impl SimulatedBackend {
    #[must_use]
    pub fn new(options: BackendOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                subscribers: DashMap::new(),
                connections: AtomicU64::new(0),
                tables: Mutex::new(Tables::default()),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Subscriptions currently registered across all connections.
    #[must_use]
    pub fn subscriptions(&self) -> usize { self.inner.subscribers.len() }

    /// Every command request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<CommandRequest> { lock(&self.inner.requests).clone() }

    /// Current state of a dealt hand.
    #[must_use]
    pub fn hand(&self, id: &HandId) -> Option<Hand> { lock(&self.inner.tables).hands.get(id).cloned() }

    fn publish(&self, table: &TableId, field: &'static str, event: Value) {
        let options = &self.inner.options;
        if options.suppress_data {
            log::debug!("suppressing {field} event for table {table}");
            return;
        }
        let data = json!({ field: event });
        let copies = if options.duplicate_data { 2 } else { 1 };
        for entry in &self.inner.subscribers {
            let ((_, id), subscriber) = (entry.key(), entry.value());
            if &subscriber.table != table || subscriber.field != field {
                continue;
            }
            for _ in 0..options.keepalives_before_data {
                let _ = subscriber.outbound.send(json!({"type": "ka"}).to_string());
            }
            let frame = json!({"type": "data", "id": id, "payload": {"data": data}}).to_string();
            for _ in 0..copies {
                let _ = subscriber.outbound.send(frame.clone());
            }
        }
    }

    fn deal(&self, variables: &Value) -> Result<Value, String> {
        let DealRequest {
            table_id,
            button_index,
            small_blind,
            big_blind,
            players,
        } = parse(variables.get("input"))?;
        let players: Vec<_> = players.into_iter().map(|s| (s.id, s.stack)).collect();
        let hand = {
            let mut tables = lock(&self.inner.tables);
            let id = tables.next_id();
            let hand = Hand::deal(id.clone(), table_id, button_index, (small_blind, big_blind), &players)
                .map_err(|e| e.to_string())?;
            tables.hands.insert(id, hand.clone());
            hand
        };
        log::info!("dealt {} at table {} with button {button_index}", hand.id(), hand.table());
        self.announce(&hand)?;
        Ok(json!({ DEAL_FIELD: hand.id() }))
    }

    fn announce(&self, hand: &Hand) -> Result<(), String> {
        let event = serde_json::to_value(hand.created_event()).map_err(|e| e.to_string())?;
        self.publish(hand.table(), DEAL_FIELD, event);
        Ok(())
    }

    fn play(&self, variables: &Value, user: Option<&str>) -> Result<Value, String> {
        let PlayRequest {
            id,
            player_id,
            action,
            amount,
        } = parse(Some(variables))?;
        if user != Some(player_id.as_str()) {
            return Err(format!("{} may not act for {player_id}", user.unwrap_or("anonymous")));
        }
        let (table, events, redeal) = {
            let mut tables = lock(&self.inner.tables);
            let hand = tables
                .hands
                .get_mut(&id)
                .ok_or_else(|| format!("unknown hand {id}"))?;
            let events = hand.play(&player_id, action, amount).map_err(|e| e.to_string())?;
            let table = hand.table().clone();
            let finished = (self.inner.options.auto_deal && hand.is_complete()).then(|| hand.clone());
            let redeal = match finished {
                Some(finished) => {
                    let next = finished.next_deal(tables.next_id()).map_err(|e| e.to_string())?;
                    tables.hands.insert(next.id().clone(), next.clone());
                    Some((finished, next))
                }
                None => None,
            };
            (table, events, redeal)
        };
        for event in events {
            let event = serde_json::to_value(event).map_err(|e| e.to_string())?;
            self.publish(&table, HAND_EVENT_FIELD, event);
        }
        if let Some((finished, next)) = redeal {
            log::info!("auto-dealt {} after {} at table {table}", next.id(), finished.id());
            self.announce(&finished)?;
            self.announce(&next)?;
        }
        Ok(json!({ PLAY_TURN_FIELD: id }))
    }

    fn query_hand(&self, variables: &Value) -> Result<Value, String> {
        let HandRequest { id } = parse(Some(variables))?;
        let detail = lock(&self.inner.tables)
            .hands
            .get(&id)
            .map(Hand::detail)
            .ok_or_else(|| format!("unknown hand {id}"))?;
        let detail = serde_json::to_value(detail).map_err(|e| e.to_string())?;
        Ok(json!({ HAND_FIELD: detail }))
    }
}

fn parse<T: for<'de> Deserialize<'de>>(value: Option<&Value>) -> Result<T, String> {
    let value = value.ok_or("missing variables")?;
    T::deserialize(value).map_err(|e| format!("invalid variables: {e}"))
}

fn header<'a>(request: &'a CommandRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[async_trait]
impl CommandTransport for SimulatedBackend {
    async fn send(&self, request: CommandRequest) -> Result<CommandResponse, TransportError> {
        lock(&self.inner.requests).push(request.clone());
        if self.inner.options.fail_commands {
            return Ok(CommandResponse {
                status: 500,
                body: "internal server error".into(),
            });
        }
        let body = &request.body;
        let variables = body.get("variables").unwrap_or(&Value::Null);
        let operation = body.get("operationName").and_then(Value::as_str).unwrap_or_default();
        let result = match operation {
            DEAL_MUTATION => self.deal(variables),
            PLAY_TURN_MUTATION => self.play(variables, header(&request, USER_TOKEN)),
            HAND_QUERY => self.query_hand(variables),
            other => {
                return Ok(CommandResponse {
                    status: 400,
                    body: json!({"errors": [{"message": format!("unknown operation `{other}`")}]})
                        .to_string(),
                });
            }
        };
        let body = match result {
            Ok(data) => json!({ "data": data }),
            Err(message) => {
                log::warn!("{operation} rejected: {message}");
                json!({ "data": null, "errors": [{ "message": message }] })
            }
        };
        Ok(CommandResponse {
            status: 200,
            body: body.to_string(),
        })
    }
}

#[async_trait]
impl Connector for SimulatedBackend {
    async fn connect(&self, _endpoint: &str) -> Result<Box<dyn FrameChannel>, TransportError> {
        let (outbound, inbound) = mpsc::unbounded_channel();
        let connection = self.inner.connections.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(SimulatedChannel {
            backend: self.clone(),
            connection,
            table: None,
            outbound,
            inbound,
            closed: false,
        }))
    }
}

/// Server end of one simulated subscription connection.
#[derive(Debug)]
pub struct SimulatedChannel {
    backend: SimulatedBackend,
    connection: u64,
    table: Option<TableId>,
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
    closed: bool,
}

impl SimulatedChannel {
    fn push(&self, frame: &Value) { let _ = self.outbound.send(frame.to_string()); }

    async fn start(&self, id: String, payload: &Value) {
        let options = &self.backend.inner.options;
        if !options.subscribe_latency.is_zero() {
            tokio::time::sleep(options.subscribe_latency).await;
        }
        if options.reject_subscriptions {
            self.push(&json!({"type": "error", "id": id, "payload": {"message": "subscription rejected"}}));
            return;
        }
        let field = match payload.get("operationName").and_then(Value::as_str) {
            Some(DEAL_SUBSCRIPTION) => DEAL_FIELD,
            Some(HAND_EVENT_SUBSCRIPTION) => HAND_EVENT_FIELD,
            other => {
                let message = format!("unknown subscription {other:?}");
                self.push(&json!({"type": "error", "id": id, "payload": {"message": message}}));
                return;
            }
        };
        let Some(table) = self.table.clone() else {
            self.push(&json!({"type": "error", "id": id, "payload": {"message": "connection not initialised"}}));
            return;
        };
        log::debug!("connection {} subscribed `{id}` to {field}", self.connection);
        self.backend.inner.subscribers.insert(
            (self.connection, id),
            Subscriber {
                table,
                field,
                outbound: self.outbound.clone(),
            },
        );
    }

    fn drop_subscriptions(&self) {
        let connection = self.connection;
        self.backend
            .inner
            .subscribers
            .retain(|(owner, _), _| *owner != connection);
    }
}

#[async_trait]
impl FrameChannel for SimulatedChannel {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Send("connection closed".into()));
        }
        let frame: Value =
            serde_json::from_str(&text).map_err(|e| TransportError::Send(e.to_string()))?;
        let id = frame.get("id").and_then(Value::as_str).map(str::to_owned);
        let payload = frame.get("payload").unwrap_or(&Value::Null);
        match (frame.get("type").and_then(Value::as_str), id) {
            (Some("connection_init"), _) => {
                self.table = payload.get(TABLE_TOKEN).and_then(Value::as_str).map(TableId::new);
                if self.backend.inner.options.ack_connection {
                    self.push(&json!({"type": "connection_ack"}));
                }
            }
            (Some("start"), Some(id)) => self.start(id, payload).await,
            (Some("stop"), Some(id)) => {
                self.backend.inner.subscribers.remove(&(self.connection, id.clone()));
                self.push(&json!({"type": "complete", "id": id}));
            }
            (Some("connection_terminate"), _) => {
                self.drop_subscriptions();
                self.closed = true;
            }
            (kind, _) => log::warn!("ignoring client frame {kind:?}"),
        }
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<Result<String, TransportError>> {
        if self.closed {
            return None;
        }
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.drop_subscriptions();
        self.closed = true;
        Ok(())
    }
}

impl Drop for SimulatedChannel {
    fn drop(&mut self) { self.drop_subscriptions(); }
}
