//! Runs one scenario step through
//! `Arming → Dispatching → Collecting → Asserting → Done | Failed`.
//!
//! Each observer runs as its own task owning one [`StreamActor`]; the command
//! runs as another task gated on the step's [`Rendezvous`]. Tasks return
//! values and never touch [`ScenarioState`]; the orchestrator applies their
//! results after collection. The first failure cancels every sibling, and
//! every stream actor closes its connection on the way out.

use std::{collections::BTreeMap, fmt, future::Future, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{
    state::ScenarioState,
    step::{FixtureScope, StackSource, Step, StepAction},
};
use crate::{
    command::{CommandActor, CommandReply},
    config::HarnessConfig,
    context::{ActorId, HandId, SessionContext},
    error::{AssertionFailure, HarnessError},
    fixture::{self, Match},
    frame::DataFrame,
    graphql::{self, DEAL_FIELD, DealInput, HAND_EVENT_FIELD, Operation, SeatInput},
    model::{Chips, DealEvent, HandEvent},
    panic::format_panic,
    rendezvous::Rendezvous,
    stream::{NextOptions, StreamActor},
    transport::{CommandTransport, Connector, HttpCommandTransport, WsConnector},
};

/// State machine position of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Arming,
    Dispatching,
    Collecting,
    Asserting,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Arming => "arming",
            Phase::Dispatching => "dispatching",
            Phase::Collecting => "collecting",
            Phase::Asserting => "asserting",
            Phase::Done => "done",
            Phase::Failed => "failed",
        })
    }
}

/// A failed step: where it failed and the root cause.
#[derive(Debug, Error)]
#[error("step `{step}` failed while {phase}: {error}")]
pub struct ScenarioError {
    pub step: String,
    /// Phase the step had reached when the root cause surfaced.
    pub phase: Phase,
    #[source]
    pub error: HarnessError,
}

/// Results of a completed step, fed forward to the next one.
#[derive(Clone, Debug)]
pub struct StepReport {
    pub step: String,
    pub hand: HandId,
    pub reply: CommandReply,
    /// Frames each observer received, in receipt order.
    pub frames: BTreeMap<ActorId, Vec<DataFrame>>,
}

enum Outcome {
    Observed {
        observer: ActorId,
        frames: Vec<DataFrame>,
        surplus: Vec<DataFrame>,
    },
    Commanded(CommandReply),
}

struct Observations {
    frames: Vec<DataFrame>,
    surplus: Vec<DataFrame>,
}

#[derive(Clone)]
struct ObservePlan {
    subscription: Operation,
    frames: usize,
    options: NextOptions,
    silence: Option<Duration>,
    /// Hand whose deals are passed over while waiting for the next one.
    passed_hand: Option<HandId>,
}

struct Armed {
    command: CommandActor,
    operation: Operation,
    observers: Vec<ActorId>,
    plan: ObservePlan,
    ready: Rendezvous,
    dealt_with: BTreeMap<ActorId, Chips>,
}

/// Drives scenario steps against one backend.
#[derive(Clone)]
pub struct Orchestrator {
    config: HarnessConfig,
    connector: Arc<dyn Connector>,
    commands: Arc<dyn CommandTransport>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        config: HarnessConfig,
        connector: Arc<dyn Connector>,
        commands: Arc<dyn CommandTransport>,
    ) -> Self {
        Self {
            config,
            connector,
            commands,
        }
    }

    /// Orchestrator speaking WebSocket and HTTP to the configured endpoints.
    #[must_use]
    pub fn live(config: HarnessConfig) -> Self {
        let connector = Arc::new(WsConnector::new(config.subprotocol()));
        Self::new(config, connector, Arc::new(HttpCommandTransport::default()))
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig { &self.config }

    /// Run `step`, applying its results to `state` on success.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] carrying the phase reached and the first
    /// failure that is not a sibling's cancellation.
    pub async fn run_step(
        &self,
        step: &Step,
        state: &mut ScenarioState,
    ) -> Result<StepReport, ScenarioError> {
        let span = tracing::info_span!("step", step = step.name());
        self.drive(step, state).instrument(span).await
    }

    async fn drive(&self, step: &Step, state: &mut ScenarioState) -> Result<StepReport, ScenarioError> {
        let mut phase = Phase::Arming;
        let fail = |phase: Phase, mut error: HarnessError| {
            if let HarnessError::Assertion(failure) = &mut error
                && failure.step.is_empty()
            {
                failure.step = step.name().to_owned();
            }
            tracing::warn!(step = step.name(), from = %phase, to = %Phase::Failed, %error, "step failed");
            ScenarioError {
                step: step.name().to_owned(),
                phase,
                error,
            }
        };

        let armed = self.arm(step, state).map_err(|e| fail(phase, e))?;
        let Armed {
            command,
            operation,
            observers,
            plan,
            ready,
            dealt_with,
        } = armed;

        enter(&mut phase, Phase::Dispatching);
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for observer in &observers {
            let context = SessionContext::new(observer.clone(), state.table().clone());
            let task = observe(
                Arc::clone(&self.connector),
                self.config.ws_endpoint().to_owned(),
                context,
                plan.clone(),
                ready.clone(),
                cancel.clone(),
            );
            let span = tracing::info_span!("observer", actor = %observer);
            tasks.spawn(guarded(observer.to_string(), task).instrument(span));
        }
        let label = command.context().participant().to_string();
        let task = dispatch(command, operation, self.config.timeouts().command, cancel.clone());
        let span = tracing::info_span!("command", actor = %label);
        tasks.spawn(guarded(label, task).instrument(span));

        let mut root: Option<(Phase, HarnessError)> = None;
        let mut reply = None;
        let mut observed = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(HarnessError::Panicked {
                    actor: "actor task".to_owned(),
                    reason: e.to_string(),
                })
            });
            match result {
                Ok(Outcome::Commanded(r)) => {
                    reply = Some(r);
                    if root.is_none() {
                        enter(&mut phase, Phase::Collecting);
                    }
                }
                Ok(Outcome::Observed {
                    observer,
                    frames,
                    surplus,
                }) => {
                    observed.insert(observer, Observations { frames, surplus });
                }
                Err(error) if root.is_none() && !error.is_cancellation() => {
                    tracing::warn!(%phase, %error, "tearing down sibling actors");
                    cancel.cancel();
                    root = Some((phase, error));
                }
                Err(error) => tracing::debug!(%error, "sibling ended after failure"),
            }
        }
        if let Some((phase, error)) = root {
            return Err(fail(phase, error));
        }
        let Some(reply) = reply else {
            return Err(fail(phase, HarnessError::Script("command produced no reply".into())));
        };

        enter(&mut phase, Phase::Asserting);
        let hand = settle(step, state, &reply, &observed, dealt_with).map_err(|e| fail(phase, e))?;

        enter(&mut phase, Phase::Done);
        tracing::info!(step = step.name(), hand = %hand, observers = observed.len(), "step done");
        Ok(StepReport {
            step: step.name().to_owned(),
            hand,
            reply,
            frames: observed.into_iter().map(|(id, o)| (id, o.frames)).collect(),
        })
    }

    fn arm(&self, step: &Step, state: &ScenarioState) -> Result<Armed, HarnessError> {
        let observers = step
            .observers()
            .map_or_else(|| state.seating().to_vec(), <[ActorId]>::to_vec);
        let table = state.table().clone();
        let mut passed_hand = None;
        let (context, operation, subscription, dealt_with) = match step.action() {
            StepAction::Deal { .. } if step.awaits_next_deal() => {
                return Err(HarnessError::Script(format!(
                    "{}: only an action can wait for the next deal",
                    step.name()
                )));
            }
            StepAction::Deal { button_index, stacks } => {
                if observers.is_empty() {
                    return Err(HarnessError::Script(format!("{}: a deal needs an observer", step.name())));
                }
                let stacks = match stacks {
                    StackSource::Carry => state.seated_stacks(),
                    StackSource::Explicit(stacks) if stacks.len() == state.seating().len() => stacks.clone(),
                    StackSource::Explicit(stacks) => {
                        return Err(HarnessError::Script(format!(
                            "{}: {} stacks for {} seats",
                            step.name(),
                            stacks.len(),
                            state.seating().len()
                        )));
                    }
                };
                let dealt_with: BTreeMap<_, _> = state.seating().iter().cloned().zip(stacks.iter().copied()).collect();
                let players = state
                    .seating()
                    .iter()
                    .zip(stacks)
                    .map(|(id, stack)| SeatInput { id: id.clone(), stack })
                    .collect();
                let input = DealInput::new(table.clone(), *button_index, players);
                (
                    SessionContext::new(ActorId::dealer(), table),
                    graphql::deal_hand(&input),
                    graphql::deal_subscription(),
                    dealt_with,
                )
            }
            StepAction::Play { player, action, amount } => {
                let hand = state
                    .hand()
                    .ok_or_else(|| HarnessError::Script(format!("{}: no hand has been dealt", step.name())))?;
                let subscription = if step.awaits_next_deal() {
                    if observers.is_empty() {
                        return Err(HarnessError::Script(format!("{}: a deal needs an observer", step.name())));
                    }
                    passed_hand = Some(hand.clone());
                    graphql::deal_subscription()
                } else {
                    graphql::hand_event_subscription()
                };
                (
                    SessionContext::new(player.clone(), table).with_hand(hand.clone()),
                    graphql::play_turn(hand, player, *action, *amount),
                    subscription,
                    state.hand_start().clone(),
                )
            }
        };

        let parties = u32::try_from(observers.len())
            .map_err(|_| HarnessError::Script(format!("{}: too many observers", step.name())))?;
        let ready = Rendezvous::new(format!("{}:subscribed", step.name()));
        let timeouts = self.config.timeouts();
        let mut command = CommandActor::new(
            Arc::clone(&self.commands),
            self.config.graphql_endpoint(),
            context,
        );
        if self.config.gate_commands() {
            command = command.gated(ready.clone(), parties, timeouts.rendezvous);
        }
        let plan = ObservePlan {
            options: NextOptions::operation(subscription.name())
                .with_max_ignored(self.config.max_ignored_frames())
                .with_timeout(timeouts.next),
            subscription,
            frames: step.expectations().len().max(1),
            silence: step.check_silence().then_some(timeouts.silence),
            passed_hand,
        };
        tracing::debug!(parties, point = ready.point(), "armed");
        Ok(Armed {
            command,
            operation,
            observers,
            plan,
            ready,
            dealt_with,
        })
    }

    /// Fetch the current hand through an ungated query.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Script`] when no hand was dealt, otherwise the
    /// command's failure.
    pub async fn query_hand(&self, state: &ScenarioState) -> Result<CommandReply, HarnessError> {
        let hand = state
            .hand()
            .ok_or_else(|| HarnessError::Script("no hand has been dealt".into()))?;
        let context = SessionContext::new(ActorId::dealer(), state.table().clone()).with_hand(hand.clone());
        let actor = CommandActor::new(Arc::clone(&self.commands), self.config.graphql_endpoint(), context);
        Ok(actor
            .execute(&graphql::hand_query(hand), self.config.timeouts().command)
            .await?)
    }
}

fn settle(
    step: &Step,
    state: &mut ScenarioState,
    reply: &CommandReply,
    observed: &BTreeMap<ActorId, Observations>,
    dealt_with: BTreeMap<ActorId, Chips>,
) -> Result<HandId, HarnessError> {
    let next_deal = if step.awaits_next_deal() {
        Some(first_deal(observed)?)
    } else {
        None
    };
    let hand = match (step.action(), &next_deal) {
        (_, Some(deal)) => deal.id.clone(),
        (StepAction::Deal { .. }, None) => reply.string_field(DEAL_FIELD).map(HandId::new).ok_or_else(|| {
            HarnessError::Payload {
                actor: ActorId::dealer().to_string(),
                view: "deal reply",
                reason: format!("no `{DEAL_FIELD}` id in {}", reply.data()),
            }
        })?,
        (StepAction::Play { .. }, None) => state
            .hand()
            .cloned()
            .ok_or_else(|| HarnessError::Script(format!("{}: no hand has been dealt", step.name())))?,
    };

    assert_fixtures(step, state, &hand, observed)?;
    assert_agreement(observed)?;

    let Some((first, observations)) = observed.iter().next() else {
        return Ok(hand);
    };
    match (step.action(), next_deal) {
        (_, Some(deal)) => {
            let dealt_with = deal
                .opening_street()
                .map(|street| {
                    street
                        .current_active_players
                        .iter()
                        .map(|seat| (seat.id.clone(), seat.stack + seat.bet))
                        .collect()
                })
                .unwrap_or_default();
            state.begin_hand(deal.deal.button_index, dealt_with, &deal);
        }
        (StepAction::Deal { button_index, .. }, None) => {
            let deal = first_deal(observed)?;
            if deal.id != hand {
                return Err(AssertionFailure {
                    step: String::new(),
                    actor: first.to_string(),
                    path: format!("{DEAL_FIELD}.id"),
                    expected: Some(hand.as_str().into()),
                    actual: Some(deal.id.as_str().into()),
                }
                .into());
            }
            state.begin_hand(*button_index, dealt_with, &deal);
        }
        (StepAction::Play { .. }, None) => {
            for frame in &observations.frames {
                let event: HandEvent = typed(first, "HandEvent", frame, HAND_EVENT_FIELD)?;
                state.apply(&event);
            }
        }
    }
    for (observer, observations) in observed {
        if let Some(last) = observations.frames.last() {
            state.record_seen(observer.clone(), last.data().clone());
        }
    }
    for checkpoint in step.checkpoints() {
        checkpoint.verify(state)?;
        tracing::debug!(?checkpoint, "checkpoint held");
    }
    Ok(hand)
}

/// The deal in the first frame of the first observer.
fn first_deal(observed: &BTreeMap<ActorId, Observations>) -> Result<DealEvent, HarnessError> {
    let Some((observer, observations)) = observed.iter().next() else {
        return Err(HarnessError::Script("no observer saw the deal".into()));
    };
    let frame = observations.frames.first().ok_or_else(|| HarnessError::Payload {
        actor: observer.to_string(),
        view: "DealEvent",
        reason: "no deal frame received".into(),
    })?;
    typed(observer, "DealEvent", frame, DEAL_FIELD)
}

fn deal_id(frame: &DataFrame) -> Option<&str> {
    frame
        .data()
        .get(DEAL_FIELD)
        .and_then(|deal| deal.get("id"))
        .and_then(Value::as_str)
}

fn enter(phase: &mut Phase, next: Phase) {
    tracing::debug!(from = %phase, to = %next, "phase");
    *phase = next;
}

fn typed<T: serde::de::DeserializeOwned>(
    observer: &ActorId,
    view: &'static str,
    frame: &DataFrame,
    field: &str,
) -> Result<T, HarnessError> {
    let value = frame.data().get(field).cloned().unwrap_or_default();
    serde_json::from_value(value).map_err(|e| HarnessError::Payload {
        actor: observer.to_string(),
        view,
        reason: e.to_string(),
    })
}

fn assert_fixtures(
    step: &Step,
    state: &ScenarioState,
    hand: &HandId,
    observed: &BTreeMap<ActorId, Observations>,
) -> Result<(), AssertionFailure> {
    let expectations = step.expectations();
    for (observer, observations) in observed {
        let scope = FixtureScope {
            table: state.table(),
            hand,
            observer,
            state,
        };
        for (index, (expectation, frame)) in expectations.iter().zip(&observations.frames).enumerate() {
            let actor = if expectations.len() > 1 {
                format!("{observer} (frame {})", index + 1)
            } else {
                observer.to_string()
            };
            fixture::assert_matches(&actor, &expectation.resolve(&scope), frame.data(), expectation.mode())?;
        }
        if step.check_silence() && !observations.surplus.is_empty() {
            let received = observations.frames.len() + observations.surplus.len();
            return Err(AssertionFailure {
                step: String::new(),
                actor: observer.to_string(),
                path: "frames".to_owned(),
                expected: Some(observations.frames.len().into()),
                actual: Some(received.into()),
            });
        }
    }
    Ok(())
}

/// Every observer must have seen the same payload for the k-th frame.
fn assert_agreement(observed: &BTreeMap<ActorId, Observations>) -> Result<(), AssertionFailure> {
    let mut entries = observed.iter();
    let Some((reference, baseline)) = entries.next() else {
        return Ok(());
    };
    for (observer, observations) in entries {
        for (want, got) in baseline.frames.iter().zip(&observations.frames) {
            if let Some(mismatch) = fixture::first_difference(want.data(), got.data(), Match::Exact) {
                return Err(mismatch.into_failure(format!("{observer} vs {reference}")));
            }
        }
    }
    Ok(())
}

async fn guarded<F>(actor: String, task: F) -> Result<Outcome, HarnessError>
where
    F: Future<Output = Result<Outcome, HarnessError>> + Send,
{
    match AssertUnwindSafe(task).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let reason = format_panic(panic).to_string();
            tracing::error!(%actor, panic = %reason, "actor task panicked");
            Err(HarnessError::Panicked { actor, reason })
        }
    }
}

async fn observe(
    connector: Arc<dyn Connector>,
    endpoint: String,
    context: SessionContext,
    plan: ObservePlan,
    ready: Rendezvous,
    cancel: CancellationToken,
) -> Result<Outcome, HarnessError> {
    let observer = context.participant().clone();
    let mut slot = None;
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(HarnessError::Cancelled { actor: observer.to_string() }),
        result = collect(&*connector, &endpoint, context, &plan, &ready, &mut slot) => result,
    };
    if let Some(mut actor) = slot
        && let Err(e) = actor.close().await
    {
        tracing::warn!(actor = %observer, error = %e, "stream did not close cleanly");
    }
    result
}

async fn collect(
    connector: &dyn Connector,
    endpoint: &str,
    context: SessionContext,
    plan: &ObservePlan,
    ready: &Rendezvous,
    slot: &mut Option<StreamActor>,
) -> Result<Outcome, HarnessError> {
    let observer = context.participant().clone();
    let actor = slot.insert(StreamActor::connect(connector, endpoint, context).await?);
    actor.initialize().await?;
    actor.subscribe(&plan.subscription, ready).await?;
    let mut frames = Vec::with_capacity(plan.frames);
    for _ in 0..plan.frames {
        let frame = match &plan.passed_hand {
            Some(passed) => {
                actor
                    .next_matching(&plan.options, |frame| {
                        deal_id(frame).is_some_and(|id| id != passed.as_str())
                    })
                    .await?
            }
            None => actor.next_data(&plan.options).await?,
        };
        frames.push(frame);
    }
    let surplus = match plan.silence {
        Some(window) => actor.expect_silence(window).await?,
        None => Vec::new(),
    };
    if !surplus.is_empty() {
        tracing::warn!(actor = %observer, extra = surplus.len(), "surplus frames after expected ones");
    }
    Ok(Outcome::Observed {
        observer,
        frames,
        surplus,
    })
}

async fn dispatch(
    command: CommandActor,
    operation: Operation,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<Outcome, HarnessError> {
    let actor = command.context().participant().to_string();
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(HarnessError::Cancelled { actor }),
        result = command.execute(&operation, timeout) => Ok(Outcome::Commanded(result?)),
    }
}
