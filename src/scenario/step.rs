//! Declarative step descriptors.
//!
//! A [`Step`] names one mutating action, the participants that observe it,
//! and the frames each observer must receive. Behaviour is driven entirely by
//! the descriptor; no actor carries per-identity logic.

use std::{fmt, sync::Arc};

use serde_json::Value;

use super::{invariants::Checkpoint, state::ScenarioState};
use crate::{
    context::{ActorId, HandId, TableId},
    fixture::Match,
    model::{Chips, PlayerAction},
};

/// Values a fixture may depend on, resolved when the step asserts.
#[derive(Clone, Copy, Debug)]
pub struct FixtureScope<'a> {
    pub table: &'a TableId,
    /// Hand in scope: the one just dealt, or the one being played.
    pub hand: &'a HandId,
    pub observer: &'a ActorId,
    /// State before this step's results were applied.
    pub state: &'a ScenarioState,
}

type FixtureFn = dyn Fn(&FixtureScope<'_>) -> Value + Send + Sync;

/// One expected frame, built lazily from the scope.
#[derive(Clone)]
pub struct Expectation {
    fixture: Arc<FixtureFn>,
    mode: Match,
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation").field("mode", &self.mode).finish_non_exhaustive()
    }
}

impl Expectation {
    /// Frame data must equal the fixture.
    pub fn exact<F>(fixture: F) -> Self
    where
        F: Fn(&FixtureScope<'_>) -> Value + Send + Sync + 'static,
    {
        Self {
            fixture: Arc::new(fixture),
            mode: Match::Exact,
        }
    }

    /// Frame data must contain the fixture.
    pub fn subset<F>(fixture: F) -> Self
    where
        F: Fn(&FixtureScope<'_>) -> Value + Send + Sync + 'static,
    {
        Self {
            fixture: Arc::new(fixture),
            mode: Match::Subset,
        }
    }

    #[must_use]
    pub fn mode(&self) -> Match { self.mode }

    /// Build the expected value for `scope`.
    #[must_use]
    pub fn resolve(&self, scope: &FixtureScope<'_>) -> Value { (self.fixture)(scope) }
}

/// Where a deal takes its starting stacks from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackSource {
    /// Stacks left by the previous hand (or the scenario's starting stacks).
    Carry,
    /// Explicit stacks in seating order.
    Explicit(Vec<Chips>),
}

/// The mutation a step sends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepAction {
    /// Deal a new hand with the button at `button_index` of the seating.
    Deal {
        button_index: usize,
        stacks: StackSource,
    },
    /// One participant acts in the current hand.
    Play {
        player: ActorId,
        action: PlayerAction,
        amount: Chips,
    },
}

/// One arm/dispatch/collect/assert cycle.
#[derive(Clone, Debug)]
pub struct Step {
    name: String,
    action: StepAction,
    observers: Option<Vec<ActorId>>,
    expectations: Vec<Expectation>,
    check_silence: bool,
    next_deal: bool,
    checkpoints: Vec<Checkpoint>,
}

impl Step {
    /// Deal a hand, carrying stacks forward.
    #[must_use]
    pub fn deal(name: impl Into<String>, button_index: usize) -> Self {
        Self::new(
            name,
            StepAction::Deal {
                button_index,
                stacks: StackSource::Carry,
            },
        )
    }

    /// Let `player` act.
    #[must_use]
    pub fn play(name: impl Into<String>, player: &ActorId, action: PlayerAction, amount: u64) -> Self {
        Self::new(
            name,
            StepAction::Play {
                player: player.clone(),
                action,
                amount: Chips::new(amount),
            },
        )
    }

    fn new(name: impl Into<String>, action: StepAction) -> Self {
        Self {
            name: name.into(),
            action,
            observers: None,
            expectations: Vec::new(),
            check_silence: true,
            next_deal: false,
            checkpoints: Vec::new(),
        }
    }

    /// Deal with explicit stacks instead of carried ones.
    #[must_use]
    pub fn with_stacks(mut self, stacks: Vec<Chips>) -> Self {
        if let StepAction::Deal { stacks: source, .. } = &mut self.action {
            *source = StackSource::Explicit(stacks);
        }
        self
    }

    /// Restrict observation to `observers`; by default every seated
    /// participant observes.
    #[must_use]
    pub fn observed_by(mut self, observers: Vec<ActorId>) -> Self {
        self.observers = Some(observers);
        self
    }

    /// Append the next frame every observer must receive.
    #[must_use]
    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }

    /// Do not fail the step when frames beyond the expected ones arrive.
    #[must_use]
    pub fn allow_surplus(mut self) -> Self {
        self.check_silence = false;
        self
    }

    /// Observe the deal the backend pushes on its own once this action ends
    /// the hand, instead of the action's hand events.
    ///
    /// Observers subscribe to deals and pass over replayed deals of the
    /// current hand; the new hand becomes the one in scope.
    #[must_use]
    pub fn then_next_deal(mut self) -> Self {
        self.next_deal = true;
        self
    }

    /// Check `checkpoint` once the step's results were applied.
    #[must_use]
    pub fn check(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoints.push(checkpoint);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn action(&self) -> &StepAction { &self.action }

    #[must_use]
    pub fn observers(&self) -> Option<&[ActorId]> { self.observers.as_deref() }

    #[must_use]
    pub fn expectations(&self) -> &[Expectation] { &self.expectations }

    #[must_use]
    pub fn check_silence(&self) -> bool { self.check_silence }

    #[must_use]
    pub fn awaits_next_deal(&self) -> bool { self.next_deal }

    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] { &self.checkpoints }
}
