//! Cross-step invariants checked between hands.

use serde_json::Value;

use super::state::ScenarioState;
use crate::{
    context::ActorId,
    error::AssertionFailure,
    model::{Chips, HandEvent},
};

const SCENARIO: &str = "scenario";

/// An invariant a step asks the orchestrator to verify after it completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Checkpoint {
    /// Chips at hand completion equal chips at the deal.
    StacksConserved,
    /// The new hand's ordering is the previous one rotated by one seat.
    RolesRotated,
    /// Winners gained the pot of the last update; nobody else moved.
    PotAwarded,
}

impl Checkpoint {
    /// Check this invariant against `state`.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionFailure`] describing the violated quantity.
    pub fn verify(self, state: &ScenarioState) -> Result<(), AssertionFailure> {
        match self {
            Checkpoint::StacksConserved => {
                let completed = require(state.completed(), "completed hand event")?;
                check_conservation(state.hand_start().values().copied(), completed)
            }
            Checkpoint::RolesRotated => match state.previous_order() {
                Some(previous) => check_rotation(previous, state.order()),
                None => Ok(()),
            },
            Checkpoint::PotAwarded => {
                let update = require(state.last_update(), "hand update before completion")?;
                let completed = require(state.completed(), "completed hand event")?;
                check_award(update, completed)
            }
        }
    }
}

fn require<'a, T>(value: Option<&'a T>, what: &str) -> Result<&'a T, AssertionFailure> {
    value.ok_or_else(|| AssertionFailure {
        step: String::new(),
        actor: SCENARIO.to_owned(),
        path: what.to_owned(),
        expected: Some(Value::from("present")),
        actual: None,
    })
}

fn chips(amount: Chips) -> Option<Value> { Some(Value::from(amount.to_string())) }

/// Sum of stacks and pot at completion must equal the sum dealt with.
///
/// # Errors
///
/// Returns [`AssertionFailure`] on path `stacks.total`.
pub fn check_conservation(
    dealt_with: impl IntoIterator<Item = Chips>,
    completed: &HandEvent,
) -> Result<(), AssertionFailure> {
    let before: Chips = dealt_with.into_iter().sum();
    let street = &completed.street_event;
    let after = street.total_stacks() + street.pot;
    if before == after {
        return Ok(());
    }
    Err(AssertionFailure {
        step: String::new(),
        actor: SCENARIO.to_owned(),
        path: "stacks.total".to_owned(),
        expected: chips(before),
        actual: chips(after),
    })
}

/// `next` must equal `previous` rotated left by one position.
///
/// # Errors
///
/// Returns [`AssertionFailure`] on path `order`.
pub fn check_rotation(previous: &[ActorId], next: &[ActorId]) -> Result<(), AssertionFailure> {
    let mut expected = previous.to_vec();
    if !expected.is_empty() {
        expected.rotate_left(1);
    }
    if expected == next {
        return Ok(());
    }
    let render = |ids: &[ActorId]| Value::from(ids.iter().map(ActorId::as_str).collect::<Vec<_>>());
    Err(AssertionFailure {
        step: String::new(),
        actor: SCENARIO.to_owned(),
        path: "order".to_owned(),
        expected: Some(render(&expected)),
        actual: Some(render(next)),
    })
}

/// Winners' stacks grow by an even share of the last update's pot, the first
/// winner in action order taking any odd chips. Other stacks are unchanged.
///
/// # Errors
///
/// Returns [`AssertionFailure`] on path `stacks.<participant>`.
pub fn check_award(update: &HandEvent, completed: &HandEvent) -> Result<(), AssertionFailure> {
    let pot = update.street_event.pot.get();
    let winners = &completed.winners;
    let share = u64::try_from(winners.len())
        .ok()
        .filter(|n| *n > 0)
        .map_or(0, |n| pot / n);
    let odd = pot - share * u64::try_from(winners.len()).unwrap_or(0);
    let first_winner = update
        .street_event
        .current_active_players
        .iter()
        .find(|seat| winners.contains(&seat.id))
        .map(|seat| &seat.id);

    for seat in &update.street_event.current_active_players {
        let mut expected = seat.stack.get();
        if winners.contains(&seat.id) {
            expected += share;
            if Some(&seat.id) == first_winner {
                expected += odd;
            }
        }
        let actual = completed.street_event.seat(&seat.id).map(|s| s.stack);
        if actual != Some(Chips::new(expected)) {
            return Err(AssertionFailure {
                step: String::new(),
                actor: SCENARIO.to_owned(),
                path: format!("stacks.{}", seat.id),
                expected: chips(Chips::new(expected)),
                actual: actual.and_then(chips),
            });
        }
    }
    Ok(())
}
