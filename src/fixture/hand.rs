//! Factories for expected hand and deal payloads.
//!
//! Each call builds a fresh value from explicit parameters; there is no
//! shared fixture state between scenario runs. The returned values are the
//! `data` object of a data frame, keyed by the subscription's response field.

use serde_json::{Value, json};

use crate::{
    context::{ActorId, HandId, TableId},
    graphql::{DEAL_FIELD, HAND_EVENT_FIELD},
    model::{
        ActivePlayer,
        Chips,
        DealDetail,
        DealEvent,
        HandEvent,
        MutationType,
        PlayerAction,
        PlayerEvent,
        StreetEvent,
        StreetType,
    },
};

/// Seat with `bet` in front and `stack` behind.
#[must_use]
pub fn seat(id: &ActorId, bet: u64, stack: u64) -> ActivePlayer { ActivePlayer::new(id.clone(), bet, stack) }

/// Street snapshot with seats in action order.
#[must_use]
pub fn street(street_type: StreetType, seats: Vec<ActivePlayer>, pot: u64) -> StreetEvent {
    StreetEvent {
        street_type,
        current_active_players: seats,
        pot: Chips::new(pot),
    }
}

/// The action a participant took, with their stack and the pot afterwards.
#[must_use]
pub fn action(
    player: &ActorId,
    action: PlayerAction,
    amount: u64,
    street_type: StreetType,
    current_stack: u64,
    current_pot: u64,
) -> PlayerEvent {
    PlayerEvent {
        player_id: player.clone(),
        action,
        amount: Chips::new(amount),
        street_type,
        current_stack: Chips::new(current_stack),
        current_pot: Chips::new(current_pot),
    }
}

/// Hand event pushed after one action.
#[must_use]
pub fn updated_event(hand: &HandId, street_event: StreetEvent, player_event: PlayerEvent) -> HandEvent {
    HandEvent {
        mutation_type: MutationType::Updated,
        hand_id: hand.clone(),
        street_event,
        player_event: Some(player_event),
        cards: None,
        winners: Vec::new(),
    }
}

/// Hand event pushed once the pot was awarded.
#[must_use]
pub fn completed_event(hand: &HandId, street_event: StreetEvent, winners: &[ActorId]) -> HandEvent {
    HandEvent {
        mutation_type: MutationType::Completed,
        hand_id: hand.clone(),
        street_event,
        player_event: None,
        cards: None,
        winners: winners.to_vec(),
    }
}

/// Deal event pushed when a hand is dealt.
#[must_use]
pub fn dealt_event(hand: &HandId, table: &TableId, button_index: usize, opening: StreetEvent) -> DealEvent {
    DealEvent {
        mutation_type: MutationType::Created,
        id: hand.clone(),
        deal: DealDetail {
            id: hand.clone(),
            table_id: table.clone(),
            button_index,
            street_events: vec![opening],
        },
    }
}

/// `data` object of a hand-event frame.
#[must_use]
pub fn hand_data(event: &HandEvent) -> Value { json!({ HAND_EVENT_FIELD: event }) }

/// `data` object of a deal frame.
#[must_use]
pub fn deal_data(event: &DealEvent) -> Value { json!({ DEAL_FIELD: event }) }

/// Expected `UPDATED` frame data.
#[must_use]
pub fn updated(hand: &HandId, street_event: StreetEvent, player_event: PlayerEvent) -> Value {
    hand_data(&updated_event(hand, street_event, player_event))
}

/// Expected `COMPLETED` frame data.
#[must_use]
pub fn completed(hand: &HandId, street_event: StreetEvent, winners: &[ActorId]) -> Value {
    hand_data(&completed_event(hand, street_event, winners))
}

/// Expected `CREATED` deal frame data.
#[must_use]
pub fn dealt(hand: &HandId, table: &TableId, button_index: usize, opening: StreetEvent) -> Value {
    deal_data(&dealt_event(hand, table, button_index, opening))
}

/// Expected data for a step matched in [`Match::Subset`](super::Match::Subset)
/// mode: only mutation type, street, pot and the acting player are pinned.
#[must_use]
pub fn progress(
    mutation_type: MutationType,
    street_type: StreetType,
    pot: u64,
    player: Option<(&ActorId, PlayerAction)>,
) -> Value {
    let mut event = json!({
        "mutationType": mutation_type,
        "streetEvent": { "streetType": street_type, "pot": Chips::new(pot) },
    });
    if let (Some((player, action)), Some(map)) = (player, event.as_object_mut()) {
        map.insert(
            "playerEvent".into(),
            json!({ "playerId": player, "action": action }),
        );
    }
    json!({ HAND_EVENT_FIELD: event })
}
