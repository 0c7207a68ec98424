//! Operation documents and variable builders.
//!
//! An [`Operation`] is the unit both actors send: stream actors wrap it in a
//! `start` frame, command actors post it as a request body.

use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    context::{ActorId, HandId, TableId},
    frame::StartPayload,
    model::{Chips, PlayerAction},
};

/// Small blind posted in every hand the harness deals.
pub const SMALL_BLIND: Chips = Chips::new(10);
/// Big blind posted in every hand the harness deals.
pub const BIG_BLIND: Chips = Chips::new(20);

/// Response field of the deal subscription and mutation.
pub const DEAL_FIELD: &str = "deal";
/// Response field of the hand-event subscription.
pub const HAND_EVENT_FIELD: &str = "handEvent";
/// Response field of the play-turn mutation.
pub const PLAY_TURN_FIELD: &str = "playTurn";
/// Response field of the hand query.
pub const HAND_FIELD: &str = "hand";

const STREET_EVENT_FIELDS: &str = "streetType currentActivePlayers { id bet stack isInactive isBigBlind } pot";

pub const DEAL_SUBSCRIPTION: &str = "DealSubscription";
pub const HAND_EVENT_SUBSCRIPTION: &str = "HandEventSubscription";
pub const DEAL_MUTATION: &str = "DealHand";
pub const PLAY_TURN_MUTATION: &str = "PlayTurn";
pub const HAND_QUERY: &str = "Hand";

/// A named GraphQL document with its variables.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    name: String,
    document: String,
    variables: Value,
}

impl Operation {
    #[must_use]
    pub fn new(name: impl Into<String>, document: impl Into<String>, variables: Value) -> Self {
        Self {
            name: name.into(),
            document: document.into(),
            variables,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn document(&self) -> &str { &self.document }

    #[must_use]
    pub fn variables(&self) -> &Value { &self.variables }

    /// Body posted to the command endpoint.
    #[must_use]
    pub fn request_body(&self) -> Value {
        json!({
            "operationName": self.name,
            "query": self.document,
            "variables": self.variables,
        })
    }

    /// Payload of the `start` frame registering this operation.
    #[must_use]
    pub fn start_payload(&self) -> StartPayload {
        StartPayload {
            variables: self.variables.clone(),
            extensions: json!({}),
            operation_name: self.name.clone(),
            query: self.document.clone(),
        }
    }
}

/// Subscription to deal events on the caller's table.
#[must_use]
pub fn deal_subscription() -> Operation {
    let document = format!(
        "subscription {DEAL_SUBSCRIPTION} {{ {DEAL_FIELD} {{ mutationType id deal {{ id tableId \
         buttonIndex streetEvents {{ {STREET_EVENT_FIELDS} }} }} }} }}"
    );
    Operation::new(DEAL_SUBSCRIPTION, document, json!({}))
}

/// Subscription to per-action events of the caller's current hand.
#[must_use]
pub fn hand_event_subscription() -> Operation {
    let document = format!(
        "subscription {HAND_EVENT_SUBSCRIPTION} {{ {HAND_EVENT_FIELD} {{ mutationType handId \
         streetEvent {{ {STREET_EVENT_FIELDS} }} playerEvent {{ playerId action amount streetType \
         currentStack currentPot }} cards winners }} }}"
    );
    Operation::new(HAND_EVENT_SUBSCRIPTION, document, json!({}))
}

/// One seat in a deal request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeatInput {
    pub id: ActorId,
    pub stack: Chips,
}

/// Input object of the deal mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealInput {
    pub table_id: TableId,
    pub button_index: usize,
    pub small_blind: Chips,
    pub big_blind: Chips,
    /// Seats in table order; the button index refers into this list.
    pub players: Vec<SeatInput>,
}

impl DealInput {
    /// Deal at `table` with the standard blinds.
    #[must_use]
    pub fn new(table: TableId, button_index: usize, players: Vec<SeatInput>) -> Self {
        Self {
            table_id: table,
            button_index,
            small_blind: SMALL_BLIND,
            big_blind: BIG_BLIND,
            players,
        }
    }
}

/// Mutation dealing a new hand. The response carries the hand id.
#[must_use]
pub fn deal_hand(input: &DealInput) -> Operation {
    let document = format!(
        "mutation {DEAL_MUTATION}($input: DealInput!) {{ {DEAL_FIELD}(input: $input) }}"
    );
    Operation::new(DEAL_MUTATION, document, json!({ "input": input }))
}

/// Mutation applying one participant's action.
#[must_use]
pub fn play_turn(hand: &HandId, player: &ActorId, action: PlayerAction, amount: Chips) -> Operation {
    let document = format!(
        "mutation {PLAY_TURN_MUTATION}($id: ID!, $playerId: ID!, $action: PlayerAction!, \
         $amount: Decimal!) {{ {PLAY_TURN_FIELD}(id: $id, playerId: $playerId, action: $action, \
         amount: $amount) }}"
    );
    Operation::new(
        PLAY_TURN_MUTATION,
        document,
        json!({
            "id": hand,
            "playerId": player,
            "action": action,
            "amount": amount,
        }),
    )
}

/// Query returning the current state of a hand.
#[must_use]
pub fn hand_query(hand: &HandId) -> Operation {
    let document = format!(
        "query {HAND_QUERY}($id: ID!) {{ {HAND_FIELD}(id: $id) {{ id tableId buttonIndex \
         streetEvents {{ {STREET_EVENT_FIELDS} }} }} }}"
    );
    Operation::new(HAND_QUERY, document, json!({ "id": hand }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_turn_variables_use_wire_spellings() {
        let op = play_turn(
            &HandId::new("h1"),
            &ActorId::new("player_three"),
            PlayerAction::Fold,
            Chips::ZERO,
        );
        assert_eq!(
            op.variables(),
            &json!({"id": "h1", "playerId": "player_three", "action": "Fold", "amount": "0"})
        );
        assert!(op.document().starts_with("mutation PlayTurn("));
    }

    #[test]
    fn deal_input_is_camel_cased_with_string_amounts() {
        let input = DealInput::new(
            TableId::new("123"),
            2,
            vec![SeatInput {
                id: ActorId::new("a"),
                stack: Chips::new(1000),
            }],
        );
        let op = deal_hand(&input);
        assert_eq!(
            op.variables(),
            &json!({"input": {
                "tableId": "123",
                "buttonIndex": 2,
                "smallBlind": "10",
                "bigBlind": "20",
                "players": [{"id": "a", "stack": "1000"}],
            }})
        );
    }

    #[test]
    fn start_payload_carries_name_and_document() {
        let op = hand_event_subscription();
        let payload = op.start_payload();
        assert_eq!(payload.operation_name, HAND_EVENT_SUBSCRIPTION);
        assert_eq!(payload.extensions, json!({}));
        assert!(payload.query.contains("playerEvent"));
    }
}
