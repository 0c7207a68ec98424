//! Participant identities and the session context each actor carries.
//!
//! A [`SessionContext`] is fixed when an actor is constructed. It renders
//! into the handshake payload sent on a subscription socket and into the
//! header set attached to every command.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Handshake and header key carrying the participant identity.
pub const USER_TOKEN: &str = "x-user-token";
/// Handshake and header key carrying the table identifier.
pub const TABLE_TOKEN: &str = "x-table-token";
/// Header key carrying the hand identifier for per-action commands.
pub const HAND_TOKEN: &str = "x-hand-token";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str { &self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self { Self(value.to_owned()) }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self { Self(value) }
        }
    };
}

string_id!(
    /// Opaque participant token, used both as a credential and as the key
    /// for picking a participant's view out of a multi-participant event.
    ActorId
);
string_id!(
    /// Shared table (session) identifier.
    TableId
);
string_id!(
    /// Identifier of one dealt hand.
    HandId
);

impl ActorId {
    /// Identity used for table-level commands such as dealing.
    #[must_use]
    pub fn dealer() -> Self { Self::new("dealer") }
}

/// Credentials and correlation keys owned by a single actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    participant: ActorId,
    table: TableId,
    hand: Option<HandId>,
}

impl SessionContext {
    /// Build a context for `participant` seated at `table`.
    #[must_use]
    pub fn new(participant: impl Into<ActorId>, table: impl Into<TableId>) -> Self {
        Self {
            participant: participant.into(),
            table: table.into(),
            hand: None,
        }
    }

    /// Attach the hand a per-action command refers to.
    #[must_use]
    pub fn with_hand(mut self, hand: HandId) -> Self {
        self.hand = Some(hand);
        self
    }

    #[must_use]
    pub fn participant(&self) -> &ActorId { &self.participant }

    #[must_use]
    pub fn table(&self) -> &TableId { &self.table }

    #[must_use]
    pub fn hand(&self) -> Option<&HandId> { self.hand.as_ref() }

    /// Payload of the `connection_init` handshake frame.
    #[must_use]
    pub fn handshake_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert(USER_TOKEN.into(), Value::from(self.participant.as_str()));
        payload.insert(TABLE_TOKEN.into(), Value::from(self.table.as_str()));
        Value::Object(payload)
    }

    /// Header pairs attached to a command issued under this context.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (USER_TOKEN, self.participant.to_string()),
            (TABLE_TOKEN, self.table.to_string()),
        ];
        if let Some(hand) = &self.hand {
            headers.push((HAND_TOKEN, hand.to_string()));
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn handshake_carries_participant_and_table() {
        let ctx = SessionContext::new("player_one", "123");
        assert_eq!(
            ctx.handshake_payload(),
            json!({"x-user-token": "player_one", "x-table-token": "123"})
        );
    }

    #[test]
    fn hand_token_only_present_when_hand_attached() {
        let ctx = SessionContext::new("player_two", "123");
        assert_eq!(ctx.headers().len(), 2);

        let ctx = ctx.with_hand(HandId::new("hand-7"));
        assert!(
            ctx.headers()
                .contains(&(HAND_TOKEN, "hand-7".to_string()))
        );
    }

    #[test]
    fn identifiers_serialize_transparently() {
        let id = ActorId::new("player_three");
        assert_eq!(serde_json::to_value(&id).expect("serialize"), json!("player_three"));
    }
}
