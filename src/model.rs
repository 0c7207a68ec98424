//! Typed views over hand and deal payloads.
//!
//! Fixtures are compared structurally as JSON; these types exist for the
//! derived per-participant views the orchestrator feeds forward (stacks,
//! ordering, winners) and for building fixtures without hand-written maps.
//! Enum spellings are exactly those of the backend contract. Nothing here
//! normalises casing, so a payload spelled differently fails to decode.

use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;

use crate::context::{ActorId, HandId, TableId};

/// Chip amount, carried on the wire as a decimal string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Chips(u64);

impl Chips {
    pub const ZERO: Chips = Chips(0);

    #[must_use]
    pub const fn new(amount: u64) -> Self { Self(amount) }

    #[must_use]
    pub const fn get(self) -> u64 { self.0 }

    #[must_use]
    pub fn checked_sub(self, other: Chips) -> Option<Chips> { self.0.checked_sub(other.0).map(Chips) }
}

impl fmt::Display for Chips {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl From<u64> for Chips {
    fn from(amount: u64) -> Self { Self(amount) }
}

impl std::ops::Add for Chips {
    type Output = Chips;

    fn add(self, rhs: Chips) -> Chips { Chips(self.0 + rhs.0) }
}

impl std::iter::Sum for Chips {
    fn sum<I: Iterator<Item = Chips>>(iter: I) -> Chips { Chips(iter.map(Chips::get).sum()) }
}

impl FromStr for Chips {
    type Err = ParseIntError;

    /// Accepts integral decimals, including a zero fraction such as `"1000.0"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let integral = match s.split_once('.') {
            Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole,
            _ => s,
        };
        integral.parse().map(Chips)
    }
}

impl Serialize for Chips {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Chips {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ChipsVisitor;

        impl de::Visitor<'_> for ChipsVisitor {
            type Value = Chips;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integral chip amount")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Chips, E> {
                v.parse().map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Chips, E> { Ok(Chips(v)) }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Chips, E> {
                u64::try_from(v)
                    .map(Chips)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            #[expect(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "only integral, non-negative floats are accepted"
            )]
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Chips, E> {
                if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
                    Ok(Chips(v as u64))
                } else {
                    Err(E::invalid_value(de::Unexpected::Float(v), &self))
                }
            }
        }

        deserializer.deserialize_any(ChipsVisitor)
    }
}

/// Betting round of a hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreetType {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl StreetType {
    /// The street that follows this one.
    #[must_use]
    pub fn next(self) -> StreetType {
        match self {
            StreetType::Preflop => StreetType::Flop,
            StreetType::Flop => StreetType::Turn,
            StreetType::Turn => StreetType::River,
            StreetType::River | StreetType::Showdown => StreetType::Showdown,
        }
    }
}

/// Action a participant takes on their turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerAction {
    Fold,
    Check,
    Bet,
}

/// Kind of change a pushed event reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationType {
    Created,
    Updated,
    Completed,
}

/// One participant's seat as seen in a street event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePlayer {
    pub id: ActorId,
    pub bet: Chips,
    pub stack: Chips,
    pub is_inactive: bool,
    pub is_big_blind: bool,
}

impl ActivePlayer {
    /// Seat with a bet in front and the remaining stack.
    #[must_use]
    pub fn new(id: impl Into<ActorId>, bet: u64, stack: u64) -> Self {
        Self {
            id: id.into(),
            bet: Chips(bet),
            stack: Chips(stack),
            is_inactive: false,
            is_big_blind: false,
        }
    }

    /// Mark the seat as folded.
    #[must_use]
    pub fn folded(mut self) -> Self {
        self.is_inactive = true;
        self
    }

    /// Mark the seat as the big blind.
    #[must_use]
    pub fn big_blind(mut self) -> Self {
        self.is_big_blind = true;
        self
    }
}

/// State of the current street.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreetEvent {
    pub street_type: StreetType,
    /// Seats in action order, starting at the small blind.
    pub current_active_players: Vec<ActivePlayer>,
    pub pot: Chips,
}

impl StreetEvent {
    /// The seat belonging to `participant`.
    #[must_use]
    pub fn seat(&self, participant: &ActorId) -> Option<&ActivePlayer> {
        self.current_active_players
            .iter()
            .find(|player| &player.id == participant)
    }

    /// Participant ordering of this street.
    #[must_use]
    pub fn order(&self) -> Vec<ActorId> {
        self.current_active_players
            .iter()
            .map(|player| player.id.clone())
            .collect()
    }

    /// Sum of all stacks, excluding chips in the pot.
    #[must_use]
    pub fn total_stacks(&self) -> Chips {
        self.current_active_players
            .iter()
            .map(|player| player.stack)
            .sum()
    }
}

/// The action that produced an update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEvent {
    pub player_id: ActorId,
    pub action: PlayerAction,
    pub amount: Chips,
    pub street_type: StreetType,
    pub current_stack: Chips,
    pub current_pot: Chips,
}

/// Payload of the `handEvent` subscription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandEvent {
    pub mutation_type: MutationType,
    pub hand_id: HandId,
    pub street_event: StreetEvent,
    pub player_event: Option<PlayerEvent>,
    pub cards: Option<Value>,
    #[serde(default)]
    pub winners: Vec<ActorId>,
}

/// Hand details carried by a deal event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDetail {
    pub id: HandId,
    pub table_id: TableId,
    pub button_index: usize,
    pub street_events: Vec<StreetEvent>,
}

/// Payload of the `deal` subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealEvent {
    pub mutation_type: MutationType,
    pub id: HandId,
    pub deal: DealDetail,
}

impl DealEvent {
    /// The opening street of the dealt hand.
    #[must_use]
    pub fn opening_street(&self) -> Option<&StreetEvent> { self.deal.street_events.first() }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(json!("990"), 990)]
    #[case(json!("1000.0"), 1000)]
    #[case(json!(1000), 1000)]
    #[case(json!(1000.0), 1000)]
    fn chips_accept_wire_spellings(#[case] raw: Value, #[case] expected: u64) {
        let chips: Chips = serde_json::from_value(raw).expect("decode chips");
        assert_eq!(chips, Chips::new(expected));
    }

    #[rstest]
    #[case(json!("-5"))]
    #[case(json!("10.5"))]
    #[case(json!(-1))]
    fn chips_reject_fractions_and_negatives(#[case] raw: Value) {
        assert!(serde_json::from_value::<Chips>(raw).is_err());
    }

    #[test]
    fn chips_serialize_as_strings() {
        assert_eq!(serde_json::to_value(Chips::new(30)).expect("encode"), json!("30"));
    }

    #[test]
    fn enum_spellings_are_not_normalised() {
        assert!(serde_json::from_value::<PlayerAction>(json!("Fold")).is_ok());
        assert!(serde_json::from_value::<PlayerAction>(json!("FOLD")).is_err());
        assert!(serde_json::from_value::<StreetType>(json!("PREFLOP")).is_err());
        assert_eq!(
            serde_json::to_value(MutationType::Updated).expect("encode"),
            json!("UPDATED")
        );
    }

    #[test]
    fn street_views_pick_seats_by_identity() {
        let street = StreetEvent {
            street_type: StreetType::Preflop,
            current_active_players: vec![
                ActivePlayer::new("a", 10, 990),
                ActivePlayer::new("b", 20, 980).big_blind(),
                ActivePlayer::new("c", 0, 1000),
            ],
            pot: Chips::new(30),
        };
        let b = ActorId::new("b");
        assert_eq!(street.seat(&b).map(|seat| seat.stack), Some(Chips::new(980)));
        assert_eq!(street.total_stacks(), Chips::new(2970));
        assert_eq!(street.order(), vec!["a".into(), "b".into(), ActorId::new("c")]);
    }
}
