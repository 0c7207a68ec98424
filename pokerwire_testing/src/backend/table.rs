//! Betting rules of the simulated backend.
//!
//! Seats are kept in action order: small blind first, then big blind, with
//! the button last. Heads-up the button posts the small blind, so it comes
//! first and the big blind leads after the flop. Bets are chips added by one
//! action; the pot always includes the bets still in front of the seats.

use pokerwire::{
    context::{ActorId, HandId, TableId},
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
use thiserror::Error;

/// Reasons the simulated backend rejects a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("a hand needs at least two players, got {0}")]
    TooFewPlayers(usize),
    #[error("button index {index} is outside a table of {seats}")]
    ButtonOutOfRange { index: usize, seats: usize },
    #[error("hand {0} is already complete")]
    HandComplete(HandId),
    #[error("{0} is not seated in this hand")]
    UnknownPlayer(ActorId),
    #[error("it is {expected}'s turn, not {actual}'s")]
    OutOfTurn { expected: ActorId, actual: ActorId },
    #[error("{player} cannot check facing a bet of {facing}")]
    CannotCheck { player: ActorId, facing: Chips },
    #[error("{player} cannot bet {amount} with {stack} behind")]
    InvalidBet {
        player: ActorId,
        amount: Chips,
        stack: Chips,
    },
    #[error("{player} must put in at least {required} to stay in")]
    BetTooSmall { player: ActorId, required: Chips },
}

/// One dealt hand and its betting state.
#[derive(Clone, Debug)]
pub struct Hand {
    id: HandId,
    table: TableId,
    button_index: usize,
    blinds: (Chips, Chips),
    /// Participants in table order, as dealt.
    seating: Vec<ActorId>,
    seats: Vec<ActivePlayer>,
    acted: Vec<bool>,
    street: StreetType,
    pot: Chips,
    to_act: usize,
    history: Vec<StreetEvent>,
    complete: bool,
}

impl Hand {
    /// Deal a hand, posting both blinds.
    ///
    /// `players` is in table order; the seat after the button posts the
    /// small blind, or the button itself when only two are seated.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] for fewer than two players or a button outside
    /// the table.
    pub fn deal(
        id: HandId,
        table: TableId,
        button_index: usize,
        blinds: (Chips, Chips),
        players: &[(ActorId, Chips)],
    ) -> Result<Self, RuleError> {
        let n = players.len();
        if n < 2 {
            return Err(RuleError::TooFewPlayers(n));
        }
        if button_index >= n {
            return Err(RuleError::ButtonOutOfRange {
                index: button_index,
                seats: n,
            });
        }
        let small_blind = if n == 2 { button_index } else { button_index + 1 };
        let mut seats: Vec<ActivePlayer> = (0..n)
            .map(|k| {
                let (id, stack) = &players[(small_blind + k) % n];
                ActivePlayer::new(id.clone(), 0, stack.get())
            })
            .collect();
        let (small, big) = blinds;
        let mut pot = Chips::ZERO;
        for (seat, blind) in seats.iter_mut().zip([small, big]) {
            let posted = Chips::new(blind.get().min(seat.stack.get()));
            seat.bet = posted;
            seat.stack = Chips::new(seat.stack.get() - posted.get());
            pot = pot + posted;
        }
        seats[1].is_big_blind = true;

        let mut hand = Self {
            id,
            table,
            button_index,
            blinds,
            seating: players.iter().map(|(id, _)| id.clone()).collect(),
            acted: vec![false; n],
            seats,
            street: StreetType::Preflop,
            pot,
            to_act: 2 % n,
            history: Vec::new(),
            complete: false,
        };
        hand.history.push(hand.snapshot());
        Ok(hand)
    }

    #[must_use]
    pub fn id(&self) -> &HandId { &self.id }

    #[must_use]
    pub fn table(&self) -> &TableId { &self.table }

    #[must_use]
    pub fn is_complete(&self) -> bool { self.complete }

    /// Deal the following hand at this table: the button moves one seat and
    /// every participant keeps the stack this hand left them with.
    ///
    /// # Errors
    ///
    /// As for [`deal`](Self::deal).
    pub fn next_deal(&self, id: HandId) -> Result<Self, RuleError> {
        let players: Vec<_> = self
            .seating
            .iter()
            .map(|player| {
                let stack = self
                    .seats
                    .iter()
                    .find(|seat| &seat.id == player)
                    .map_or(Chips::ZERO, |seat| seat.stack);
                (player.clone(), stack)
            })
            .collect();
        let button = (self.button_index + 1) % players.len().max(1);
        Self::deal(id, self.table.clone(), button, self.blinds, &players)
    }

    /// Participant whose action is awaited.
    #[must_use]
    pub fn to_act(&self) -> Option<&ActorId> {
        (!self.complete).then(|| &self.seats[self.to_act].id)
    }

    /// The `CREATED` event announcing the deal.
    #[must_use]
    pub fn created_event(&self) -> DealEvent {
        DealEvent {
            mutation_type: MutationType::Created,
            id: self.id.clone(),
            deal: DealDetail {
                street_events: self.history.iter().take(1).cloned().collect(),
                ..self.detail()
            },
        }
    }

    /// Every street snapshot so far, as the hand query reports it.
    #[must_use]
    pub fn detail(&self) -> DealDetail {
        DealDetail {
            id: self.id.clone(),
            table_id: self.table.clone(),
            button_index: self.button_index,
            street_events: self.history.clone(),
        }
    }

    /// Apply one action and return the events it produced, in push order.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when the action is out of turn or illegal; the
    /// hand is left unchanged in that case.
    pub fn play(
        &mut self,
        player: &ActorId,
        action: PlayerAction,
        amount: Chips,
    ) -> Result<Vec<HandEvent>, RuleError> {
        if self.complete {
            return Err(RuleError::HandComplete(self.id.clone()));
        }
        let idx = self
            .seats
            .iter()
            .position(|seat| &seat.id == player)
            .ok_or_else(|| RuleError::UnknownPlayer(player.clone()))?;
        if idx != self.to_act {
            return Err(RuleError::OutOfTurn {
                expected: self.seats[self.to_act].id.clone(),
                actual: player.clone(),
            });
        }
        let highest = self.highest_bet();
        let street = self.street;
        let added = match action {
            PlayerAction::Fold => {
                self.seats[idx].is_inactive = true;
                Chips::ZERO
            }
            PlayerAction::Check => {
                if self.seats[idx].bet != highest {
                    return Err(RuleError::CannotCheck {
                        player: player.clone(),
                        facing: highest,
                    });
                }
                Chips::ZERO
            }
            PlayerAction::Bet => self.bet(idx, amount, highest)?,
        };
        self.acted[idx] = true;
        if self.seats[idx].bet > highest {
            for (k, acted) in self.acted.iter_mut().enumerate() {
                *acted = k == idx;
            }
        }

        let player_event = PlayerEvent {
            player_id: player.clone(),
            action,
            amount: added,
            street_type: street,
            current_stack: self.seats[idx].stack,
            current_pot: self.pot,
        };
        log::debug!("hand {}: {player} {action:?} {added} on {street:?}", self.id);

        if self.active().count() == 1 {
            let updated = self.updated(player_event);
            return Ok(vec![updated, self.award()]);
        }
        if !self.round_complete() {
            self.to_act = self.next_active(idx);
            return Ok(vec![self.updated(player_event)]);
        }
        self.end_round();
        let updated = self.updated(player_event);
        if self.street == StreetType::Showdown {
            return Ok(vec![updated, self.award()]);
        }
        Ok(vec![updated])
    }

    fn bet(&mut self, idx: usize, amount: Chips, highest: Chips) -> Result<Chips, RuleError> {
        let seat = &mut self.seats[idx];
        if amount == Chips::ZERO || amount > seat.stack {
            return Err(RuleError::InvalidBet {
                player: seat.id.clone(),
                amount,
                stack: seat.stack,
            });
        }
        let all_in = amount == seat.stack;
        if seat.bet + amount < highest && !all_in {
            return Err(RuleError::BetTooSmall {
                player: seat.id.clone(),
                required: Chips::new(highest.get() - seat.bet.get()),
            });
        }
        seat.bet = seat.bet + amount;
        seat.stack = Chips::new(seat.stack.get() - amount.get());
        self.pot = self.pot + amount;
        Ok(amount)
    }

    fn highest_bet(&self) -> Chips {
        self.seats.iter().map(|seat| seat.bet).max().unwrap_or(Chips::ZERO)
    }

    fn active(&self) -> impl Iterator<Item = (usize, &ActivePlayer)> {
        self.seats.iter().enumerate().filter(|(_, seat)| !seat.is_inactive)
    }

    fn next_active(&self, from: usize) -> usize {
        let n = self.seats.len();
        (1..=n)
            .map(|step| (from + step) % n)
            .find(|&k| !self.seats[k].is_inactive)
            .unwrap_or(from)
    }

    fn round_complete(&self) -> bool {
        let highest = self.highest_bet();
        self.active()
            .all(|(k, seat)| self.acted[k] && (seat.bet == highest || seat.stack == Chips::ZERO))
    }

    fn end_round(&mut self) {
        for seat in &mut self.seats {
            seat.bet = Chips::ZERO;
        }
        self.acted.fill(false);
        self.street = self.street.next();
        let n = self.seats.len();
        let lead = usize::from(n == 2);
        let first = (0..n)
            .map(|step| (lead + step) % n)
            .find(|&k| !self.seats[k].is_inactive)
            .unwrap_or(0);
        self.to_act = first;
        self.history.push(self.snapshot());
    }

    /// Pay the pot to the first active seat and close the hand.
    fn award(&mut self) -> HandEvent {
        let winner = self.active().map(|(k, _)| k).next().unwrap_or(0);
        for seat in &mut self.seats {
            seat.bet = Chips::ZERO;
        }
        let seat = &mut self.seats[winner];
        seat.stack = seat.stack + self.pot;
        self.pot = Chips::ZERO;
        self.complete = true;
        let winners = vec![self.seats[winner].id.clone()];
        log::info!("hand {} complete: {} wins", self.id, winners[0]);
        HandEvent {
            mutation_type: MutationType::Completed,
            hand_id: self.id.clone(),
            street_event: self.snapshot(),
            player_event: None,
            cards: None,
            winners,
        }
    }

    fn updated(&self, player_event: PlayerEvent) -> HandEvent {
        HandEvent {
            mutation_type: MutationType::Updated,
            hand_id: self.id.clone(),
            street_event: self.snapshot(),
            player_event: Some(player_event),
            cards: None,
            winners: Vec::new(),
        }
    }

    fn snapshot(&self) -> StreetEvent {
        StreetEvent {
            street_type: self.street,
            current_active_players: self.seats.clone(),
            pot: self.pot,
        }
    }
}
