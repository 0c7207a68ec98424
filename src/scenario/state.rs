//! Scenario state accumulated between steps.
//!
//! Only the orchestrator mutates this, after a step's actors have returned.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    context::{ActorId, HandId, TableId},
    model::{Chips, DealEvent, HandEvent, MutationType},
};

/// Inspectable snapshot of one scenario run.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioState {
    table: TableId,
    /// Table order; deal button indices refer into this.
    seating: Vec<ActorId>,
    stacks: BTreeMap<ActorId, Chips>,
    hand: Option<HandId>,
    button: Option<usize>,
    hand_start: BTreeMap<ActorId, Chips>,
    /// Action order of the current hand, small blind first.
    order: Vec<ActorId>,
    previous_order: Option<Vec<ActorId>>,
    last_update: Option<HandEvent>,
    completed: Option<HandEvent>,
    last_seen: BTreeMap<ActorId, Value>,
    hands_dealt: usize,
}

impl ScenarioState {
    /// Fresh state with every participant holding `starting_stack`.
    #[must_use]
    pub fn new(table: TableId, seating: Vec<ActorId>, starting_stack: Chips) -> Self {
        let stacks = seating.iter().map(|id| (id.clone(), starting_stack)).collect();
        Self {
            table,
            seating,
            stacks,
            hand: None,
            button: None,
            hand_start: BTreeMap::new(),
            order: Vec::new(),
            previous_order: None,
            last_update: None,
            completed: None,
            last_seen: BTreeMap::new(),
            hands_dealt: 0,
        }
    }

    #[must_use]
    pub fn table(&self) -> &TableId { &self.table }

    #[must_use]
    pub fn seating(&self) -> &[ActorId] { &self.seating }

    /// Last observed stack of every participant.
    #[must_use]
    pub fn stacks(&self) -> &BTreeMap<ActorId, Chips> { &self.stacks }

    #[must_use]
    pub fn stack(&self, participant: &ActorId) -> Option<Chips> { self.stacks.get(participant).copied() }

    /// Stacks in seating order.
    #[must_use]
    pub fn seated_stacks(&self) -> Vec<Chips> {
        self.seating
            .iter()
            .map(|id| self.stacks.get(id).copied().unwrap_or_default())
            .collect()
    }

    #[must_use]
    pub fn hand(&self) -> Option<&HandId> { self.hand.as_ref() }

    #[must_use]
    pub fn button(&self) -> Option<usize> { self.button }

    /// Stacks the current hand was dealt with.
    #[must_use]
    pub fn hand_start(&self) -> &BTreeMap<ActorId, Chips> { &self.hand_start }

    #[must_use]
    pub fn order(&self) -> &[ActorId] { &self.order }

    #[must_use]
    pub fn previous_order(&self) -> Option<&[ActorId]> { self.previous_order.as_deref() }

    /// Last `UPDATED` event of the current hand.
    #[must_use]
    pub fn last_update(&self) -> Option<&HandEvent> { self.last_update.as_ref() }

    /// `COMPLETED` event of the current hand, once it arrived.
    #[must_use]
    pub fn completed(&self) -> Option<&HandEvent> { self.completed.as_ref() }

    /// Last frame data each observer received.
    #[must_use]
    pub fn last_seen(&self) -> &BTreeMap<ActorId, Value> { &self.last_seen }

    #[must_use]
    pub fn hands_dealt(&self) -> usize { self.hands_dealt }

    pub(crate) fn begin_hand(
        &mut self,
        button: usize,
        dealt_with: BTreeMap<ActorId, Chips>,
        deal: &DealEvent,
    ) {
        let order = deal.opening_street().map(|s| s.order()).unwrap_or_default();
        if !self.order.is_empty() {
            self.previous_order = Some(std::mem::replace(&mut self.order, order));
        } else {
            self.order = order;
        }
        self.hand = Some(deal.id.clone());
        self.button = Some(button);
        self.hand_start = dealt_with;
        self.last_update = None;
        self.completed = None;
        self.hands_dealt += 1;
        if let Some(opening) = deal.opening_street() {
            self.absorb_stacks(opening.current_active_players.iter().map(|p| (&p.id, p.stack)));
        }
    }

    pub(crate) fn apply(&mut self, event: &HandEvent) {
        self.absorb_stacks(
            event
                .street_event
                .current_active_players
                .iter()
                .map(|p| (&p.id, p.stack)),
        );
        match event.mutation_type {
            MutationType::Completed => self.completed = Some(event.clone()),
            MutationType::Updated | MutationType::Created => self.last_update = Some(event.clone()),
        }
    }

    pub(crate) fn record_seen(&mut self, observer: ActorId, data: Value) { self.last_seen.insert(observer, data); }

    fn absorb_stacks<'a>(&mut self, seats: impl Iterator<Item = (&'a ActorId, Chips)>) {
        for (id, stack) in seats {
            self.stacks.insert(id.clone(), stack);
        }
    }
}
