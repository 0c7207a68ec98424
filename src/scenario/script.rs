//! Scenario scripts: ordered steps sharing one [`ScenarioState`].

use super::{
    invariants::Checkpoint,
    orchestrator::{Orchestrator, ScenarioError, StepReport},
    state::ScenarioState,
    step::{Expectation, Step},
};
use crate::{
    context::{ActorId, TableId},
    fixture::hand::{action, completed, dealt, progress, seat, street, updated},
    model::{Chips, MutationType, PlayerAction, StreetType},
};

/// Stack every participant starts a scripted scenario with.
pub const STARTING_STACK: Chips = Chips::new(1000);

/// A named sequence of steps.
#[derive(Clone, Debug)]
pub struct Script {
    name: String,
    initial: ScenarioState,
    steps: Vec<Step>,
}

/// Outcome of a passing script.
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub name: String,
    pub steps: Vec<StepReport>,
    /// State after the last step.
    pub state: ScenarioState,
}

impl Script {
    /// Empty script for `seating` at `table`.
    #[must_use]
    pub fn new(name: impl Into<String>, table: TableId, seating: Vec<ActorId>, starting_stack: Chips) -> Self {
        Self {
            name: name.into(),
            initial: ScenarioState::new(table, seating, starting_stack),
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn steps(&self) -> &[Step] { &self.steps }

    /// A fresh copy of the state the script starts from.
    #[must_use]
    pub fn initial_state(&self) -> ScenarioState { self.initial.clone() }

    /// Run every step in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the failing step's [`ScenarioError`].
    pub async fn run(&self, orchestrator: &Orchestrator) -> Result<ScenarioReport, ScenarioError> {
        let mut state = self.initial_state();
        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            steps.push(orchestrator.run_step(step, &mut state).await?);
        }
        tracing::info!(scenario = %self.name, steps = steps.len(), "scenario passed");
        Ok(ScenarioReport {
            name: self.name.clone(),
            steps,
            state,
        })
    }
}

/// Three hands at a three-seat table, each participant starting on 1000.
///
/// 1. Button on the third seat. The third then first participant fold; the
///    second (big blind) takes the 30 pot.
/// 2. Button on the first seat. The first then second participant fold; the
///    third takes the pot.
/// 3. Button on the second seat. Everyone puts in 20 and checks down to a
///    showdown the third participant (small blind) wins.
///
/// Every deal checks that roles rotated by one seat; every completion checks
/// the pot award and chip conservation.
#[must_use]
pub fn three_player_hands(players: [ActorId; 3], table: TableId) -> Script {
    let [a, b, c] = players;
    let seating = vec![a.clone(), b.clone(), c.clone()];
    let mut script = Script::new("three player hands", table, seating, STARTING_STACK);
    for step in fold_out_hand(1, 2, [&a, &b, &c]) {
        script = script.step(step);
    }
    for step in fold_out_hand(2, 0, [&b, &c, &a]) {
        script = script.step(step);
    }
    for step in showdown_hand(3, 1, [&c, &a, &b]) {
        script = script.step(step);
    }
    script
}

/// `order` is small blind, big blind, button. The button folds, then the
/// small blind; the big blind wins the blinds.
fn fold_out_hand(number: usize, button_index: usize, order: [&ActorId; 3]) -> Vec<Step> {
    let [sb, bb, btn] = order.map(Clone::clone);

    let (sb_deal, bb_deal, btn_deal) = (sb.clone(), bb.clone(), btn.clone());
    let deal = Step::deal(format!("hand {number}: deal"), button_index)
        .expect(Expectation::exact(move |scope| {
            let stack = |id: &ActorId| scope.state.stack(id).map_or(0, Chips::get);
            dealt(
                scope.hand,
                scope.table,
                button_index,
                street(
                    StreetType::Preflop,
                    vec![
                        seat(&sb_deal, 10, stack(&sb_deal).saturating_sub(10)),
                        seat(&bb_deal, 20, stack(&bb_deal).saturating_sub(20)).big_blind(),
                        seat(&btn_deal, 0, stack(&btn_deal)),
                    ],
                    30,
                ),
            )
        }))
        .check(Checkpoint::RolesRotated);

    let (sb1, bb1, btn1) = (sb.clone(), bb.clone(), btn.clone());
    let button_folds = Step::play(format!("hand {number}: {btn} folds"), &btn, PlayerAction::Fold, 0).expect(
        Expectation::exact(move |scope| {
            let stack = |id: &ActorId| scope.state.stack(id).map_or(0, Chips::get);
            updated(
                scope.hand,
                street(
                    StreetType::Preflop,
                    vec![
                        seat(&sb1, 10, stack(&sb1)),
                        seat(&bb1, 20, stack(&bb1)).big_blind(),
                        seat(&btn1, 0, stack(&btn1)).folded(),
                    ],
                    30,
                ),
                action(&btn1, PlayerAction::Fold, 0, StreetType::Preflop, stack(&btn1), 30),
            )
        }),
    );

    let (sb2, bb2, btn2) = (sb.clone(), bb.clone(), btn.clone());
    let (sb3, bb3, btn3) = (sb.clone(), bb.clone(), btn);
    let small_blind_folds = Step::play(format!("hand {number}: {sb} folds"), &sb, PlayerAction::Fold, 0)
        .expect(Expectation::exact(move |scope| {
            let stack = |id: &ActorId| scope.state.stack(id).map_or(0, Chips::get);
            updated(
                scope.hand,
                street(
                    StreetType::Preflop,
                    vec![
                        seat(&sb2, 10, stack(&sb2)).folded(),
                        seat(&bb2, 20, stack(&bb2)).big_blind(),
                        seat(&btn2, 0, stack(&btn2)).folded(),
                    ],
                    30,
                ),
                action(&sb2, PlayerAction::Fold, 0, StreetType::Preflop, stack(&sb2), 30),
            )
        }))
        .expect(Expectation::exact(move |scope| {
            let stack = |id: &ActorId| scope.state.stack(id).map_or(0, Chips::get);
            completed(
                scope.hand,
                street(
                    StreetType::Preflop,
                    vec![
                        seat(&sb3, 0, stack(&sb3)).folded(),
                        seat(&bb3, 0, stack(&bb3).saturating_add(30)).big_blind(),
                        seat(&btn3, 0, stack(&btn3)).folded(),
                    ],
                    0,
                ),
                std::slice::from_ref(&bb3),
            )
        }))
        .check(Checkpoint::PotAwarded)
        .check(Checkpoint::StacksConserved);

    vec![deal, button_folds, small_blind_folds]
}

/// `order` is small blind, big blind, button. The button bets 20, the small
/// blind completes, the big blind checks, then three checked streets lead to
/// a showdown won by the first active seat.
fn showdown_hand(number: usize, button_index: usize, order: [&ActorId; 3]) -> Vec<Step> {
    let [sb, bb, btn] = order.map(Clone::clone);
    let mut steps = Vec::new();

    let (sb_deal, bb_deal, btn_deal) = (sb.clone(), bb.clone(), btn.clone());
    steps.push(
        Step::deal(format!("hand {number}: deal"), button_index)
            .expect(Expectation::exact(move |scope| {
                let stack = |id: &ActorId| scope.state.stack(id).map_or(0, Chips::get);
                dealt(
                    scope.hand,
                    scope.table,
                    button_index,
                    street(
                        StreetType::Preflop,
                        vec![
                            seat(&sb_deal, 10, stack(&sb_deal).saturating_sub(10)),
                            seat(&bb_deal, 20, stack(&bb_deal).saturating_sub(20)).big_blind(),
                            seat(&btn_deal, 0, stack(&btn_deal)),
                        ],
                        30,
                    ),
                )
            }))
            .check(Checkpoint::RolesRotated),
    );

    let (sb1, bb1, btn1) = (sb.clone(), bb.clone(), btn.clone());
    steps.push(
        Step::play(format!("hand {number}: {btn} bets 20"), &btn, PlayerAction::Bet, 20).expect(
            Expectation::exact(move |scope| {
                let stack = |id: &ActorId| scope.state.stack(id).map_or(0, Chips::get);
                let after = stack(&btn1).saturating_sub(20);
                updated(
                    scope.hand,
                    street(
                        StreetType::Preflop,
                        vec![
                            seat(&sb1, 10, stack(&sb1)),
                            seat(&bb1, 20, stack(&bb1)).big_blind(),
                            seat(&btn1, 20, after),
                        ],
                        50,
                    ),
                    action(&btn1, PlayerAction::Bet, 20, StreetType::Preflop, after, 50),
                )
            }),
        ),
    );

    let (sb2, bb2, btn2) = (sb.clone(), bb.clone(), btn.clone());
    steps.push(
        Step::play(format!("hand {number}: {sb} completes"), &sb, PlayerAction::Bet, 10).expect(
            Expectation::exact(move |scope| {
                let stack = |id: &ActorId| scope.state.stack(id).map_or(0, Chips::get);
                let after = stack(&sb2).saturating_sub(10);
                updated(
                    scope.hand,
                    street(
                        StreetType::Preflop,
                        vec![
                            seat(&sb2, 20, after),
                            seat(&bb2, 20, stack(&bb2)).big_blind(),
                            seat(&btn2, 20, stack(&btn2)),
                        ],
                        60,
                    ),
                    action(&sb2, PlayerAction::Bet, 10, StreetType::Preflop, after, 60),
                )
            }),
        ),
    );

    let (sb3, bb3, btn3) = (sb.clone(), bb.clone(), btn.clone());
    steps.push(
        Step::play(format!("hand {number}: {bb} checks preflop"), &bb, PlayerAction::Check, 0).expect(
            Expectation::exact(move |scope| {
                let stack = |id: &ActorId| scope.state.stack(id).map_or(0, Chips::get);
                updated(
                    scope.hand,
                    street(
                        StreetType::Flop,
                        vec![
                            seat(&sb3, 0, stack(&sb3)),
                            seat(&bb3, 0, stack(&bb3)).big_blind(),
                            seat(&btn3, 0, stack(&btn3)),
                        ],
                        60,
                    ),
                    action(&bb3, PlayerAction::Check, 0, StreetType::Preflop, stack(&bb3), 60),
                )
            }),
        ),
    );

    for street_type in [StreetType::Flop, StreetType::Turn] {
        for (position, player) in [&sb, &bb, &btn].into_iter().enumerate() {
            let shown = if position == 2 { street_type.next() } else { street_type };
            let acting = player.clone();
            steps.push(
                Step::play(
                    format!("hand {number}: {player} checks the {street_type:?}"),
                    player,
                    PlayerAction::Check,
                    0,
                )
                .expect(Expectation::subset(move |_| {
                    progress(MutationType::Updated, shown, 60, Some((&acting, PlayerAction::Check)))
                })),
            );
        }
    }

    for player in [&sb, &bb] {
        let acting = player.clone();
        steps.push(
            Step::play(format!("hand {number}: {player} checks the River"), player, PlayerAction::Check, 0).expect(
                Expectation::subset(move |_| {
                    progress(MutationType::Updated, StreetType::River, 60, Some((&acting, PlayerAction::Check)))
                }),
            ),
        );
    }

    let (sb4, bb4, btn4) = (sb.clone(), bb.clone(), btn.clone());
    steps.push(
        Step::play(format!("hand {number}: {btn} checks to showdown"), &btn, PlayerAction::Check, 0)
            .expect(Expectation::subset({
                let acting = btn.clone();
                move |_| progress(MutationType::Updated, StreetType::Showdown, 60, Some((&acting, PlayerAction::Check)))
            }))
            .expect(Expectation::exact(move |scope| {
                let stack = |id: &ActorId| scope.state.stack(id).map_or(0, Chips::get);
                completed(
                    scope.hand,
                    street(
                        StreetType::Showdown,
                        vec![
                            seat(&sb4, 0, stack(&sb4).saturating_add(60)),
                            seat(&bb4, 0, stack(&bb4)).big_blind(),
                            seat(&btn4, 0, stack(&btn4)),
                        ],
                        0,
                    ),
                    std::slice::from_ref(&sb4),
                )
            }))
            .check(Checkpoint::PotAwarded)
            .check(Checkpoint::StacksConserved),
    );
    steps
}
