use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::state::session::{Card, DeckId, GameSession, Judgement, PlayedCard, SessionPhase};

/// Actions that can be applied to the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// A player picked a deck from the catalog.
    Select {
        /// Player binding the session.
        player_id: String,
        /// Deck chosen by the player.
        deck_id: DeckId,
    },
    /// Abort the running session. When a player is given, only that player may cancel.
    Cancel {
        /// Player asking for the cancellation, if known.
        player_id: Option<String>,
    },
    /// Install the shuffled pile and reset the tallies.
    Initialize {
        /// Pre-shuffled cards, front is drawn first.
        pile: Vec<Card>,
    },
    /// Archive the head and present the next card of the pile.
    Draw,
    /// Record the verdict for the head.
    RecordSelection {
        /// `true` for a correct answer, `false` for a pass.
        correct: bool,
    },
    /// Graceful end of the session: the head is archived.
    End,
    /// Show or hide the results view.
    SetDisplayResults(bool),
    /// Mirror the remaining play time reported by the countdown.
    SyncTimeRemaining(Duration),
}

/// Error returned when an action is not legal in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {action:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Phase the machine was in when the action arrived.
    pub from: SessionPhase,
    /// The rejected action.
    pub action: SessionAction,
}

/// Why an accepted action left the state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// `Cancel` came from a player other than the bound one.
    PlayerMismatch,
    /// `Draw` with no card on screen and nothing left in the pile.
    PileExhausted,
    /// `RecordSelection` without a card awaiting judgement.
    NoActiveCard,
    /// `Cancel` or `End` after the session already stopped.
    AlreadyWaiting,
}

/// Effect of an accepted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed and the version was bumped.
    Applied,
    /// Nothing changed.
    Ignored(IgnoreReason),
}

/// Result of applying an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Phase before the action.
    pub from: SessionPhase,
    /// Phase after the action.
    pub to: SessionPhase,
    /// Whether the state changed.
    pub outcome: Outcome,
    /// Version after the action.
    pub version: usize,
}

impl Transition {
    /// Whether the action changed the state.
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, Outcome::Applied)
    }
}

/// Point-in-time copy of the machine, handed to subscribers and the DTO layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// The session itself.
    pub session: GameSession,
    /// Whether the results view should be displayed.
    pub display_results: bool,
    /// Number of applied transitions so far.
    pub version: usize,
}

/// State machine owning the game session and folding score and draw history.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    session: GameSession,
    display_results: bool,
    version: usize,
}

impl SessionStateMachine {
    /// Create a waiting machine with the configured countdown lengths.
    pub fn new(duration: Duration, ready_countdown: Duration) -> Self {
        Self {
            session: GameSession::new(duration, ready_countdown),
            display_results: false,
            version: 0,
        }
    }

    /// Inspect the session.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Current coarse phase.
    pub fn phase(&self) -> SessionPhase {
        self.session.phase
    }

    /// Whether the results view is requested.
    pub fn display_results(&self) -> bool {
        self.display_results
    }

    /// Number of applied transitions.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Copy the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            session: self.session.clone(),
            display_results: self.display_results,
            version: self.version,
        }
    }

    /// Apply an action, bumping the version when the state changes.
    pub fn apply(&mut self, action: SessionAction) -> Result<Transition, InvalidTransition> {
        let from = self.session.phase;
        let outcome = self.reduce(action)?;
        if matches!(outcome, Outcome::Applied) {
            self.version += 1;
        }

        Ok(Transition {
            from,
            to: self.session.phase,
            outcome,
            version: self.version,
        })
    }

    fn reduce(&mut self, action: SessionAction) -> Result<Outcome, InvalidTransition> {
        use SessionPhase::{Playing, Waiting};

        let outcome = match (self.session.phase, action) {
            (Waiting, SessionAction::Select { player_id, deck_id }) => {
                self.begin(player_id, deck_id);
                Outcome::Applied
            }
            (Playing, SessionAction::Cancel { player_id }) => match player_id {
                Some(requester) if requester != self.session.player_id => {
                    Outcome::Ignored(IgnoreReason::PlayerMismatch)
                }
                _ => {
                    self.abandon();
                    Outcome::Applied
                }
            },
            (Waiting, SessionAction::Cancel { .. }) | (Waiting, SessionAction::End) => {
                Outcome::Ignored(IgnoreReason::AlreadyWaiting)
            }
            (Playing, SessionAction::Initialize { pile }) => {
                let session = &mut self.session;
                session.correct_count = 0;
                session.pass_count = 0;
                session.draw.clear();
                session.head = None;
                session.pile = pile.into();
                Outcome::Applied
            }
            (Playing, SessionAction::Draw) => self.draw_next(),
            (Playing, SessionAction::RecordSelection { correct }) => self.record(correct),
            (Playing, SessionAction::End) => {
                self.finish();
                Outcome::Applied
            }
            (_, SessionAction::SetDisplayResults(display)) => {
                self.display_results = display;
                Outcome::Applied
            }
            (Playing, SessionAction::SyncTimeRemaining(remaining)) => {
                self.session.time_remaining = remaining.min(self.session.duration);
                Outcome::Applied
            }
            (from, action) => return Err(InvalidTransition { from, action }),
        };

        Ok(outcome)
    }

    fn begin(&mut self, player_id: String, deck_id: DeckId) {
        let session = &mut self.session;
        session.player_id = player_id;
        session.selected_deck_id = Some(deck_id);
        session.phase = SessionPhase::Playing;
        session.correct_count = 0;
        session.pass_count = 0;
        session.time_remaining = session.duration;
        session.pile.clear();
        session.head = None;
        session.draw.clear();
        self.display_results = false;
    }

    /// Abrupt termination: the head is discarded, not archived.
    fn abandon(&mut self) {
        let session = &mut self.session;
        session.player_id.clear();
        session.selected_deck_id = None;
        session.phase = SessionPhase::Waiting;
        session.head = None;
        session.pile.clear();
    }

    /// Graceful termination: the head is archived with whatever verdict it holds.
    fn finish(&mut self) {
        let session = &mut self.session;
        if let Some(head) = session.head.take() {
            session.draw.push(head);
        }
        session.player_id.clear();
        session.selected_deck_id = None;
        session.phase = SessionPhase::Waiting;
        session.pile.clear();
        self.display_results = true;
    }

    /// Archive the head, then present the next card of the pile if any.
    fn draw_next(&mut self) -> Outcome {
        let session = &mut self.session;
        if session.head.is_none() && session.pile.is_empty() {
            return Outcome::Ignored(IgnoreReason::PileExhausted);
        }

        if let Some(previous) = session.head.take() {
            session.draw.push(previous);
        }
        session.head = session.pile.pop_front().map(PlayedCard::pending);
        Outcome::Applied
    }

    fn record(&mut self, correct: bool) -> Outcome {
        let session = &mut self.session;
        let Some(head) = session.head.as_mut() else {
            warn!(correct, "selection recorded without a card awaiting judgement; ignoring");
            return Outcome::Ignored(IgnoreReason::NoActiveCard);
        };

        // A re-judged card moves its tally to the other counter.
        match head.judgement {
            Judgement::Correct => session.correct_count -= 1,
            Judgement::Pass => session.pass_count -= 1,
            Judgement::Unset => {}
        }

        head.judgement = Judgement::from_correct(correct);
        if correct {
            session.correct_count += 1;
        } else {
            session.pass_count += 1;
        }
        Outcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn machine() -> SessionStateMachine {
        SessionStateMachine::new(Duration::from_secs(15), Duration::from_secs(3))
    }

    fn apply(sm: &mut SessionStateMachine, action: SessionAction) -> Transition {
        sm.apply(action).unwrap()
    }

    fn select(sm: &mut SessionStateMachine, player: &str) {
        apply(
            sm,
            SessionAction::Select {
                player_id: player.into(),
                deck_id: "animals".into(),
            },
        );
    }

    fn cards(count: u32) -> Vec<Card> {
        (0..count).map(|id| Card::text(id, format!("card-{id}"))).collect()
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = machine();
        assert_eq!(sm.phase(), SessionPhase::Waiting);
        assert!(sm.session().player_id.is_empty());
        assert!(sm.session().selected_deck_id.is_none());
        assert!(!sm.display_results());
    }

    #[test]
    fn select_binds_player_and_deck() {
        let mut sm = machine();
        apply(&mut sm, SessionAction::SetDisplayResults(true));

        let transition = sm
            .apply(SessionAction::Select {
                player_id: "player-1".into(),
                deck_id: "animals".into(),
            })
            .unwrap();

        assert_eq!(transition.from, SessionPhase::Waiting);
        assert_eq!(transition.to, SessionPhase::Playing);
        assert_eq!(sm.session().player_id, "player-1");
        assert_eq!(sm.session().selected_deck_id.as_deref(), Some("animals"));
        assert!(!sm.display_results());
    }

    #[test]
    fn select_while_playing_is_rejected() {
        let mut sm = machine();
        select(&mut sm, "player-1");

        let err = sm
            .apply(SessionAction::Select {
                player_id: "player-2".into(),
                deck_id: "movies".into(),
            })
            .unwrap_err();
        assert_eq!(err.from, SessionPhase::Playing);
        assert_eq!(sm.session().player_id, "player-1");
    }

    #[test]
    fn gameplay_actions_are_rejected_while_waiting() {
        let mut sm = machine();
        for action in [
            SessionAction::Draw,
            SessionAction::RecordSelection { correct: true },
            SessionAction::Initialize { pile: cards(2) },
            SessionAction::SyncTimeRemaining(Duration::from_secs(1)),
        ] {
            let err = sm.apply(action.clone()).unwrap_err();
            assert_eq!(err.from, SessionPhase::Waiting);
            assert_eq!(err.action, action);
        }
        assert_eq!(sm.version(), 0);
    }

    #[test]
    fn initialize_installs_pile_and_resets_tallies() {
        let mut sm = machine();
        select(&mut sm, "player-1");
        apply(&mut sm, SessionAction::Initialize { pile: cards(3) });
        apply(&mut sm, SessionAction::Draw);
        apply(&mut sm, SessionAction::RecordSelection { correct: true });

        let pile = vec![Card::text(7, "A"), Card::text(8, "B")];
        apply(&mut sm, SessionAction::Initialize { pile: pile.clone() });

        let session = sm.session();
        assert_eq!(session.pile.iter().cloned().collect::<Vec<_>>(), pile);
        assert!(session.draw.is_empty());
        assert!(session.head.is_none());
        assert_eq!(session.correct_count, 0);
        assert_eq!(session.pass_count, 0);
    }

    #[test]
    fn draw_draw_record_draw_scenario() {
        let a = Card::text(0, "A");
        let b = Card::text(1, "B");
        let mut sm = machine();
        select(&mut sm, "player-1");
        apply(
            &mut sm,
            SessionAction::Initialize {
                pile: vec![a.clone(), b.clone()],
            },
        );
        apply(&mut sm, SessionAction::Draw);
        apply(&mut sm, SessionAction::Draw);
        apply(&mut sm, SessionAction::RecordSelection { correct: true });
        let last = apply(&mut sm, SessionAction::Draw);

        assert!(last.is_applied());
        let session = sm.session();
        assert_eq!(
            session.draw,
            vec![
                PlayedCard::pending(a),
                PlayedCard {
                    card: b,
                    judgement: Judgement::Correct
                }
            ]
        );
        assert!(session.head.is_none());
        assert!(session.pile.is_empty());
        assert_eq!(session.correct_count, 1);

        // Nothing left to archive or present.
        let exhausted = apply(&mut sm, SessionAction::Draw);
        assert_eq!(exhausted.outcome, Outcome::Ignored(IgnoreReason::PileExhausted));
        assert_eq!(sm.session().draw.len(), 2);
    }

    #[test]
    fn record_without_head_is_ignored() {
        let mut sm = machine();
        select(&mut sm, "player-1");
        apply(&mut sm, SessionAction::Initialize { pile: cards(2) });
        let before = sm.snapshot();

        let transition = apply(&mut sm, SessionAction::RecordSelection { correct: true });

        assert_eq!(
            transition.outcome,
            Outcome::Ignored(IgnoreReason::NoActiveCard)
        );
        assert_eq!(sm.snapshot(), before);
    }

    #[test]
    fn rejudging_moves_the_tally() {
        let mut sm = machine();
        select(&mut sm, "player-1");
        apply(&mut sm, SessionAction::Initialize { pile: cards(1) });
        apply(&mut sm, SessionAction::Draw);
        apply(&mut sm, SessionAction::RecordSelection { correct: true });
        apply(&mut sm, SessionAction::RecordSelection { correct: false });

        let session = sm.session();
        assert_eq!(session.correct_count, 0);
        assert_eq!(session.pass_count, 1);
        assert_eq!(
            session.correct_count as usize + session.pass_count as usize,
            session.judged_count()
        );
    }

    #[test]
    fn end_folds_pending_head_exactly_once() {
        let mut sm = machine();
        select(&mut sm, "player-1");
        apply(&mut sm, SessionAction::Initialize { pile: cards(3) });
        apply(&mut sm, SessionAction::Draw);

        let first = apply(&mut sm, SessionAction::End);
        let second = apply(&mut sm, SessionAction::End);

        assert!(first.is_applied());
        assert_eq!(
            second.outcome,
            Outcome::Ignored(IgnoreReason::AlreadyWaiting)
        );
        let session = sm.session();
        assert_eq!(session.phase, SessionPhase::Waiting);
        assert!(session.player_id.is_empty());
        assert!(session.selected_deck_id.is_none());
        assert_eq!(session.draw.len(), 1);
        assert_eq!(session.draw[0].judgement, Judgement::Unset);
        assert!(sm.display_results());
    }

    #[test]
    fn cancel_with_mismatched_player_is_ignored() {
        let mut sm = machine();
        select(&mut sm, "player-1");

        let transition = apply(
            &mut sm,
            SessionAction::Cancel {
                player_id: Some("intruder".into()),
            },
        );

        assert_eq!(
            transition.outcome,
            Outcome::Ignored(IgnoreReason::PlayerMismatch)
        );
        assert_eq!(sm.phase(), SessionPhase::Playing);
        assert_eq!(sm.session().player_id, "player-1");
    }

    #[test]
    fn cancel_by_bound_player_discards_head() {
        let mut sm = machine();
        select(&mut sm, "player-1");
        apply(&mut sm, SessionAction::Initialize { pile: cards(3) });
        apply(&mut sm, SessionAction::Draw);
        apply(&mut sm, SessionAction::Draw);

        apply(
            &mut sm,
            SessionAction::Cancel {
                player_id: Some("player-1".into()),
            },
        );

        let session = sm.session();
        assert_eq!(session.phase, SessionPhase::Waiting);
        assert!(session.head.is_none());
        assert_eq!(session.draw.len(), 1);
        assert!(!sm.display_results());
    }

    #[test]
    fn cancel_without_player_is_unconditional() {
        let mut sm = machine();
        select(&mut sm, "player-1");

        let transition = apply(&mut sm, SessionAction::Cancel { player_id: None });

        assert!(transition.is_applied());
        assert_eq!(sm.phase(), SessionPhase::Waiting);
        assert!(sm.session().player_id.is_empty());
        assert!(sm.session().selected_deck_id.is_none());
    }

    #[test]
    fn sync_time_remaining_is_clamped_to_duration() {
        let mut sm = machine();
        select(&mut sm, "player-1");
        apply(
            &mut sm,
            SessionAction::SyncTimeRemaining(Duration::from_secs(90)),
        );
        assert_eq!(sm.session().time_remaining, Duration::from_secs(15));

        apply(&mut sm, SessionAction::SyncTimeRemaining(Duration::from_secs(4)));
        assert_eq!(sm.session().time_remaining, Duration::from_secs(4));
    }

    #[test]
    fn ignored_actions_do_not_bump_the_version() {
        let mut sm = machine();
        apply(&mut sm, SessionAction::End);
        apply(&mut sm, SessionAction::Cancel { player_id: None });
        assert_eq!(sm.version(), 0);
    }

    proptest! {
        #[test]
        fn draw_shrinks_pile_by_one_until_empty(size in 0u32..24, draws in 0usize..32) {
            let mut sm = machine();
            select(&mut sm, "player-1");
            apply(&mut sm, SessionAction::Initialize { pile: cards(size) });
            let census = sm.session().card_census();

            for _ in 0..draws {
                let before = sm.session().pile.len();
                let had_head = sm.session().head.is_some();
                let transition = apply(&mut sm, SessionAction::Draw);
                let after = sm.session().pile.len();
                if before == 0 {
                    prop_assert_eq!(after, 0);
                    prop_assert!(sm.session().head.is_none());
                    prop_assert_eq!(transition.is_applied(), had_head);
                } else {
                    prop_assert_eq!(after, before - 1);
                }
                prop_assert_eq!(sm.session().card_census(), census.clone());
            }
        }

        #[test]
        fn playing_transitions_conserve_cards(
            size in 0u32..16,
            steps in proptest::collection::vec(proptest::option::of(any::<bool>()), 0..48),
        ) {
            let mut sm = machine();
            select(&mut sm, "player-1");
            apply(&mut sm, SessionAction::Initialize { pile: cards(size) });
            let census = sm.session().card_census();

            // `None` draws; `Some(correct)` judges or re-judges the head.
            for step in steps {
                let action = match step {
                    None => SessionAction::Draw,
                    Some(correct) => SessionAction::RecordSelection { correct },
                };
                apply(&mut sm, action);

                let session = sm.session();
                prop_assert_eq!(session.card_census(), census.clone());
                prop_assert_eq!(
                    session.correct_count as usize + session.pass_count as usize,
                    session.judged_count()
                );
            }
        }

        #[test]
        fn tallies_match_judged_cards(answers in proptest::collection::vec(any::<bool>(), 0..16)) {
            let mut sm = machine();
            select(&mut sm, "player-1");
            apply(&mut sm, SessionAction::Initialize { pile: cards(answers.len() as u32) });

            for correct in answers {
                apply(&mut sm, SessionAction::Draw);
                apply(&mut sm, SessionAction::RecordSelection { correct });
                let session = sm.session();
                prop_assert_eq!(
                    session.correct_count as usize + session.pass_count as usize,
                    session.judged_count()
                );
            }
        }
    }
}
