use std::{collections::VecDeque, time::Duration};

use serde::{Deserialize, Serialize};

/// Identifier of a deck inside the catalog (the stem of its definition file).
pub type DeckId = String;
/// Identifier of a card, unique within its deck.
pub type CardId = u32;

/// How a card prompt should be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// The value is a text prompt.
    #[default]
    Text,
    /// The value is an image location.
    Image,
}

/// Atomic prompt judged by the player. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Card {
    /// Position of the card inside its deck definition.
    pub id: CardId,
    /// Text or image reference shown to the player.
    pub value: String,
    /// Rendering hint for the presentation layer.
    pub kind: CardKind,
}

impl Card {
    /// Build a text card.
    pub fn text(id: CardId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
            kind: CardKind::Text,
        }
    }
}

/// Named collection of cards plus the selection metadata shown on the deck picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    /// Stable identifier.
    pub id: DeckId,
    /// Display name.
    pub name: String,
    /// Short blurb shown under the name.
    pub description: String,
    /// How to play this deck.
    pub play_instructions: String,
    /// Cards in definition order.
    pub cards: Vec<Card>,
    /// Disabled decks are listed but cannot be played.
    pub enabled: bool,
    /// Tentatively selected, not yet confirmed. At most one deck is flipped.
    pub flipped: bool,
}

/// Verdict attached to a played card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Judgement {
    /// The card was shown but never answered.
    #[default]
    Unset,
    /// Tilted down: the player got it.
    Correct,
    /// Tilted up: the player passed.
    Pass,
}

impl Judgement {
    /// Map a boolean answer onto a verdict.
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            Judgement::Correct
        } else {
            Judgement::Pass
        }
    }

    /// Whether a verdict has been recorded.
    pub fn is_judged(self) -> bool {
        !matches!(self, Judgement::Unset)
    }

    /// Tri-state projection used by the DTO layer.
    pub fn as_option(self) -> Option<bool> {
        match self {
            Judgement::Unset => None,
            Judgement::Correct => Some(true),
            Judgement::Pass => Some(false),
        }
    }
}

/// A card that left the pile, with whatever verdict it currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedCard {
    /// The card shown to the player.
    pub card: Card,
    /// Verdict recorded for it so far.
    pub judgement: Judgement,
}

impl PlayedCard {
    /// A freshly drawn card awaiting judgement.
    pub fn pending(card: Card) -> Self {
        Self {
            card,
            judgement: Judgement::Unset,
        }
    }
}

/// Coarse lifecycle of the single game session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No player bound; the deck picker is shown.
    #[default]
    Waiting,
    /// A player selected a deck and the session is running.
    Playing,
}

/// The one game session owned by the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    /// Deck bound by `Select`, unset while waiting.
    pub selected_deck_id: Option<DeckId>,
    /// Cards not drawn yet, front first.
    pub pile: VecDeque<Card>,
    /// Card currently presented.
    pub head: Option<PlayedCard>,
    /// History of cards that left the head, append-only within a run.
    pub draw: Vec<PlayedCard>,
    /// Number of correct verdicts.
    pub correct_count: u32,
    /// Number of pass verdicts.
    pub pass_count: u32,
    /// Length of the play countdown.
    pub duration: Duration,
    /// Last remaining time reported by the play countdown.
    pub time_remaining: Duration,
    /// Waiting or playing.
    pub phase: SessionPhase,
    /// Player bound by `Select`, empty while waiting.
    pub player_id: String,
    /// Length of the ready countdown preceding play.
    pub ready_countdown_duration: Duration,
}

impl GameSession {
    /// Fresh waiting session using the configured countdown lengths.
    pub fn new(duration: Duration, ready_countdown_duration: Duration) -> Self {
        Self {
            selected_deck_id: None,
            pile: VecDeque::new(),
            head: None,
            draw: Vec::new(),
            correct_count: 0,
            pass_count: 0,
            duration,
            time_remaining: duration,
            phase: SessionPhase::Waiting,
            player_id: String::new(),
            ready_countdown_duration,
        }
    }

    /// Whether a card is currently awaiting judgement.
    pub fn awaiting_judgement(&self) -> bool {
        self.head.is_some()
    }

    /// Number of cards carrying a verdict, counting the head.
    pub fn judged_count(&self) -> usize {
        self.draw
            .iter()
            .chain(self.head.iter())
            .filter(|played| played.judgement.is_judged())
            .count()
    }

    /// Sorted ids of every card owned by the session (pile, head and draw).
    pub fn card_census(&self) -> Vec<CardId> {
        let mut ids: Vec<CardId> = self
            .pile
            .iter()
            .map(|card| card.id)
            .chain(self.head.iter().map(|played| played.card.id))
            .chain(self.draw.iter().map(|played| played.card.id))
            .collect();
        ids.sort_unstable();
        ids
    }
}
