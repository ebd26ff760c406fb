use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::state::session::{Card, CardKind, Deck};

/// Rendering hint of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CardKindDto {
    Text,
    Image,
}

impl From<CardKind> for CardKindDto {
    fn from(kind: CardKind) -> Self {
        match kind {
            CardKind::Text => CardKindDto::Text,
            CardKind::Image => CardKindDto::Image,
        }
    }
}

/// Card as shown to the player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CardDto {
    pub id: u32,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: CardKindDto,
}

impl From<&Card> for CardDto {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id,
            value: card.value.clone(),
            kind: card.kind.into(),
        }
    }
}

/// Deck entry listed on the picker. Cards are not exposed before play.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeckSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub play_instructions: String,
    pub card_count: usize,
    pub enabled: bool,
    pub flipped: bool,
}

impl From<&Deck> for DeckSummary {
    fn from(deck: &Deck) -> Self {
        Self {
            id: deck.id.clone(),
            name: deck.name.clone(),
            description: deck.description.clone(),
            play_instructions: deck.play_instructions.clone(),
            card_count: deck.cards.len(),
            enabled: deck.enabled,
            flipped: deck.flipped,
        }
    }
}

/// Request body for flipping a deck on the picker.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct FlipDeckRequest {
    /// `true` to flip the deck up (un-flipping every other deck), `false` to flip it back.
    pub flipped: bool,
}
