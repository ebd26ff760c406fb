use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{deck::CardDto, validation::validate_player_id},
    state::{
        session::{PlayedCard, SessionPhase},
        state_machine::Snapshot,
    },
};

/// Coarse lifecycle of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhaseDto {
    Waiting,
    Playing,
}

impl From<SessionPhase> for SessionPhaseDto {
    fn from(phase: SessionPhase) -> Self {
        match phase {
            SessionPhase::Waiting => SessionPhaseDto::Waiting,
            SessionPhase::Playing => SessionPhaseDto::Playing,
        }
    }
}

/// Played card with its verdict: `true` correct, `false` pass, `null` unanswered.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayedCardDto {
    pub card: CardDto,
    pub correct: Option<bool>,
}

impl From<&PlayedCard> for PlayedCardDto {
    fn from(played: &PlayedCard) -> Self {
        Self {
            card: CardDto::from(&played.card),
            correct: played.judgement.as_option(),
        }
    }
}

/// Read-model of the game session, score and history included.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionView {
    pub phase: SessionPhaseDto,
    pub player_id: String,
    pub selected_deck_id: Option<String>,
    /// Card awaiting judgement.
    pub head: Option<PlayedCardDto>,
    /// Cards not drawn yet.
    pub pile_remaining: usize,
    /// Cards that left the head, in play order.
    pub draw: Vec<PlayedCardDto>,
    pub correct_count: u32,
    pub pass_count: u32,
    pub duration_ms: u64,
    pub time_remaining_ms: u64,
    pub ready_countdown_ms: u64,
    pub display_results: bool,
    pub version: usize,
}

impl From<&Snapshot> for SessionView {
    fn from(snapshot: &Snapshot) -> Self {
        let session = &snapshot.session;
        Self {
            phase: session.phase.into(),
            player_id: session.player_id.clone(),
            selected_deck_id: session.selected_deck_id.clone(),
            head: session.head.as_ref().map(PlayedCardDto::from),
            pile_remaining: session.pile.len(),
            draw: session.draw.iter().map(PlayedCardDto::from).collect(),
            correct_count: session.correct_count,
            pass_count: session.pass_count,
            duration_ms: session.duration.as_millis() as u64,
            time_remaining_ms: session.time_remaining.as_millis() as u64,
            ready_countdown_ms: session.ready_countdown_duration.as_millis() as u64,
            display_results: snapshot.display_results,
            version: snapshot.version,
        }
    }
}

/// Request body selecting a deck for a player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SelectDeckRequest {
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    #[validate(length(min = 1, message = "deck_id must not be empty"))]
    pub deck_id: String,
}

/// Request body cancelling the running session.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CancelSessionRequest {
    /// When set, only the bound player may cancel.
    #[serde(default)]
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: Option<String>,
}
