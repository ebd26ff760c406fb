use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{
        deck::{CardDto, DeckSummary},
        session::{PlayedCardDto, SessionView},
    },
    engine::Zone,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    pub stream: String,
    pub message: String,
    /// Session state at connection time.
    pub session: SessionView,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast after every applied session transition.
pub struct SessionUpdatedEvent(pub SessionView);

#[derive(Debug, Serialize, ToSchema)]
/// Ready countdown tick.
pub struct ReadyTickEvent {
    pub seconds: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Play countdown tick.
pub struct PlayTickEvent {
    /// Remaining time as `MM:SS`.
    pub clock: String,
    pub seconds: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Raised on each tick of the last seconds of play. Cue only.
pub struct FinalSecondsEvent {
    pub seconds: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// A new card is presented to the player.
pub struct CardRevealedEvent {
    pub card: CardDto,
    pub pile_remaining: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Immediate feedback for an accepted head tilt, before the verdict is recorded.
pub struct AnswerFeedbackEvent {
    pub zone: Zone,
    pub correct: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// The play countdown ran out.
pub struct TimeUpEvent {
    pub correct_count: u32,
    pub pass_count: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// The session ended gracefully; carries the results.
pub struct SessionEndedEvent {
    pub draw: Vec<PlayedCardDto>,
    pub correct_count: u32,
    pub pass_count: u32,
    /// RFC 3339 timestamp.
    pub ended_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// The session was cancelled before completion.
pub struct SessionCancelledEvent {
    pub player_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// The session could not continue.
pub struct SessionFailedEvent {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// A deck was flipped up or down on the picker.
pub struct DeckFlippedEvent(pub DeckSummary);
