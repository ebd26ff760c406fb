use std::time::SystemTime;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    dto::{
        deck::{CardDto, DeckSummary},
        format_system_time,
        session::{PlayedCardDto, SessionView},
        sse::{
            AnswerFeedbackEvent, CardRevealedEvent, DeckFlippedEvent, FinalSecondsEvent,
            PlayTickEvent, ReadyTickEvent, ServerEvent, SessionCancelledEvent, SessionEndedEvent,
            SessionFailedEvent, SessionUpdatedEvent, TimeUpEvent,
        },
    },
    engine::{CountdownTick, Zone},
    state::{SharedState, Snapshot, session::Card},
};

pub(crate) const EVENT_SESSION_UPDATED: &str = "session.updated";
pub(crate) const EVENT_READY_TICK: &str = "ready.tick";
pub(crate) const EVENT_PLAY_TICK: &str = "play.tick";
pub(crate) const EVENT_FINAL_SECONDS: &str = "play.final_seconds";
pub(crate) const EVENT_CARD_REVEALED: &str = "card.revealed";
pub(crate) const EVENT_ANSWER_FEEDBACK: &str = "answer.feedback";
pub(crate) const EVENT_TIME_UP: &str = "session.time_up";
pub(crate) const EVENT_SESSION_ENDED: &str = "session.ended";
pub(crate) const EVENT_SESSION_CANCELLED: &str = "session.cancelled";
pub(crate) const EVENT_SESSION_FAILED: &str = "session.failed";
pub(crate) const EVENT_DECK_FLIPPED: &str = "deck.flipped";

/// Broadcast a ready countdown tick.
pub fn broadcast_ready_tick(state: &SharedState, tick: CountdownTick) {
    send_public_event(
        state,
        EVENT_READY_TICK,
        &ReadyTickEvent {
            seconds: tick.seconds(),
        },
    );
}

/// Broadcast a play countdown tick.
pub fn broadcast_play_tick(state: &SharedState, tick: CountdownTick) {
    send_public_event(
        state,
        EVENT_PLAY_TICK,
        &PlayTickEvent {
            clock: tick.clock(),
            seconds: tick.seconds(),
        },
    );
}

/// Cue the last seconds of play.
pub fn broadcast_final_seconds(state: &SharedState, tick: CountdownTick) {
    send_public_event(
        state,
        EVENT_FINAL_SECONDS,
        &FinalSecondsEvent {
            seconds: tick.seconds(),
        },
    );
}

/// Announce the card now presented to the player.
pub fn broadcast_card_revealed(state: &SharedState, card: &Card, pile_remaining: usize) {
    send_public_event(
        state,
        EVENT_CARD_REVEALED,
        &CardRevealedEvent {
            card: CardDto::from(card),
            pile_remaining,
        },
    );
}

/// Show the answer given by a head tilt before it is recorded.
pub fn broadcast_answer_feedback(state: &SharedState, zone: Zone) {
    send_public_event(
        state,
        EVENT_ANSWER_FEEDBACK,
        &AnswerFeedbackEvent {
            zone,
            correct: zone.is_correct(),
        },
    );
}

/// Announce the play countdown ran out.
pub fn broadcast_time_up(state: &SharedState, snapshot: &Snapshot) {
    send_public_event(
        state,
        EVENT_TIME_UP,
        &TimeUpEvent {
            correct_count: snapshot.session.correct_count,
            pass_count: snapshot.session.pass_count,
        },
    );
}

/// Publish the results of a session that ended gracefully.
pub fn broadcast_session_ended(state: &SharedState, snapshot: &Snapshot) {
    let session = &snapshot.session;
    send_public_event(
        state,
        EVENT_SESSION_ENDED,
        &SessionEndedEvent {
            draw: session.draw.iter().map(PlayedCardDto::from).collect(),
            correct_count: session.correct_count,
            pass_count: session.pass_count,
            ended_at: format_system_time(SystemTime::now()),
        },
    );
}

/// Announce the session was cancelled.
pub fn broadcast_session_cancelled(state: &SharedState, player_id: Option<String>) {
    send_public_event(
        state,
        EVENT_SESSION_CANCELLED,
        &SessionCancelledEvent { player_id },
    );
}

/// Report a session that could not continue.
pub fn broadcast_session_failed(state: &SharedState, message: impl Into<String>) {
    send_public_event(
        state,
        EVENT_SESSION_FAILED,
        &SessionFailedEvent {
            message: message.into(),
        },
    );
}

/// Announce a deck was flipped up or down.
pub fn broadcast_deck_flipped(state: &SharedState, deck: DeckSummary) {
    send_public_event(state, EVENT_DECK_FLIPPED, &DeckFlippedEvent(deck));
}

/// Forward every snapshot published by the session store to the public stream.
pub fn spawn_session_relay(state: SharedState) -> JoinHandle<()> {
    let mut updates = state.store().subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let view = SessionView::from(&*updates.borrow_and_update());
            debug!(version = view.version, "relaying session update");
            send_public_event(&state, EVENT_SESSION_UPDATED, &SessionUpdatedEvent(view));
        }
    })
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(message) => state.public_sse().broadcast(message),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}
