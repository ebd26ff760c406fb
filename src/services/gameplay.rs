//! Per-session event loop: deals the shuffled pile, drives both countdowns and
//! turns accepted head tilts into verdicts until the pile or the clock runs out.

use std::{
    pin::Pin,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Sleep, sleep},
};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    engine::{
        CountdownCoordinator, CountdownTick, GestureClassifier, GestureError, SensorHost, Zone,
        shuffle,
    },
    services::sse_events,
    state::{SessionAction, SharedState, Transition, session::Card},
};

/// Notifications delivered to the session loop by its timers and sensors.
#[derive(Debug, Clone, Copy)]
enum SessionEvent {
    ReadyTick(CountdownTick),
    PlayTick(CountdownTick),
    Classified(Zone),
}

#[derive(Default)]
struct Resources {
    countdowns: CountdownCoordinator,
    classifier: Option<GestureClassifier>,
}

/// Timers, sensors and task owned by one running session.
///
/// Every callback checks [`SessionRuntime::is_active`] before acting, so work
/// scheduled before [`SessionRuntime::release`] never touches the store.
pub struct SessionRuntime {
    id: Uuid,
    player_id: String,
    deck_id: String,
    host: Arc<dyn SensorHost>,
    active: AtomicBool,
    resources: Mutex<Resources>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionRuntime {
    fn new(player_id: String, deck_id: String, host: Arc<dyn SensorHost>) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id,
            deck_id,
            host,
            active: AtomicBool::new(true),
            resources: Mutex::new(Resources::default()),
            task: Mutex::new(None),
        }
    }

    /// Identifier of this run, used to tell sessions apart in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Player bound to the session.
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Deck being played.
    pub fn deck_id(&self) -> &str {
        &self.deck_id
    }

    /// Whether the session has not been released yet.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether the gesture sensors are armed.
    pub fn is_detecting(&self) -> bool {
        self.resources()
            .classifier
            .as_ref()
            .is_some_and(GestureClassifier::is_detecting)
    }

    /// Stop every timer and disarm the sensors. Idempotent.
    pub fn release(&self) {
        let mut resources = self.resources();
        let was_active = self.active.swap(false, Ordering::SeqCst);
        resources.countdowns.cancel_all();
        if let Some(mut classifier) = resources.classifier.take() {
            classifier.stop_detection();
        }
        if was_active {
            info!(session_id = %self.id, player_id = %self.player_id, "session resources released");
        }
    }

    /// Release the resources and stop the session loop.
    pub fn teardown(&self) {
        self.release();
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }

    fn start_ready_countdown(&self, state: &SharedState, events: &mpsc::UnboundedSender<SessionEvent>) {
        let mut resources = self.resources();
        if !self.is_active() {
            return;
        }
        let events = events.clone();
        resources.countdowns.start_ready(
            state.config().gameplay.ready_countdown,
            move |tick| {
                let _ = events.send(SessionEvent::ReadyTick(tick));
            },
        );
    }

    fn start_play_countdown(&self, state: &SharedState, events: &mpsc::UnboundedSender<SessionEvent>) {
        let mut resources = self.resources();
        if !self.is_active() {
            return;
        }
        let events = events.clone();
        resources.countdowns.start_play(
            state.config().gameplay.session_duration,
            move |tick| {
                let _ = events.send(SessionEvent::PlayTick(tick));
            },
        );
    }

    fn arm(
        &self,
        state: &SharedState,
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<(), GestureError> {
        let mut resources = self.resources();
        if !self.is_active() {
            return Ok(());
        }

        let mut classifier = GestureClassifier::new(
            Arc::clone(&self.host),
            state.config().gameplay.gesture_debounce,
        );
        let events = events.clone();
        classifier.start_detection(move |zone| {
            let _ = events.send(SessionEvent::Classified(zone));
        })?;
        resources.classifier = Some(classifier);
        Ok(())
    }

    fn disarm(&self) {
        if let Some(mut classifier) = self.resources().classifier.take() {
            classifier.stop_detection();
        }
    }

    fn resources(&self) -> MutexGuard<'_, Resources> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Start the loop of a freshly selected session and return its runtime.
pub fn spawn(
    state: SharedState,
    player_id: String,
    deck_id: String,
    cards: Vec<Card>,
    host: Arc<dyn SensorHost>,
) -> Arc<SessionRuntime> {
    let runtime = Arc::new(SessionRuntime::new(player_id, deck_id, host));
    let span = info_span!(
        "session",
        session_id = %runtime.id(),
        player_id = %runtime.player_id(),
        deck_id = %runtime.deck_id()
    );

    let task = tokio::spawn(run(state, Arc::clone(&runtime), cards).instrument(span));
    *runtime.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    runtime
}

enum Step {
    Event(SessionEvent),
    Judge(Zone),
    Closed,
}

async fn run(state: SharedState, runtime: Arc<SessionRuntime>, cards: Vec<Card>) {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let gameplay = state.config().gameplay.clone();

    sleep(gameplay.play_start_delay).await;

    let pile = shuffle(&cards);
    info!(cards = pile.len(), "dealing shuffled pile");
    if dispatch(&state, &runtime, SessionAction::Initialize { pile })
        .await
        .is_none()
        || dispatch(&state, &runtime, SessionAction::Draw).await.is_none()
    {
        return;
    }
    runtime.start_ready_countdown(&state, &events_tx);

    let mut pending: Option<(Zone, Pin<Box<Sleep>>)> = None;

    loop {
        let step = tokio::select! {
            event = events.recv() => match event {
                Some(event) => Step::Event(event),
                None => Step::Closed,
            },
            zone = judgement_due(&mut pending) => Step::Judge(zone),
        };

        match step {
            Step::Event(SessionEvent::ReadyTick(tick)) => {
                sse_events::broadcast_ready_tick(&state, tick);
                if !tick.is_final() {
                    continue;
                }

                if let Err(err) = runtime.arm(&state, &events_tx) {
                    warn!(error = %err, "gesture sensors unavailable; ending session");
                    sse_events::broadcast_session_failed(&state, err.to_string());
                    finish(&state, &runtime).await;
                    return;
                }
                reveal_head(&state).await;
                runtime.start_play_countdown(&state, &events_tx);
            }
            Step::Event(SessionEvent::PlayTick(tick)) => {
                if dispatch(
                    &state,
                    &runtime,
                    SessionAction::SyncTimeRemaining(tick.remaining()),
                )
                .await
                .is_none()
                {
                    return;
                }
                sse_events::broadcast_play_tick(&state, tick);
                if tick.within(gameplay.final_seconds) {
                    sse_events::broadcast_final_seconds(&state, tick);
                }
                if !tick.is_final() {
                    continue;
                }

                info!("time up");
                runtime.disarm();
                sse_events::broadcast_time_up(&state, &state.snapshot().await);
                sleep(gameplay.time_up).await;
                finish(&state, &runtime).await;
                return;
            }
            Step::Event(SessionEvent::Classified(zone)) => {
                if pending.is_some() || !runtime.is_detecting() {
                    debug!(%zone, "classification ignored while an answer is pending");
                    continue;
                }

                sse_events::broadcast_answer_feedback(&state, zone);
                pending = Some((zone, Box::pin(sleep(gameplay.feedback))));
            }
            Step::Judge(zone) => {
                pending = None;
                if !runtime.is_detecting() {
                    debug!(%zone, "sensors disarmed before the answer was recorded");
                    continue;
                }

                let correct = zone.is_correct();
                if dispatch(&state, &runtime, SessionAction::RecordSelection { correct })
                    .await
                    .is_none()
                {
                    return;
                }
                info!(%zone, correct, "answer recorded");

                if state.snapshot().await.session.pile.is_empty() {
                    info!("pile exhausted");
                    finish(&state, &runtime).await;
                    return;
                }
                if dispatch(&state, &runtime, SessionAction::Draw).await.is_none() {
                    return;
                }
                reveal_head(&state).await;
            }
            Step::Closed => return,
        }
    }
}

/// Resolve once the pending answer's feedback delay elapsed; never resolves without one.
async fn judgement_due(pending: &mut Option<(Zone, Pin<Box<Sleep>>)>) -> Zone {
    match pending {
        Some((zone, delay)) => {
            delay.as_mut().await;
            *zone
        }
        None => std::future::pending().await,
    }
}

/// Apply an action on behalf of the session loop. `None` means the loop must stop.
async fn dispatch(
    state: &SharedState,
    runtime: &SessionRuntime,
    action: SessionAction,
) -> Option<Transition> {
    match state
        .store()
        .dispatch_guarded(action, || runtime.is_active())
        .await
    {
        Ok(Some(transition)) => Some(transition),
        Ok(None) => None,
        Err(err) => {
            warn!(error = %err, "session loop stopped on a rejected action");
            runtime.release();
            None
        }
    }
}

async fn reveal_head(state: &SharedState) {
    let snapshot = state.snapshot().await;
    if let Some(head) = snapshot.session.head.as_ref() {
        sse_events::broadcast_card_revealed(state, &head.card, snapshot.session.pile.len());
    }
}

/// Graceful end: archive the head, release resources, publish results and free the slot.
async fn finish(state: &SharedState, runtime: &Arc<SessionRuntime>) {
    let mut slot = state.runtime().lock().await;

    let ended = dispatch(state, runtime, SessionAction::End).await;
    runtime.release();
    if ended.is_some_and(|transition| transition.is_applied()) {
        let snapshot = state.snapshot().await;
        info!(
            correct = snapshot.session.correct_count,
            pass = snapshot.session.pass_count,
            "session ended"
        );
        sse_events::broadcast_session_ended(state, &snapshot);
    }

    if slot.as_ref().is_some_and(|current| current.id() == runtime.id()) {
        *slot = None;
    }
}
