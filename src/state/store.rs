use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tracing::{debug, trace};

use crate::state::state_machine::{
    InvalidTransition, SessionAction, SessionStateMachine, Snapshot, Transition,
};

/// Explicit state container around the session state machine.
///
/// Transitions are serialized by the write lock; every applied transition
/// publishes a fresh [`Snapshot`] to the watch channel returned by
/// [`SessionStore::subscribe`].
pub struct SessionStore {
    machine: RwLock<SessionStateMachine>,
    updates: watch::Sender<Snapshot>,
}

impl SessionStore {
    /// Build a store around a fresh waiting session.
    pub fn new(duration: Duration, ready_countdown: Duration) -> Self {
        let machine = SessionStateMachine::new(duration, ready_countdown);
        let (updates, _rx) = watch::channel(machine.snapshot());
        Self {
            machine: RwLock::new(machine),
            updates,
        }
    }

    /// Apply an action and notify subscribers when the state changed.
    pub async fn dispatch(&self, action: SessionAction) -> Result<Transition, InvalidTransition> {
        let mut machine = self.machine.write().await;
        self.apply_locked(&mut machine, action)
    }

    /// Apply an action only if `is_live` still holds once the write lock is taken.
    ///
    /// Returns `Ok(None)` when the caller went stale (its session was torn down
    /// while the action was in flight); the action is dropped without effect.
    pub async fn dispatch_guarded<F>(
        &self,
        action: SessionAction,
        is_live: F,
    ) -> Result<Option<Transition>, InvalidTransition>
    where
        F: FnOnce() -> bool,
    {
        let mut machine = self.machine.write().await;
        if !is_live() {
            trace!(?action, "dropping action from a torn-down session");
            return Ok(None);
        }

        self.apply_locked(&mut machine, action).map(Some)
    }

    /// Apply an action and run `on_applied` before the write lock is released,
    /// so no other action can slip in between the transition and its side effect.
    pub async fn dispatch_then<F>(
        &self,
        action: SessionAction,
        on_applied: F,
    ) -> Result<Transition, InvalidTransition>
    where
        F: FnOnce(&Transition),
    {
        let mut machine = self.machine.write().await;
        let transition = self.apply_locked(&mut machine, action)?;
        if transition.is_applied() {
            on_applied(&transition);
        }

        Ok(transition)
    }

    /// Receiver yielding the latest snapshot after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.updates.subscribe()
    }

    /// Copy the current state.
    pub async fn get_state(&self) -> Snapshot {
        self.machine.read().await.snapshot()
    }

    fn apply_locked(
        &self,
        machine: &mut SessionStateMachine,
        action: SessionAction,
    ) -> Result<Transition, InvalidTransition> {
        let label = action_label(&action);
        let transition = machine.apply(action)?;
        if transition.is_applied() {
            self.updates.send_replace(machine.snapshot());
        } else {
            debug!(action = label, outcome = ?transition.outcome, "action ignored");
        }

        Ok(transition)
    }
}

fn action_label(action: &SessionAction) -> &'static str {
    match action {
        SessionAction::Select { .. } => "select",
        SessionAction::Cancel { .. } => "cancel",
        SessionAction::Initialize { .. } => "initialize",
        SessionAction::Draw => "draw",
        SessionAction::RecordSelection { .. } => "record_selection",
        SessionAction::End => "end",
        SessionAction::SetDisplayResults(_) => "set_display_results",
        SessionAction::SyncTimeRemaining(_) => "sync_time_remaining",
    }
}
