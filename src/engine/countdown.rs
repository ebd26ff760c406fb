//! 1 Hz countdowns computed against an absolute deadline, with cancel handles.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::trace;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Remaining time reported on every countdown tick, rounded up to whole seconds
/// so that only a tick at or past the deadline reads zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    remaining: Duration,
}

impl CountdownTick {
    /// Tick for the time left between `now` and `deadline`.
    pub fn until(deadline: Instant, now: Instant) -> Self {
        let left = deadline.saturating_duration_since(now);
        let seconds = left.as_millis().div_ceil(1000);
        Self {
            remaining: Duration::from_secs(seconds as u64),
        }
    }

    /// Remaining time.
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Remaining whole seconds.
    pub fn seconds(&self) -> u64 {
        self.remaining.as_secs()
    }

    /// Whether this is the last tick of the countdown.
    pub fn is_final(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Remaining time as `MM:SS`.
    pub fn clock(&self) -> String {
        let seconds = self.seconds();
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    }

    /// Whether the countdown entered its last `window` without being over yet.
    pub fn within(&self, window: Duration) -> bool {
        !self.is_final() && self.remaining <= window
    }
}

/// Cancel handle of a running countdown. Dropping the handle cancels it.
#[derive(Debug)]
pub struct CountdownHandle {
    gate: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    /// Stop the countdown. Once this returns no further tick is delivered.
    ///
    /// Must not be called from inside the tick callback of the same countdown.
    pub fn cancel(&self) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.task.abort();
    }

    /// Whether the countdown delivered its final tick or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished() || !*self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Start a countdown of `duration`, calling `on_tick` once per second until it reaches zero.
///
/// The first tick fires immediately with the full duration. Late ticks are
/// skipped rather than bunched, and every tick recomputes the remaining time
/// from the deadline. Must be called within a Tokio runtime.
pub fn start<F>(duration: Duration, mut on_tick: F) -> CountdownHandle
where
    F: FnMut(CountdownTick) + Send + 'static,
{
    let gate = Arc::new(Mutex::new(true));
    let start = Instant::now();
    let deadline = start + duration;

    let task_gate = Arc::clone(&gate);
    let task = tokio::spawn(async move {
        let mut ticker = interval_at(start, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let tick = CountdownTick::until(deadline, Instant::now());

            {
                let open = task_gate.lock().unwrap_or_else(PoisonError::into_inner);
                if !*open {
                    trace!("tick after cancellation dropped");
                    return;
                }
                on_tick(tick);
            }

            if tick.is_final() {
                return;
            }
        }
    });

    CountdownHandle { gate, task }
}

/// Owner of the two countdowns of a session: the ready countdown and the play countdown.
#[derive(Debug, Default)]
pub struct CountdownCoordinator {
    ready: Option<CountdownHandle>,
    play: Option<CountdownHandle>,
}

impl CountdownCoordinator {
    /// Coordinator with nothing running.
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)start the ready countdown, cancelling a previous one.
    pub fn start_ready<F>(&mut self, duration: Duration, on_tick: F)
    where
        F: FnMut(CountdownTick) + Send + 'static,
    {
        self.cancel_ready();
        self.ready = Some(start(duration, on_tick));
    }

    /// (Re)start the play countdown, cancelling a previous one.
    pub fn start_play<F>(&mut self, duration: Duration, on_tick: F)
    where
        F: FnMut(CountdownTick) + Send + 'static,
    {
        self.cancel_play();
        self.play = Some(start(duration, on_tick));
    }

    /// Stop the ready countdown.
    pub fn cancel_ready(&mut self) {
        if let Some(handle) = self.ready.take() {
            handle.cancel();
        }
    }

    /// Stop the play countdown.
    pub fn cancel_play(&mut self) {
        if let Some(handle) = self.play.take() {
            handle.cancel();
        }
    }

    /// Stop both countdowns.
    pub fn cancel_all(&mut self) {
        self.cancel_ready();
        self.cancel_play();
    }

    /// Whether either countdown is still ticking.
    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        [&self.ready, &self.play]
            .into_iter()
            .flatten()
            .any(|handle| !handle.is_finished())
    }
}
