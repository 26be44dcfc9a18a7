//! # UI Dispatcher
//!
//! Owns the presentation thread and its event loop.
//!
//! ```text
//!   any thread ──invoke(action, mode)──► crossbeam channel ──► presentation loop
//!                                                                 │
//!                      ┌──────────────────────────────────────────┤
//!                      ▼                                          ▼
//!             run action (catch_unwind)                 fire due timers in id order
//!             ack Synchronous callers                   (fixed delay, never backlogged)
//! ```
//!
//! Calls made while already on the presentation thread run inline, so a
//! dispatched callback can dispatch again without deadlocking.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::DispatchError;
use crate::execution::panic_message;

/// How `invoke` waits for the action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Block the caller until the action has run on the presentation thread
    Synchronous,
    /// Queue the action and return immediately
    FireAndForget,
}

/// Identifier of a presentation-thread timer
pub type TimerId = u64;

type UiAction = Box<dyn FnOnce() + Send + 'static>;
type TickFn = Box<dyn FnMut(&mut TimerTick) + Send + 'static>;

enum UiMessage {
    Invoke {
        action: UiAction,
        ack: Option<Sender<Result<(), DispatchError>>>,
    },
    StartTimer {
        id: TimerId,
        interval: Duration,
        tick: TickFn,
    },
    StopTimer(TimerId),
    Shutdown,
}

/// Passed to a timer callback on every tick
#[derive(Debug)]
pub struct TimerTick {
    id: TimerId,
    count: u64,
    stopped: bool,
}

impl TimerTick {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Number of this tick, starting at 1
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Stop the timer; takes effect before any further tick can be scheduled
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Undo a `stop()` issued earlier in the same tick
    pub fn resume(&mut self) {
        self.stopped = false;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Remote control for a running timer
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: TimerId,
    sender: Sender<UiMessage>,
}

impl TimerHandle {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Ask the presentation loop to stop this timer; a no-op if it already stopped
    pub fn stop(&self) {
        let _ = self.sender.send(UiMessage::StopTimer(self.id));
    }
}

struct DispatcherInner {
    name: String,
    sender: Sender<UiMessage>,
    thread_id: ThreadId,
    join: Mutex<Option<JoinHandle<()>>>,
    next_timer: AtomicU64,
}

impl DispatcherInner {
    fn on_ui_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn stop_loop(&self) {
        let _ = self.sender.send(UiMessage::Shutdown);
        if self.on_ui_thread() {
            // The loop exits after the current message; it cannot join itself
            return;
        }
        if let Some(join) = self.join.lock().take() {
            if join.join().is_err() {
                error!(dispatcher = %self.name, "Presentation thread terminated abnormally");
            }
        }
    }
}

impl Drop for DispatcherInner {
    fn drop(&mut self) {
        self.stop_loop();
    }
}

/// Handle to the presentation thread; cheap to clone
///
/// The presentation thread stops when the last handle is dropped, or
/// earlier on [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct UiDispatcher {
    inner: Arc<DispatcherInner>,
}

/// Non-owning handle for callbacks that live on the presentation thread
///
/// Timer callbacks hold this instead of a [`UiDispatcher`] so that they do
/// not keep the presentation thread alive on their own.
#[derive(Clone)]
pub(crate) struct WeakUiDispatcher {
    inner: Weak<DispatcherInner>,
}

impl WeakUiDispatcher {
    pub(crate) fn upgrade(&self) -> Option<UiDispatcher> {
        self.inner.upgrade().map(|inner| UiDispatcher { inner })
    }
}

impl std::fmt::Debug for UiDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiDispatcher")
            .field("name", &self.inner.name)
            .field("thread_id", &self.inner.thread_id)
            .finish()
    }
}

impl UiDispatcher {
    /// Spawn the presentation thread and its event loop
    pub fn spawn(name: &str) -> Result<Self, DispatchError> {
        let (sender, receiver) = channel::unbounded();
        let event_loop = EventLoop {
            name: name.to_string(),
            receiver,
            timers: BTreeMap::new(),
        };

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || event_loop.run())?;
        let thread_id = join.thread().id();

        info!(dispatcher = %name, "Presentation thread started");

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                name: name.to_string(),
                sender,
                thread_id,
                join: Mutex::new(Some(join)),
                next_timer: AtomicU64::new(1),
            }),
        })
    }

    pub(crate) fn downgrade(&self) -> WeakUiDispatcher {
        WeakUiDispatcher {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether the caller is executing on the presentation thread
    pub fn is_ui_thread(&self) -> bool {
        self.inner.on_ui_thread()
    }

    /// Run `action` on the presentation thread
    ///
    /// Runs inline when already on the presentation thread. In `Synchronous`
    /// mode a panic inside the action is reported as
    /// [`DispatchError::ActionPanicked`]; the loop keeps running either way.
    pub fn invoke<F>(&self, action: F, mode: DispatchMode) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_ui_thread() {
            return run_action(Box::new(action));
        }

        match mode {
            DispatchMode::FireAndForget => self
                .inner
                .sender
                .send(UiMessage::Invoke {
                    action: Box::new(action),
                    ack: None,
                })
                .map_err(|_| DispatchError::Disconnected),
            DispatchMode::Synchronous => {
                let (ack_tx, ack_rx) = channel::bounded(1);
                self.inner
                    .sender
                    .send(UiMessage::Invoke {
                        action: Box::new(action),
                        ack: Some(ack_tx),
                    })
                    .map_err(|_| DispatchError::Disconnected)?;
                // A dropped ack means the loop stopped before running the action
                ack_rx.recv().map_err(|_| DispatchError::Disconnected)?
            }
        }
    }

    /// Start a fixed-interval timer whose callback runs on the presentation thread
    ///
    /// The next tick is scheduled `interval` after the previous callback
    /// returns, so ticks never queue up behind a slow callback.
    pub fn start_timer<F>(&self, interval: Duration, tick: F) -> Result<TimerHandle, DispatchError>
    where
        F: FnMut(&mut TimerTick) + Send + 'static,
    {
        let id = self.inner.next_timer.fetch_add(1, Ordering::Relaxed);
        self.inner
            .sender
            .send(UiMessage::StartTimer {
                id,
                interval,
                tick: Box::new(tick),
            })
            .map_err(|_| DispatchError::Disconnected)?;

        Ok(TimerHandle {
            id,
            sender: self.inner.sender.clone(),
        })
    }

    /// Stop the presentation loop after already-queued actions have run
    pub fn shutdown(&self) {
        info!(dispatcher = %self.inner.name, "Presentation thread shutting down");
        self.inner.stop_loop();
    }
}

fn run_action(action: UiAction) -> Result<(), DispatchError> {
    catch_unwind(AssertUnwindSafe(action)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        error!(error = %message, "UI action panicked");
        DispatchError::ActionPanicked(message)
    })
}

struct TimerEntry {
    interval: Duration,
    next_due: Instant,
    ticks: u64,
    tick: TickFn,
}

struct EventLoop {
    name: String,
    receiver: Receiver<UiMessage>,
    timers: BTreeMap<TimerId, TimerEntry>,
}

impl EventLoop {
    fn run(mut self) {
        debug!(dispatcher = %self.name, "Presentation loop running");

        loop {
            let next_due = self.timers.values().map(|timer| timer.next_due).min();
            let received = match next_due {
                Some(deadline) => match self.receiver.recv_deadline(deadline) {
                    Ok(message) => Some(message),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.receiver.recv() {
                    Ok(message) => Some(message),
                    Err(_) => break,
                },
            };

            match received {
                Some(UiMessage::Shutdown) => break,
                Some(message) => self.handle(message),
                None => {}
            }

            self.fire_due_timers();
        }

        if !self.timers.is_empty() {
            warn!(
                dispatcher = %self.name,
                pending_timers = self.timers.len(),
                "Presentation loop stopped with active timers"
            );
        }
        debug!(dispatcher = %self.name, "Presentation loop stopped");
    }

    fn handle(&mut self, message: UiMessage) {
        match message {
            UiMessage::Invoke { action, ack } => {
                let result = run_action(action);
                if let Some(ack) = ack {
                    let _ = ack.send(result);
                }
            }
            UiMessage::StartTimer { id, interval, tick } => {
                debug!(timer_id = id, interval_ms = interval.as_millis() as u64, "Timer started");
                self.timers.insert(
                    id,
                    TimerEntry {
                        interval,
                        next_due: Instant::now() + interval,
                        ticks: 0,
                        tick,
                    },
                );
            }
            UiMessage::StopTimer(id) => {
                if self.timers.remove(&id).is_some() {
                    debug!(timer_id = id, "Timer stopped");
                }
            }
            UiMessage::Shutdown => {}
        }
    }

    fn fire_due_timers(&mut self) {
        let now = Instant::now();
        let due: Vec<TimerId> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.next_due <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            // Removed while ticking: a stopped timer is never rescheduled
            let Some(mut entry) = self.timers.remove(&id) else {
                continue;
            };
            entry.ticks += 1;

            let mut tick = TimerTick {
                id,
                count: entry.ticks,
                stopped: false,
            };
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (entry.tick)(&mut tick))) {
                error!(
                    timer_id = id,
                    error = %panic_message(payload.as_ref()),
                    "Timer callback panicked; timer stopped"
                );
                tick.stopped = true;
            }

            if tick.stopped {
                debug!(timer_id = id, ticks = entry.ticks, "Timer stopped by callback");
            } else {
                entry.next_due = Instant::now() + entry.interval;
                self.timers.insert(id, entry);
            }
        }
    }
}
