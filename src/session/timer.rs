//! Session countdown with one-shot reminders
//!
//! A spawned task ticks once per second. Each tick decrements the remaining
//! seconds, publishes `Tick`, and fires the reminder for a threshold when
//! exactly that many whole minutes remain. Thresholds fire at most once per run; `stop` is terminal
//! for the run and suppresses expiry.

use crate::events::{EventBus, SessionEvent};
use crate::notifier::{Cue, Notifier};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{Instant, interval_at};

/// Remaining-minute threshold -> cue
pub type ReminderSchedule = BTreeMap<u32, Cue>;

pub fn default_reminders() -> ReminderSchedule {
    BTreeMap::from([(15, Cue::End15Min), (5, Cue::End5Min)])
}

pub fn reminder_message(minutes: u32) -> String {
    if minutes == 1 {
        "1 minute remaining".to_string()
    } else {
        format!("{} minutes remaining", minutes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Stopped,
    Expired,
}

#[derive(Debug)]
struct Inner {
    state: TimerState,
    remaining: u32,
    fired: BTreeSet<u32>,
    /// Bumped on every start so a stale tick task retires itself
    generation: u64,
}

#[derive(Clone)]
pub struct SessionTimer {
    inner: Arc<Mutex<Inner>>,
    schedule: Arc<ReminderSchedule>,
    notifier: Arc<dyn Notifier>,
    events: EventBus,
    tick: Duration,
}

impl SessionTimer {
    pub fn new(schedule: ReminderSchedule, notifier: Arc<dyn Notifier>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: TimerState::Idle,
                remaining: 0,
                fired: BTreeSet::new(),
                generation: 0,
            })),
            schedule: Arc::new(schedule),
            notifier,
            events,
            tick: Duration::from_secs(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner holds plain counters, a poisoned lock is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> TimerState {
        self.lock().state
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.lock().remaining
    }

    /// Start counting down; false (and nothing changes) if already running
    pub fn start(&self, minutes: u32) -> bool {
        self.start_with_hook(minutes, || {})
    }

    /// Like `start`, calling `on_expired` once if the countdown reaches zero
    pub fn start_with_hook<F>(&self, minutes: u32, on_expired: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = {
            let mut inner = self.lock();
            if inner.state == TimerState::Running {
                log::debug!("Timer already running, ignoring start");
                return false;
            }
            inner.state = TimerState::Running;
            inner.remaining = minutes.saturating_mul(60);
            inner.fired.clear();
            inner.generation += 1;
            inner.generation
        };

        log::info!("Timer started: {} min", minutes);
        let timer = self.clone();
        tokio::spawn(async move { timer.run(generation, on_expired).await });
        true
    }

    /// Stop a running countdown; no expiry and no further reminders
    pub fn stop(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != TimerState::Running {
            return false;
        }
        inner.state = TimerState::Stopped;
        log::info!("Timer stopped with {} s left", inner.remaining);
        true
    }

    async fn run<F>(self, generation: u64, on_expired: F)
    where
        F: FnOnce(),
    {
        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);

        loop {
            ticker.tick().await;

            let expired = {
                let mut inner = self.lock();
                if inner.generation != generation || inner.state != TimerState::Running {
                    return;
                }

                inner.remaining = inner.remaining.saturating_sub(1);
                let remaining = inner.remaining;
                self.events.publish(SessionEvent::Tick {
                    remaining_seconds: remaining,
                });

                // Thresholds land on whole minutes: 900 s left is 15, 899 s is not
                let minutes = remaining / 60;
                let cue = match remaining % 60 {
                    0 if remaining > 0 => self.schedule.get(&minutes).copied(),
                    _ => None,
                };
                if let Some(cue) = cue {
                    if inner.fired.insert(minutes) {
                        log::info!("Reminder: {} min left ({} s)", minutes, remaining);
                        self.notifier.play(cue);
                        self.events.publish(SessionEvent::Reminder {
                            minutes,
                            message: reminder_message(minutes),
                        });
                    }
                }

                if remaining == 0 {
                    inner.state = TimerState::Expired;
                }
                remaining == 0
            };

            if expired {
                log::info!("Session time is over");
                self.notifier.play(Cue::End);
                self.events.publish(SessionEvent::Expired);
                on_expired();
                return;
            }
        }
    }
}
