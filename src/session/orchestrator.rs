//! Session lifecycle under a single guard
//!
//! The guard holds the active session. `start` claims it synchronously and
//! hands the slow part (focus, macro, timer) to a worker task, so a second
//! `start` is rejected at once instead of queuing. Lock order is guard then
//! timer; the timer never takes the guard while holding its own lock.

use super::focus::{FocusProtocol, FocusState};
use super::locator::Locator;
use super::sequence::session_name;
use super::timer::SessionTimer;
use super::{Session, SessionSnapshot, SessionState};
use crate::archive;
use crate::config::StudioConfig;
use crate::desktop::{Desktop, Keyboard, WindowHandle};
use crate::error::{ArchiveError, FocusError, SessionError};
use crate::events::{EventBus, SessionEvent};
use crate::notifier::{Cue, Notifier};
use chrono::Local;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Guard {
    active: Option<Session>,
    last_id: u64,
}

struct Inner {
    config: Arc<StudioConfig>,
    locator: Locator,
    keyboard: Arc<dyn Keyboard>,
    notifier: Arc<dyn Notifier>,
    events: EventBus,
    timer: SessionTimer,
    guard: Mutex<Guard>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<StudioConfig>,
        desktop: Arc<dyn Desktop>,
        keyboard: Arc<dyn Keyboard>,
        notifier: Arc<dyn Notifier>,
        events: EventBus,
    ) -> Self {
        let locator = Locator::new(desktop, config.focus.activation_delay);
        let timer = SessionTimer::new(config.reminders.clone(), notifier.clone(), events.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                locator,
                keyboard,
                notifier,
                events,
                timer,
                guard: Mutex::new(Guard::default()),
            }),
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    fn guard(&self) -> MutexGuard<'_, Guard> {
        self.inner.guard.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the session slot and run focus, macro and timer on a worker.
    ///
    /// Returns `AlreadyActive` immediately, with no side effects, if a session
    /// is in progress. The worker's result says how the workflow ended.
    pub fn start(
        &self,
        minutes: u32,
    ) -> Result<JoinHandle<Result<String, SessionError>>, SessionError> {
        if minutes == 0 {
            return Err(SessionError::InvalidDuration(minutes));
        }

        let id = {
            let mut guard = self.guard();
            if guard.active.is_some() {
                return Err(SessionError::AlreadyActive);
            }
            guard.last_id += 1;
            let id = guard.last_id;
            guard.active = Some(Session::new(id, minutes));
            id
        };

        log::info!("Starting session #{} ({} min)", id, minutes);
        self.inner
            .events
            .publish(SessionEvent::status(format!("Preparing {} min session...", minutes)));

        let this = self.clone();
        Ok(tokio::spawn(async move { this.run_start(id, minutes).await }))
    }

    async fn run_start(&self, id: u64, minutes: u32) -> Result<String, SessionError> {
        let result = match self.start_workflow(id, minutes).await {
            Err(e) if !matches!(e, SessionError::Superseded) && !self.is_current(id) => {
                log::debug!("Session #{} setup error after end: {}", id, e);
                Err(SessionError::Superseded)
            }
            result => result,
        };

        if let Err(e) = &result {
            match e {
                SessionError::Superseded => log::info!("Session #{} was ended during setup", id),
                e => {
                    let kind = match e {
                        SessionError::Focus(f) if f.is_timeout() => "focus timeout",
                        SessionError::Focus(_) => "launch failure",
                        _ => "error",
                    };
                    log::error!("Session #{} failed to start ({}): {}", id, kind, e);
                    self.release(id);
                    self.inner.events.publish(SessionEvent::Failed {
                        reason: e.to_string(),
                    });
                }
            }
        }
        result
    }

    async fn start_workflow(&self, id: u64, minutes: u32) -> Result<String, SessionError> {
        let inner = &self.inner;

        self.focus(|state| {
            let session_state = match state {
                FocusState::Launching => SessionState::Launching,
                _ => SessionState::Focusing,
            };
            self.set_state(id, session_state);
        })
        .await?;

        if !self.is_current(id) {
            return Err(SessionError::Superseded);
        }

        let name = session_name(Local::now());
        inner.config.tether_macro.play(inner.keyboard.as_ref(), &name).await?;

        {
            let mut guard = self.guard();
            let session = match guard.active.as_mut() {
                Some(session) if session.id == id => session,
                _ => return Err(SessionError::Superseded),
            };
            session.state = SessionState::Running;
            session.name = Some(name.clone());

            let this = self.clone();
            inner
                .timer
                .start_with_hook(minutes, move || this.on_expired(id));
        }

        inner.notifier.play(Cue::Start);
        inner.events.publish(SessionEvent::Started {
            session_name: name.clone(),
            minutes,
        });
        log::info!("Session {} running", name);
        Ok(format!("Session {} started ({} min)", name, minutes))
    }

    async fn focus<F>(&self, observer: F) -> Result<WindowHandle, FocusError>
    where
        F: FnMut(FocusState),
    {
        let config = &self.inner.config;
        FocusProtocol::new(&self.inner.locator, &config.target, &config.focus)
            .acquire(observer)
            .await
    }

    fn is_current(&self, id: u64) -> bool {
        self.guard().active.as_ref().is_some_and(|s| s.id == id)
    }

    fn set_state(&self, id: u64, state: SessionState) {
        if let Some(session) = self.guard().active.as_mut().filter(|s| s.id == id) {
            session.state = state;
        }
    }

    /// Clear the slot if it still belongs to `id`
    fn release(&self, id: u64) -> Option<Session> {
        let mut guard = self.guard();
        if guard.active.as_ref().is_some_and(|s| s.id == id) {
            guard.active.take()
        } else {
            None
        }
    }

    fn on_expired(&self, id: u64) {
        if let Some(mut session) = self.release(id) {
            session.state = SessionState::Expired;
            log::info!(
                "Session {} expired after {} min",
                session.name.as_deref().unwrap_or("?"),
                session.minutes
            );
        }
    }

    /// Stop the timer, free the slot, play the end cue and quit the target app.
    ///
    /// Idle is reported as `NotActive` and touches nothing. Termination and
    /// export cleanup are best-effort.
    pub async fn end(&self) -> Result<String, SessionError> {
        let inner = &self.inner;

        let mut session = {
            let mut guard = self.guard();
            let Some(session) = guard.active.take() else {
                return Err(SessionError::NotActive);
            };
            inner.timer.stop();
            session
        };
        session.state = SessionState::Ending;
        log::info!("Ending session #{}", session.id);

        inner.notifier.play(Cue::End);
        inner.events.publish(SessionEvent::Ended);

        let process = &inner.config.target.process_name;
        match inner.locator.terminate(process) {
            Ok(0) => log::info!("'{}' was not running", process),
            Ok(count) => log::info!("Terminated {} '{}' process(es)", count, process),
            Err(e) => log::warn!("Could not terminate '{}': {}", process, e),
        }

        let exports = &inner.config.exports;
        if exports.clear_on_end {
            let exports = exports.clone();
            let cleared = tokio::task::spawn_blocking(move || {
                archive::clear_exports(&exports.source_dir, &exports.archive_dir, &exports.archive_prefix)
            })
            .await;
            if let Err(e) = cleared {
                log::warn!("Export cleanup did not finish: {}", e);
            }
        }

        Ok("Session ended".to_string())
    }

    /// Focus the target and play the export macro
    pub async fn export_all(&self) -> Result<String, SessionError> {
        let inner = &self.inner;
        self.focus(|_| {}).await?;

        let name = self
            .guard()
            .active
            .as_ref()
            .and_then(|s| s.name.clone())
            .unwrap_or_default();
        inner.config.export_macro.play(inner.keyboard.as_ref(), &name).await?;
        Ok("Export started".to_string())
    }

    /// Zip the export folder into a timestamped archive
    pub async fn compress_exports(&self) -> Result<PathBuf, ArchiveError> {
        let exports = self.inner.config.exports.clone();
        tokio::task::spawn_blocking(move || {
            archive::compress_dir(
                &exports.source_dir,
                &exports.archive_dir,
                &exports.archive_prefix,
                Local::now(),
            )
        })
        .await
        .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?
    }

    pub fn status(&self) -> SessionSnapshot {
        let guard = self.guard();
        match guard.active.as_ref() {
            Some(session) => SessionSnapshot {
                state: session.state,
                minutes: session.minutes,
                remaining_seconds: match session.state {
                    SessionState::Running => self.inner.timer.remaining_seconds(),
                    _ => session.minutes.saturating_mul(60),
                },
                name: session.name.clone(),
                started_at: Some(session.started_at),
            },
            None => SessionSnapshot::idle(),
        }
    }
}
