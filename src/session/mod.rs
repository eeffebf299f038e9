//! Session orchestration engine
//!
//! `Orchestrator` composes focus acquisition, macro playback and the
//! countdown timer under a single guard. Everything below it talks to the OS
//! only through the `Desktop`, `Keyboard` and `Notifier` traits.

pub mod focus;
pub mod locator;
pub mod orchestrator;
pub mod sequence;
pub mod timer;

pub use focus::{FocusPolicy, FocusProtocol, FocusState, TargetApp};
pub use locator::Locator;
pub use orchestrator::Orchestrator;
pub use sequence::{MacroSequence, MacroStep, session_name};
pub use timer::{ReminderSchedule, SessionTimer, TimerState};

use chrono::{DateTime, Local};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Launching,
    Focusing,
    Running,
    Ending,
    Expired,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Launching => "launching",
            SessionState::Focusing => "focusing",
            SessionState::Running => "running",
            SessionState::Ending => "ending",
            SessionState::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// The active session, owned by the orchestrator guard
#[derive(Debug, Clone)]
pub struct Session {
    pub id: u64,
    pub minutes: u32,
    pub state: SessionState,
    pub started_at: DateTime<Local>,
    /// Set once the tethering macro has typed it
    pub name: Option<String>,
}

impl Session {
    pub fn new(id: u64, minutes: u32) -> Self {
        Self {
            id,
            minutes,
            state: SessionState::Launching,
            started_at: Local::now(),
            name: None,
        }
    }
}

/// Point-in-time view for status reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub minutes: u32,
    pub remaining_seconds: u32,
    pub name: Option<String>,
    pub started_at: Option<DateTime<Local>>,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            minutes: 0,
            remaining_seconds: 0,
            name: None,
            started_at: None,
        }
    }
}

impl fmt::Display for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            SessionState::Idle => write!(f, "No active session"),
            SessionState::Running => write!(
                f,
                "Session {} running: {} remaining of {} min",
                self.name.as_deref().unwrap_or("?"),
                crate::events::format_clock(self.remaining_seconds),
                self.minutes
            ),
            state => match self.started_at {
                Some(at) => write!(
                    f,
                    "Session {} ({} min, triggered at {})",
                    state,
                    self.minutes,
                    at.format("%H:%M:%S")
                ),
                None => write!(f, "Session {} ({} min)", state, self.minutes),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable fakes for the OS seams

    use crate::desktop::{Desktop, Keyboard, WindowHandle};
    use crate::error::DesktopError;
    use crate::notifier::{Cue, Notifier};
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub fn window(title: &str) -> WindowHandle {
        WindowHandle {
            pid: 4242,
            title: title.to_string(),
            query: String::new(),
        }
    }

    #[derive(Default)]
    pub struct FakeDesktop {
        pub running: AtomicBool,
        pub launch_fails: AtomicBool,
        /// activate() moves the window to the foreground
        pub focusable: AtomicBool,
        /// find_window only succeeds from this call number on (1-based)
        pub window_from_call: AtomicUsize,
        pub window: Mutex<Option<WindowHandle>>,
        pub foreground: Mutex<Option<WindowHandle>>,
        pub launches: AtomicUsize,
        pub find_calls: AtomicUsize,
        pub activate_calls: AtomicUsize,
        pub terminate_calls: AtomicUsize,
    }

    impl FakeDesktop {
        /// Running, window present and already in the foreground
        pub fn ready() -> Self {
            let desktop = Self::default();
            desktop.running.store(true, Ordering::SeqCst);
            desktop.focusable.store(true, Ordering::SeqCst);
            let handle = window("Lightroom Classic - Catalog");
            *desktop.window.lock().unwrap() = Some(handle.clone());
            *desktop.foreground.lock().unwrap() = Some(handle);
            desktop
        }

        /// Running, window present but some other app has focus
        pub fn background() -> Self {
            let desktop = Self::ready();
            *desktop.foreground.lock().unwrap() = Some(WindowHandle {
                pid: 1,
                title: "Finder".into(),
                query: String::new(),
            });
            desktop
        }

        /// Running but never shows a window
        pub fn windowless() -> Self {
            let desktop = Self::default();
            desktop.running.store(true, Ordering::SeqCst);
            desktop
        }

        pub fn count(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    impl Desktop for FakeDesktop {
        fn is_process_running(&self, _name: &str) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn launch(&self, _path: &Path) -> Result<(), DesktopError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            if self.launch_fails.load(Ordering::SeqCst) {
                return Err(DesktopError::Os("spawn refused".into()));
            }
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn terminate(&self, _name: &str) -> Result<usize, DesktopError> {
            self.terminate_calls.fetch_add(1, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
            Ok(1)
        }

        fn find_window(&self, title: &str) -> Option<WindowHandle> {
            let call = self.find_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.window_from_call.load(Ordering::SeqCst) {
                return None;
            }
            self.window.lock().unwrap().clone().map(|mut handle| {
                handle.query = title.to_string();
                handle
            })
        }

        fn activate(&self, handle: &WindowHandle) -> bool {
            self.activate_calls.fetch_add(1, Ordering::SeqCst);
            if self.focusable.load(Ordering::SeqCst) {
                *self.foreground.lock().unwrap() = Some(handle.clone());
                true
            } else {
                false
            }
        }

        fn foreground_window(&self) -> Option<WindowHandle> {
            self.foreground.lock().unwrap().clone()
        }
    }

    /// Records key events as `chord:a+b` / `type:text`
    #[derive(Default)]
    pub struct FakeKeyboard {
        pub sent: Mutex<Vec<String>>,
        /// Fail the n-th event (0-based)
        pub fail_at: Option<usize>,
    }

    impl FakeKeyboard {
        fn record(&self, entry: String) -> Result<(), DesktopError> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_at == Some(sent.len()) {
                return Err(DesktopError::Os("event rejected".into()));
            }
            sent.push(entry);
            Ok(())
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Keyboard for FakeKeyboard {
        fn send_chord(&self, keys: &[String]) -> Result<(), DesktopError> {
            self.record(format!("chord:{}", keys.join("+")))
        }

        fn type_text(&self, text: &str) -> Result<(), DesktopError> {
            self.record(format!("type:{}", text))
        }
    }

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub cues: Mutex<Vec<Cue>>,
    }

    impl RecordingNotifier {
        pub fn cues(&self) -> Vec<Cue> {
            self.cues.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn play(&self, cue: Cue) {
            self.cues.lock().unwrap().push(cue);
        }
    }
}
