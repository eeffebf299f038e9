//! OS seams: processes, windows and synthetic key events
//!
//! The session engine only talks to these traits. `system()` returns the
//! native backend for the current platform; tests supply fakes.

pub mod processes;

#[cfg(not(target_os = "macos"))]
mod headless;

use crate::error::DesktopError;
use std::path::Path;
use std::sync::Arc;

/// A top-level window found by title.
///
/// Handles go stale when the target app restarts, so callers re-resolve them
/// instead of caching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHandle {
    pub pid: u32,
    pub title: String,
    /// Substring the window was looked up with
    pub query: String,
}

impl WindowHandle {
    /// Same OS window, regardless of how it was looked up
    pub fn same_window(&self, other: &WindowHandle) -> bool {
        self.pid == other.pid && self.title == other.title
    }
}

pub trait Desktop: Send + Sync {
    /// Case-insensitive substring match over running process names
    fn is_process_running(&self, name: &str) -> bool;

    fn launch(&self, path: &Path) -> Result<(), DesktopError>;

    /// Terminate every process whose name contains `name`; returns how many were signalled
    fn terminate(&self, name: &str) -> Result<usize, DesktopError>;

    /// First window, in OS order, whose title contains `title` (case-insensitive)
    fn find_window(&self, title: &str) -> Option<WindowHandle>;

    /// Restore if minimized and request foreground; false if the OS refused
    fn activate(&self, handle: &WindowHandle) -> bool;

    fn foreground_window(&self) -> Option<WindowHandle>;
}

pub trait Keyboard: Send + Sync {
    /// Press and release a chord such as `["ctrl", "alt", "1"]`
    fn send_chord(&self, keys: &[String]) -> Result<(), DesktopError>;

    /// Type literal text into the focused control
    fn type_text(&self, text: &str) -> Result<(), DesktopError>;
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Native backend for this platform
#[cfg(target_os = "macos")]
pub fn system() -> (Arc<dyn Desktop>, Arc<dyn Keyboard>) {
    let desktop = Arc::new(crate::macos::MacDesktop::new());
    let keyboard = Arc::new(crate::macos::keystroke::CgKeyboard);
    (desktop, keyboard)
}

/// Native backend for this platform
#[cfg(not(target_os = "macos"))]
pub fn system() -> (Arc<dyn Desktop>, Arc<dyn Keyboard>) {
    log::warn!("No native window backend on this platform; window focus and key events are unavailable");
    (Arc::new(headless::HeadlessDesktop::new()), Arc::new(headless::HeadlessKeyboard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Adobe Photoshop Lightroom Classic", "lightroom"));
        assert!(contains_ignore_case("Lightroom.exe", "LIGHTROOM.EXE"));
        assert!(!contains_ignore_case("Finder", "Lightroom"));
    }

    #[test]
    fn test_same_window_ignores_query() {
        let a = WindowHandle {
            pid: 10,
            title: "Lightroom Classic".into(),
            query: "Lightroom".into(),
        };
        let b = WindowHandle {
            query: String::new(),
            ..a.clone()
        };
        assert!(a.same_window(&b));
        assert!(!a.same_window(&WindowHandle { pid: 11, ..b }));
    }
}
