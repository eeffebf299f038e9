//! Fallback backend for platforms without native window automation.
//! Processes work; windows are never found and key events are refused.

use super::processes::SystemProcesses;
use super::{Desktop, Keyboard, WindowHandle};
use crate::error::DesktopError;
use std::path::Path;

pub struct HeadlessDesktop {
    processes: SystemProcesses,
}

impl HeadlessDesktop {
    pub fn new() -> Self {
        Self {
            processes: SystemProcesses,
        }
    }
}

impl Desktop for HeadlessDesktop {
    fn is_process_running(&self, name: &str) -> bool {
        self.processes.is_running(name)
    }

    fn launch(&self, path: &Path) -> Result<(), DesktopError> {
        self.processes.launch(path)
    }

    fn terminate(&self, name: &str) -> Result<usize, DesktopError> {
        self.processes.terminate(name)
    }

    fn find_window(&self, _title: &str) -> Option<WindowHandle> {
        None
    }

    fn activate(&self, _handle: &WindowHandle) -> bool {
        false
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        None
    }
}

pub struct HeadlessKeyboard;

impl Keyboard for HeadlessKeyboard {
    fn send_chord(&self, _keys: &[String]) -> Result<(), DesktopError> {
        Err(DesktopError::Unsupported("key events"))
    }

    fn type_text(&self, _text: &str) -> Result<(), DesktopError> {
        Err(DesktopError::Unsupported("key events"))
    }
}
