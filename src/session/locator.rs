use crate::desktop::{Desktop, WindowHandle};
use crate::error::DesktopError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Process and window queries over a `Desktop` backend
#[derive(Clone)]
pub struct Locator {
    desktop: Arc<dyn Desktop>,
    activation_delay: Duration,
}

impl Locator {
    pub fn new(desktop: Arc<dyn Desktop>, activation_delay: Duration) -> Self {
        Self {
            desktop,
            activation_delay,
        }
    }

    pub fn is_process_running(&self, name: &str) -> bool {
        self.desktop.is_process_running(name)
    }

    pub fn find_window(&self, title: &str) -> Option<WindowHandle> {
        let handle = self.desktop.find_window(title);
        if let Some(handle) = &handle {
            log::debug!("Found window '{}' (pid {}) for '{}'", handle.title, handle.pid, title);
        }
        handle
    }

    /// Request foreground focus, then give the window manager the activation delay.
    /// `false` means the OS refused; callers may retry.
    pub async fn activate(&self, handle: &WindowHandle) -> bool {
        let accepted = self.desktop.activate(handle);
        if !accepted {
            log::debug!("Activation of '{}' refused", handle.title);
        }
        tokio::time::sleep(self.activation_delay).await;
        accepted
    }

    pub fn is_foreground(&self, handle: &WindowHandle) -> bool {
        self.desktop
            .foreground_window()
            .is_some_and(|foreground| foreground.same_window(handle))
    }

    pub fn launch(&self, path: &Path) -> Result<(), DesktopError> {
        self.desktop.launch(path)
    }

    pub fn terminate(&self, name: &str) -> Result<usize, DesktopError> {
        self.desktop.terminate(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{FakeDesktop, window};

    #[tokio::test(start_paused = true)]
    async fn test_activate_waits_delay() {
        let desktop = Arc::new(FakeDesktop::background());
        let locator = Locator::new(desktop.clone(), Duration::from_millis(500));
        let handle = window("Lightroom Classic - Catalog");

        assert!(!locator.is_foreground(&handle));
        let before = tokio::time::Instant::now();
        assert!(locator.activate(&handle).await);
        assert!(before.elapsed() >= Duration::from_millis(500));
        assert!(locator.is_foreground(&handle));
    }

    #[test]
    fn test_foreground_compares_window_identity() {
        let desktop = Arc::new(FakeDesktop::ready());
        let locator = Locator::new(desktop, Duration::ZERO);
        let found = locator.find_window("lightroom").unwrap();
        assert_eq!(found.query, "lightroom");
        assert!(locator.is_foreground(&found));
    }
}
