//! Focus acquisition: make sure the target app runs and owns keyboard focus
//!
//! CheckRunning -> (Launching) -> WaitingForWindow -> Activating -> Focused,
//! with every wait bounded. The window is re-resolved on each activation
//! attempt since handles go stale if the app restarts in between.

use super::locator::Locator;
use crate::desktop::WindowHandle;
use crate::error::FocusError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;

/// What to focus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetApp {
    /// Substring of the process name
    pub process_name: String,
    /// Substring of the main window title
    pub window_title: String,
    pub executable: Option<PathBuf>,
}

/// Delays and retry ceilings for focus acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusPolicy {
    pub poll_interval: Duration,
    pub window_poll_retries: u32,
    pub settle_delay: Duration,
    pub focus_retries: u32,
    pub focus_backoff: Duration,
    pub activation_delay: Duration,
}

impl Default for FocusPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1500),
            window_poll_retries: 20,
            settle_delay: Duration::from_secs(5),
            focus_retries: 10,
            focus_backoff: Duration::from_millis(800),
            activation_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    CheckRunning,
    Launching,
    WaitingForWindow,
    Activating,
    Focused,
    Failed,
}

pub struct FocusProtocol<'a> {
    locator: &'a Locator,
    target: &'a TargetApp,
    policy: &'a FocusPolicy,
}

impl<'a> FocusProtocol<'a> {
    pub fn new(locator: &'a Locator, target: &'a TargetApp, policy: &'a FocusPolicy) -> Self {
        Self {
            locator,
            target,
            policy,
        }
    }

    /// Run the protocol to completion, reporting each state to `observer`
    pub async fn acquire<F>(&self, mut observer: F) -> Result<WindowHandle, FocusError>
    where
        F: FnMut(FocusState),
    {
        let result = self.run(&mut observer).await;
        match &result {
            Ok(handle) => {
                log::info!("'{}' has focus", handle.title);
                observer(FocusState::Focused);
            }
            Err(e) => {
                log::warn!("Focus acquisition failed: {}", e);
                observer(FocusState::Failed);
            }
        }
        result
    }

    async fn run<F>(&self, observer: &mut F) -> Result<WindowHandle, FocusError>
    where
        F: FnMut(FocusState),
    {
        observer(FocusState::CheckRunning);
        let launched = if self.locator.is_process_running(&self.target.process_name) {
            false
        } else {
            observer(FocusState::Launching);
            self.launch()?;
            true
        };

        observer(FocusState::WaitingForWindow);
        let handle = self.wait_for_window(launched).await?;

        observer(FocusState::Activating);
        self.activate(handle).await
    }

    fn launch(&self) -> Result<(), FocusError> {
        let path = match self.target.executable.as_deref() {
            Some(path) if path_is_launchable(path) => path,
            _ => return Err(FocusError::InvalidExecutablePath(self.target.executable.clone())),
        };

        log::info!("'{}' not running, launching {}", self.target.process_name, path.display());
        self.locator
            .launch(path)
            .map_err(|e| FocusError::LaunchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    async fn wait_for_window(&self, launched: bool) -> Result<WindowHandle, FocusError> {
        let attempts = self.policy.window_poll_retries.max(1);
        let query = &self.target.window_title;

        for attempt in 1..=attempts {
            if let Some(handle) = self.locator.find_window(query) {
                // A fresh window still has its UI loading
                if launched || attempt > 1 {
                    log::info!("Window appeared, settling for {:?}", self.policy.settle_delay);
                    sleep(self.policy.settle_delay).await;
                }
                return Ok(handle);
            }

            log::debug!("Waiting for window '{}' ({}/{})", query, attempt, attempts);
            if attempt < attempts {
                sleep(self.policy.poll_interval).await;
            }
        }

        Err(FocusError::WindowNotFound {
            query: query.clone(),
            attempts,
        })
    }

    async fn activate(&self, first: WindowHandle) -> Result<WindowHandle, FocusError> {
        let attempts = self.policy.focus_retries.max(1);
        let mut title = first.title.clone();

        for attempt in 1..=attempts {
            let Some(handle) = self.locator.find_window(&self.target.window_title) else {
                log::debug!("Window '{}' disappeared, retrying ({}/{})", title, attempt, attempts);
                sleep(self.policy.focus_backoff).await;
                continue;
            };
            title.clone_from(&handle.title);

            if self.locator.is_foreground(&handle) {
                return Ok(handle);
            }

            self.locator.activate(&handle).await;
            sleep(self.policy.focus_backoff).await;

            if self.locator.is_foreground(&handle) {
                return Ok(handle);
            }
            log::debug!("'{}' not in foreground yet ({}/{})", title, attempt, attempts);
        }

        Err(FocusError::FocusNotObtained { title, attempts })
    }
}

fn path_is_launchable(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::FakeDesktop;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use tokio::time::Instant;

    fn target(executable: Option<PathBuf>) -> TargetApp {
        TargetApp {
            process_name: "Lightroom".into(),
            window_title: "Lightroom".into(),
            executable,
        }
    }

    fn fast_policy() -> FocusPolicy {
        FocusPolicy {
            window_poll_retries: 4,
            focus_retries: 3,
            ..FocusPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_focused_is_immediate() {
        let desktop = Arc::new(FakeDesktop::ready());
        let locator = Locator::new(desktop.clone(), Duration::from_millis(500));
        let target = target(None);
        let policy = FocusPolicy::default();

        let mut states = Vec::new();
        let start = Instant::now();
        let handle = FocusProtocol::new(&locator, &target, &policy)
            .acquire(|s| states.push(s))
            .await
            .unwrap();

        assert_eq!(handle.title, "Lightroom Classic - Catalog");
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(FakeDesktop::count(&desktop.activate_calls), 0);
        assert_eq!(
            states,
            vec![
                FocusState::CheckRunning,
                FocusState::WaitingForWindow,
                FocusState::Activating,
                FocusState::Focused
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_window_gets_activated() {
        let desktop = Arc::new(FakeDesktop::background());
        let locator = Locator::new(desktop.clone(), Duration::from_millis(500));
        let target = target(None);
        let policy = FocusPolicy::default();

        FocusProtocol::new(&locator, &target, &policy)
            .acquire(|_| {})
            .await
            .unwrap();
        assert_eq!(FakeDesktop::count(&desktop.activate_calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_window_times_out_after_ceiling() {
        let desktop = Arc::new(FakeDesktop::windowless());
        let locator = Locator::new(desktop.clone(), Duration::ZERO);
        let target = target(None);
        let policy = fast_policy();

        let start = Instant::now();
        let err = FocusProtocol::new(&locator, &target, &policy)
            .acquire(|_| {})
            .await
            .unwrap_err();

        assert_eq!(
            err,
            FocusError::WindowNotFound {
                query: "Lightroom".into(),
                attempts: 4
            }
        );
        assert!(err.is_timeout());
        assert_eq!(FakeDesktop::count(&desktop.find_calls), 4);
        // Three intervals between four polls
        assert_eq!(start.elapsed(), Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_refused_reports_not_obtained() {
        let desktop = Arc::new(FakeDesktop::background());
        desktop.focusable.store(false, Ordering::SeqCst);
        let locator = Locator::new(desktop.clone(), Duration::ZERO);
        let target = target(None);
        let policy = fast_policy();

        let err = FocusProtocol::new(&locator, &target, &policy)
            .acquire(|_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, FocusError::FocusNotObtained { attempts: 3, .. }));
        assert_eq!(FakeDesktop::count(&desktop.activate_calls), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_running_without_executable() {
        let desktop = Arc::new(FakeDesktop::default());
        let locator = Locator::new(desktop.clone(), Duration::ZERO);
        let policy = FocusPolicy::default();

        for executable in [None, Some(PathBuf::from("/no/such/Lightroom.exe"))] {
            let target = target(executable.clone());
            let err = FocusProtocol::new(&locator, &target, &policy)
                .acquire(|_| {})
                .await
                .unwrap_err();
            assert_eq!(err, FocusError::InvalidExecutablePath(executable));
            assert!(err.is_launch_failure());
        }
        assert_eq!(FakeDesktop::count(&desktop.launches), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failure_is_distinguished() {
        let exe = tempfile::NamedTempFile::new().unwrap();
        let desktop = Arc::new(FakeDesktop::default());
        desktop.launch_fails.store(true, Ordering::SeqCst);
        let locator = Locator::new(desktop.clone(), Duration::ZERO);
        let target = target(Some(exe.path().to_path_buf()));
        let policy = FocusPolicy::default();

        let err = FocusProtocol::new(&locator, &target, &policy)
            .acquire(|_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, FocusError::LaunchFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_launched_app_settles_before_activation() {
        let exe = tempfile::NamedTempFile::new().unwrap();
        let desktop = Arc::new(FakeDesktop::ready());
        desktop.running.store(false, Ordering::SeqCst);
        desktop.window_from_call.store(3, Ordering::SeqCst);
        let locator = Locator::new(desktop.clone(), Duration::ZERO);
        let target = target(Some(exe.path().to_path_buf()));
        let policy = FocusPolicy::default();

        let mut states = Vec::new();
        let start = Instant::now();
        FocusProtocol::new(&locator, &target, &policy)
            .acquire(|s| states.push(s))
            .await
            .unwrap();

        assert_eq!(FakeDesktop::count(&desktop.launches), 1);
        assert!(states.contains(&FocusState::Launching));
        // Two poll intervals, then the settle delay
        assert_eq!(start.elapsed(), Duration::from_millis(3000) + Duration::from_secs(5));
    }
}
