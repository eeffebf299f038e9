//! Process presence, launch and termination through sysinfo
//!
//! Shared by every platform backend. Lookups refresh only the process list
//! (no CPU, memory or command-line data).

use super::contains_ignore_case;
use crate::error::DesktopError;
use std::path::Path;
use std::process::{Command, Stdio};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, Signal, System};

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl SystemProcesses {
    fn snapshot() -> System {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );
        system
    }

    /// Never fails: without process-listing support everything is "not running"
    pub fn is_running(&self, name: &str) -> bool {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            log::debug!("Process listing unsupported; treating '{}' as not running", name);
            return false;
        }

        Self::snapshot()
            .processes()
            .values()
            .any(|p| contains_ignore_case(&p.name().to_string_lossy(), name))
    }

    /// Start the executable detached; `.app` bundles go through `open -a`
    pub fn launch(&self, path: &Path) -> Result<(), DesktopError> {
        let mut command = if is_app_bundle(path) {
            let mut open = Command::new("open");
            open.arg("-a").arg(path);
            open
        } else {
            Command::new(path)
        };

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DesktopError::Os(e.to_string()))?;

        log::info!("Launched {} (pid {})", path.display(), child.id());

        // Reap the child whenever it exits so it never lingers as a zombie
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }

    /// Ask every matching process to quit, falling back to a hard kill
    pub fn terminate(&self, name: &str) -> Result<usize, DesktopError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(DesktopError::Unsupported("process termination"));
        }

        let system = Self::snapshot();
        let mut signalled = 0;
        let mut failures = Vec::new();

        for (pid, process) in system.processes() {
            let process_name = process.name().to_string_lossy();
            if !contains_ignore_case(&process_name, name) {
                continue;
            }

            let ok = match process.kill_with(Signal::Term) {
                Some(sent) => sent,
                None => process.kill(),
            };

            if ok {
                log::info!("Terminated {} (pid {})", process_name, pid);
                signalled += 1;
            } else {
                failures.push(format!("{} (pid {})", process_name, pid));
            }
        }

        if !failures.is_empty() && signalled == 0 {
            return Err(DesktopError::Os(format!(
                "could not terminate {}",
                failures.join(", ")
            )));
        }
        for failure in failures {
            log::warn!("Could not terminate {}", failure);
        }
        Ok(signalled)
    }
}

fn is_app_bundle(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("app"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_process_not_running() {
        let processes = SystemProcesses;
        assert!(!processes.is_running("no-such-process-studio-tether-test"));
    }

    #[test]
    fn test_terminate_without_match_signals_nothing() {
        let processes = SystemProcesses;
        if sysinfo::IS_SUPPORTED_SYSTEM {
            assert_eq!(processes.terminate("no-such-process-studio-tether-test"), Ok(0));
        }
    }

    #[test]
    fn test_app_bundle_detection() {
        assert!(is_app_bundle(Path::new("/Applications/Adobe Lightroom Classic.app")));
        assert!(!is_app_bundle(Path::new("C:/Program Files/Lightroom.exe")));
    }

    #[test]
    fn test_launch_missing_binary_fails() {
        let err = SystemProcesses
            .launch(Path::new("/definitely/not/here/lightroom"))
            .unwrap_err();
        assert!(matches!(err, DesktopError::Os(_)));
    }
}
