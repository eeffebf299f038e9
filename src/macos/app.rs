//! Window lookup and focus through NSWorkspace and the Accessibility API
//!
//! Window titles come from `AXWindows`/`AXTitle`, which needs the
//! Accessibility permission. Without it no window is ever found and the focus
//! protocol fails with a timeout rather than an error.

use super::ffi::{self, AxElement};
use crate::desktop::processes::SystemProcesses;
use crate::desktop::{contains_ignore_case, Desktop, WindowHandle};
use crate::error::DesktopError;
use objc2::runtime::AnyObject;
use objc2::{class, msg_send};
use objc2_foundation::NSString;
use std::path::Path;

/// NSApplicationActivationPolicyRegular
const ACTIVATION_POLICY_REGULAR: isize = 0;
/// NSApplicationActivateIgnoringOtherApps
const ACTIVATE_IGNORING_OTHER_APPS: usize = 1 << 1;

pub struct MacDesktop {
    processes: SystemProcesses,
}

impl MacDesktop {
    pub fn new() -> Self {
        if !unsafe { ffi::AXIsProcessTrusted() } {
            log::warn!(
                "Accessibility permission not granted; windows cannot be found. \
                 Enable it in System Settings > Privacy & Security > Accessibility"
            );
        }
        Self {
            processes: SystemProcesses,
        }
    }

    /// PIDs of regular (Dock-visible) apps in NSWorkspace order
    fn regular_app_pids() -> Vec<i32> {
        let mut pids = Vec::new();
        unsafe {
            let workspace: *mut AnyObject = msg_send![class!(NSWorkspace), sharedWorkspace];
            if workspace.is_null() {
                return pids;
            }
            let running_apps: *mut AnyObject = msg_send![workspace, runningApplications];
            if running_apps.is_null() {
                return pids;
            }
            let count: usize = msg_send![running_apps, count];
            for i in 0..count {
                let app: *mut AnyObject = msg_send![running_apps, objectAtIndex: i];
                if app.is_null() {
                    continue;
                }
                let policy: isize = msg_send![app, activationPolicy];
                if policy == ACTIVATION_POLICY_REGULAR {
                    let pid: i32 = msg_send![app, processIdentifier];
                    pids.push(pid);
                }
            }
        }
        pids
    }

    fn find_ax_window(pid: i32, title: &str) -> Option<AxElement> {
        AxElement::application(pid)?
            .element_list_attr("AXWindows")
            .into_iter()
            .find(|window| window.string_attr("AXTitle").as_deref() == Some(title))
    }

    fn activate_app(pid: i32) -> bool {
        unsafe {
            let app: *mut AnyObject = msg_send![
                class!(NSRunningApplication),
                runningApplicationWithProcessIdentifier: pid
            ];
            if app.is_null() {
                return false;
            }

            let name: *mut NSString = msg_send![app, localizedName];
            if !name.is_null() {
                log::debug!("Activating '{}' (pid {})", &*name, pid);
            }

            msg_send![app, activateWithOptions: ACTIVATE_IGNORING_OTHER_APPS]
        }
    }

    fn frontmost_pid() -> Option<i32> {
        unsafe {
            let workspace: *mut AnyObject = msg_send![class!(NSWorkspace), sharedWorkspace];
            if workspace.is_null() {
                return None;
            }
            let app: *mut AnyObject = msg_send![workspace, frontmostApplication];
            if app.is_null() {
                return None;
            }
            let pid: i32 = msg_send![app, processIdentifier];
            Some(pid)
        }
    }
}

impl Desktop for MacDesktop {
    fn is_process_running(&self, name: &str) -> bool {
        self.processes.is_running(name)
    }

    fn launch(&self, path: &Path) -> Result<(), DesktopError> {
        self.processes.launch(path)
    }

    fn terminate(&self, name: &str) -> Result<usize, DesktopError> {
        self.processes.terminate(name)
    }

    fn find_window(&self, title: &str) -> Option<WindowHandle> {
        for pid in Self::regular_app_pids() {
            let Some(app) = AxElement::application(pid) else {
                continue;
            };
            for window in app.element_list_attr("AXWindows") {
                if let Some(window_title) = window.string_attr("AXTitle")
                    && contains_ignore_case(&window_title, title)
                {
                    return Some(WindowHandle {
                        pid: pid as u32,
                        title: window_title,
                        query: title.to_string(),
                    });
                }
            }
        }
        None
    }

    fn activate(&self, handle: &WindowHandle) -> bool {
        let pid = handle.pid as i32;
        let Some(window) = Self::find_ax_window(pid, &handle.title) else {
            log::debug!("Window '{}' vanished before activation", handle.title);
            return false;
        };

        if window.bool_attr("AXMinimized") == Some(true) && !window.set_bool_attr("AXMinimized", false) {
            log::warn!("Could not restore minimized window '{}'", handle.title);
        }

        let raised = window.perform("AXRaise");
        let activated = Self::activate_app(pid);
        if !raised {
            log::debug!("AXRaise refused for '{}'", handle.title);
        }
        activated
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        let pid = Self::frontmost_pid()?;
        let title = AxElement::application(pid)?
            .element_attr("AXFocusedWindow")?
            .string_attr("AXTitle")?;
        Some(WindowHandle {
            pid: pid as u32,
            title,
            query: String::new(),
        })
    }
}
