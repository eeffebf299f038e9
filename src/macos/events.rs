//! Global hotkey capture through a CGEvent tap
//!
//! The tap callback has no context pointer, so the registry and the action
//! sender live in process globals set once by `install_hotkeys`. The callback
//! only updates key state and enqueues actions; it never runs them.

use super::ffi::{self, *};
use super::keystroke::EVENT_MARKER;
use crate::bridge::Action;
use crate::hotkey::{Hotkey, HotkeyRegistry, KeyOutcome};
use crate::keycodes::*;
use anyhow::{Result, bail};
use libc::c_void;
use std::ptr;
use std::sync::{Mutex, OnceLock};
use tokio::sync::mpsc::UnboundedSender;

const CG_EVENT_KEY_DOWN: u32 = 10;
const CG_EVENT_KEY_UP: u32 = 11;
const CG_EVENT_FLAGS_CHANGED: u32 = 12;
const CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;

const CG_EVENT_FIELD_KEYBOARD_EVENT_KEYCODE: u32 = 9;
const CG_EVENT_FIELD_SOURCE_USER_DATA: u32 = 42;

const CG_SESSION_EVENT_TAP: u32 = 1;
const CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
const CG_EVENT_TAP_OPTION_DEFAULT: u32 = 0;

static REGISTRY: OnceLock<Mutex<HotkeyRegistry>> = OnceLock::new();
static ACTIONS: OnceLock<UnboundedSender<Action>> = OnceLock::new();
static TAP: OnceLock<usize> = OnceLock::new();

fn modifier_is_down(key_code: u16, flags: u64) -> Option<bool> {
    let mask = match key_code {
        KEY_CMD_LEFT | KEY_CMD_RIGHT => MOD_CMD,
        KEY_SHIFT_LEFT | KEY_SHIFT_RIGHT => MOD_SHIFT,
        KEY_OPTION_LEFT | KEY_OPTION_RIGHT => MOD_OPTION,
        KEY_CONTROL_LEFT | KEY_CONTROL_RIGHT => MOD_CONTROL,
        _ => return None,
    };
    Some(flags & mask != 0)
}

fn handle(outcome: KeyOutcome) -> bool {
    if let Some(action) = outcome.action {
        match ACTIONS.get() {
            Some(tx) => {
                if tx.send(action).is_err() {
                    log::error!("Action dispatcher is gone; hotkey dropped");
                }
            }
            None => log::error!("Hotkey fired before the dispatcher was installed"),
        }
    }
    outcome.consume
}

unsafe extern "C" fn key_event_callback(
    _proxy: *mut c_void,
    event_type: u32,
    event: *mut c_void,
    _user_info: *mut c_void,
) -> *mut c_void {
    if event_type == CG_EVENT_TAP_DISABLED_BY_TIMEOUT {
        // macOS turns slow taps off; switch it straight back on
        if let Some(&tap) = TAP.get() {
            unsafe { ffi::CGEventTapEnable(tap as *mut c_void, true) };
            log::warn!("Event tap was disabled by timeout; re-enabled");
        }
        return event;
    }

    // Our own macro keystrokes pass straight through
    if unsafe { CGEventGetIntegerValueField(event, CG_EVENT_FIELD_SOURCE_USER_DATA) } == EVENT_MARKER {
        return event;
    }

    let Some(registry) = REGISTRY.get() else {
        return event;
    };

    let key_code =
        unsafe { CGEventGetIntegerValueField(event, CG_EVENT_FIELD_KEYBOARD_EVENT_KEYCODE) } as u16;

    let outcome = {
        let Ok(mut registry) = registry.lock() else {
            return event;
        };
        match event_type {
            CG_EVENT_KEY_DOWN => registry.key_down(key_code),
            CG_EVENT_KEY_UP => registry.key_up(key_code),
            CG_EVENT_FLAGS_CHANGED => {
                let flags = unsafe { CGEventGetFlags(event) };
                match modifier_is_down(key_code, flags) {
                    Some(true) => registry.key_down(key_code),
                    Some(false) => registry.key_up(key_code),
                    None => return event,
                }
            }
            _ => return event,
        }
    };

    if handle(outcome) {
        ptr::null_mut()
    } else {
        event
    }
}

/// Register hotkeys and attach the keyboard tap to the current run loop
///
/// Call on the main thread, then `run_event_loop`.
pub fn install_hotkeys(hotkeys: Vec<Hotkey>, actions: UnboundedSender<Action>) -> Result<()> {
    let registry = HotkeyRegistry::new(hotkeys);
    for hotkey in registry.hotkeys() {
        log::info!("  {} => {}", hotkey.chord.describe(), hotkey.action_name);
    }
    if REGISTRY.set(Mutex::new(registry)).is_err() {
        bail!("Hotkeys already installed");
    }
    let _ = ACTIONS.set(actions);

    unsafe {
        let event_mask =
            (1 << CG_EVENT_KEY_DOWN) | (1 << CG_EVENT_KEY_UP) | (1 << CG_EVENT_FLAGS_CHANGED);

        let tap = CGEventTapCreate(
            CG_SESSION_EVENT_TAP,
            CG_HEAD_INSERT_EVENT_TAP,
            CG_EVENT_TAP_OPTION_DEFAULT,
            event_mask,
            key_event_callback,
            ptr::null_mut(),
        );

        if tap.is_null() {
            bail!(
                "Failed to create event tap. Grant Input Monitoring and Accessibility \
                 permissions, then restart"
            );
        }
        let _ = TAP.set(tap as usize);

        CGEventTapEnable(tap, true);
        let source = CFMachPortCreateRunLoopSource(ptr::null_mut(), tap, 0);
        CFRunLoopAddSource(CFRunLoopGetCurrent(), source, kCFRunLoopCommonModes);
    }

    log::info!("Keyboard event tap installed");
    Ok(())
}

/// Run the current run loop (blocks forever)
pub fn run_event_loop() {
    unsafe { CFRunLoopRun() }
}
