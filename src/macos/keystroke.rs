//! Synthetic key events through CoreGraphics
//!
//! Modifiers are applied as event flags on the regular key's down/up pair,
//! which is how macOS applications expect modified keystrokes. Every posted
//! event carries `EVENT_MARKER` so the hotkey tap lets it through untouched.

use crate::desktop::Keyboard;
use crate::error::DesktopError;
use crate::keycodes::parse_key_chord;
use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, EventField};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use std::time::Duration;

/// Stamped into kCGEventSourceUserData on every event we post
pub const EVENT_MARKER: i64 = 0x5354_5445; // "STTE"

const KEY_HOLD: Duration = Duration::from_millis(10);

pub struct CgKeyboard;

fn event_source() -> Result<CGEventSource, DesktopError> {
    CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|_| DesktopError::Os("failed to create CGEventSource".to_string()))
}

fn post_key(source: &CGEventSource, code: u16, down: bool, flags: u64) -> Result<(), DesktopError> {
    let event = CGEvent::new_keyboard_event(source.clone(), code, down)
        .map_err(|_| DesktopError::Os(format!("failed to create key event for code {}", code)))?;
    event.set_flags(CGEventFlags::from_bits_truncate(flags));
    event.set_integer_value_field(EventField::EVENT_SOURCE_USER_DATA, EVENT_MARKER);
    event.post(CGEventTapLocation::HID);
    Ok(())
}

impl Keyboard for CgKeyboard {
    fn send_chord(&self, keys: &[String]) -> Result<(), DesktopError> {
        let chord = parse_key_chord(keys).map_err(DesktopError::UnknownKey)?;
        let source = event_source()?;

        for &code in &chord.codes {
            post_key(&source, code, true, chord.flags)?;
        }
        std::thread::sleep(KEY_HOLD);
        for &code in chord.codes.iter().rev() {
            post_key(&source, code, false, chord.flags)?;
        }

        log::debug!("Sent chord {}", keys.join("+"));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), DesktopError> {
        let source = event_source()?;
        let mut buf = [0u8; 4];

        // One character per event pair; long unicode strings get truncated by some apps
        for ch in text.chars() {
            let unit = ch.encode_utf8(&mut buf);
            for down in [true, false] {
                let event = CGEvent::new_keyboard_event(source.clone(), 0, down)
                    .map_err(|_| DesktopError::Os("failed to create text event".to_string()))?;
                event.set_string(unit);
                event.set_integer_value_field(EventField::EVENT_SOURCE_USER_DATA, EVENT_MARKER);
                event.post(CGEventTapLocation::HID);
            }
            std::thread::sleep(KEY_HOLD);
        }

        log::debug!("Typed {} characters", text.chars().count());
        Ok(())
    }
}
