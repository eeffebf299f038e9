//! Timed key macros
//!
//! A macro is data: an ordered list of steps with a fixed delay after each
//! event. Nothing is verified between steps, the target app gets exactly the
//! delays in the table. The built-in tables reproduce the menu offsets of the
//! Lightroom build the studio runs and can be replaced from the config file.

use crate::desktop::Keyboard;
use crate::error::{DesktopError, MacroError};
use crate::keycodes::parse_key_chord;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Placeholder in `type` steps replaced by the generated session name
pub const SESSION_NAME_PLACEHOLDER: &str = "{session_name}";

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MacroStep {
    Chord {
        keys: Vec<String>,
        #[serde(default = "one")]
        repeat: u32,
        #[serde(default)]
        delay_ms: u64,
    },
    Type {
        text: String,
        #[serde(default)]
        delay_ms: u64,
    },
    Wait {
        delay_ms: u64,
    },
}

impl MacroStep {
    pub fn chord(keys: &[&str], delay_ms: u64) -> Self {
        Self::chord_repeat(keys, 1, delay_ms)
    }

    pub fn chord_repeat(keys: &[&str], repeat: u32, delay_ms: u64) -> Self {
        MacroStep::Chord {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            repeat,
            delay_ms,
        }
    }

    pub fn text(text: &str, delay_ms: u64) -> Self {
        MacroStep::Type {
            text: text.to_string(),
            delay_ms,
        }
    }

    pub fn wait(delay_ms: u64) -> Self {
        MacroStep::Wait { delay_ms }
    }

    pub fn describe(&self) -> String {
        match self {
            MacroStep::Chord { keys, repeat, .. } if *repeat > 1 => {
                format!("{} x{}", keys.join("+"), repeat)
            }
            MacroStep::Chord { keys, .. } => keys.join("+"),
            MacroStep::Type { text, .. } => format!("type '{}'", text),
            MacroStep::Wait { delay_ms } => format!("wait {}ms", delay_ms),
        }
    }

    /// Total time this step spends sleeping
    pub fn total_delay(&self) -> Duration {
        let ms = match self {
            MacroStep::Chord {
                repeat, delay_ms, ..
            } => u64::from((*repeat).max(1)) * delay_ms,
            MacroStep::Type { delay_ms, .. } | MacroStep::Wait { delay_ms } => *delay_ms,
        };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroSequence {
    pub name: String,
    pub steps: Vec<MacroStep>,
}

impl MacroSequence {
    pub fn new(name: &str, steps: Vec<MacroStep>) -> Self {
        Self {
            name: name.to_string(),
            steps,
        }
    }

    /// Open File > Tethered Capture > Start, name the session, start at 1,
    /// then pick the develop preset and switch to Library
    pub fn default_tether() -> Self {
        Self::new(
            "tether",
            vec![
                MacroStep::wait(1500),
                MacroStep::chord(&["alt", "f"], 500),
                MacroStep::chord_repeat(&["down"], 8, 100),
                MacroStep::chord(&["right"], 300),
                MacroStep::chord(&["enter"], 800),
                MacroStep::text(SESSION_NAME_PLACEHOLDER, 200),
                MacroStep::chord_repeat(&["tab"], 4, 200),
                MacroStep::text("1", 300),
                MacroStep::chord(&["enter"], 2500),
                MacroStep::chord(&["ctrl", "alt", "1"], 800),
                MacroStep::chord(&["e"], 0),
            ],
        )
    }

    /// Select all, then the export-with-previous shortcut
    pub fn default_export() -> Self {
        Self::new(
            "export",
            vec![
                MacroStep::wait(1500),
                MacroStep::chord(&["ctrl", "a"], 500),
                MacroStep::chord(&["ctrl", "alt", "shift", "e"], 300),
            ],
        )
    }

    /// Check every chord names known keys
    pub fn validate(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err(format!("macro '{}' has no steps", self.name));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if let MacroStep::Chord { keys, .. } = step {
                parse_key_chord(keys).map_err(|key| {
                    format!("macro '{}' step {}: unknown key '{}'", self.name, index, key)
                })?;
            }
        }
        Ok(())
    }

    pub fn total_delay(&self) -> Duration {
        self.steps.iter().map(MacroStep::total_delay).sum()
    }

    /// Play every step in order; the first rejected event aborts playback
    pub async fn play(&self, keyboard: &dyn Keyboard, session_name: &str) -> Result<(), MacroError> {
        log::info!(
            "Playing macro '{}' ({} steps, {:?})",
            self.name,
            self.steps.len(),
            self.total_delay()
        );

        for (index, step) in self.steps.iter().enumerate() {
            let fail = |source: DesktopError| MacroError {
                step: index,
                description: step.describe(),
                source,
            };

            match step {
                MacroStep::Chord {
                    keys,
                    repeat,
                    delay_ms,
                } => {
                    for _ in 0..(*repeat).max(1) {
                        keyboard.send_chord(keys).map_err(fail)?;
                        sleep(Duration::from_millis(*delay_ms)).await;
                    }
                }
                MacroStep::Type { text, delay_ms } => {
                    let text = text.replace(SESSION_NAME_PLACEHOLDER, session_name);
                    keyboard.type_text(&text).map_err(fail)?;
                    sleep(Duration::from_millis(*delay_ms)).await;
                }
                MacroStep::Wait { delay_ms } => {
                    sleep(Duration::from_millis(*delay_ms)).await;
                }
            }
        }

        log::info!("Macro '{}' finished", self.name);
        Ok(())
    }
}

/// `YYYY-MM-DD_HH-MM` of the given local time
pub fn session_name(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d_%H-%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::FakeKeyboard;
    use chrono::TimeZone;
    use tokio::time::Instant;

    #[test]
    fn test_session_name_format() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 59).unwrap();
        assert_eq!(session_name(now), "2024-03-09_14-05");
    }

    #[test]
    fn test_default_tables_are_valid() {
        MacroSequence::default_tether().validate().unwrap();
        MacroSequence::default_export().validate().unwrap();
        assert_eq!(
            MacroSequence::default_tether().total_delay(),
            Duration::from_millis(1500 + 500 + 800 + 300 + 800 + 200 + 800 + 300 + 2500 + 800)
        );
    }

    #[test]
    fn test_validate_rejects_unknown_keys() {
        let bad = MacroSequence::new("bad", vec![MacroStep::chord(&["ctrl", "banana"], 0)]);
        let err = bad.validate().unwrap_err();
        assert!(err.contains("banana"), "{}", err);
        assert!(MacroSequence::new("empty", vec![]).validate().is_err());
    }

    #[test]
    fn test_steps_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Table {
            steps: Vec<MacroStep>,
        }

        let table: Table = toml::from_str(
            r#"
            [[steps]]
            kind = "chord"
            keys = ["down"]
            repeat = 8
            delay_ms = 100

            [[steps]]
            kind = "type"
            text = "{session_name}"

            [[steps]]
            kind = "wait"
            delay_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(
            table.steps,
            vec![
                MacroStep::chord_repeat(&["down"], 8, 100),
                MacroStep::text("{session_name}", 0),
                MacroStep::wait(1500),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tether_plays_in_order_with_name() {
        let keyboard = FakeKeyboard::default();
        let sequence = MacroSequence::default_tether();

        let start = Instant::now();
        sequence.play(&keyboard, "2024-03-09_14-05").await.unwrap();
        assert_eq!(start.elapsed(), sequence.total_delay());

        let sent = keyboard.sent();
        assert_eq!(sent.len(), 1 + 8 + 1 + 1 + 1 + 4 + 1 + 1 + 1 + 1);
        assert_eq!(sent[0], "chord:alt+f");
        assert!(sent[1..9].iter().all(|s| s == "chord:down"));
        assert_eq!(sent[11], "type:2024-03-09_14-05");
        assert_eq!(sent[16], "type:1");
        assert_eq!(sent[18], "chord:ctrl+alt+1");
        assert_eq!(sent.last().unwrap(), "chord:e");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_aborts_at_step() {
        let keyboard = FakeKeyboard {
            fail_at: Some(2),
            ..FakeKeyboard::default()
        };
        let err = MacroSequence::default_tether()
            .play(&keyboard, "x")
            .await
            .unwrap_err();

        // alt+f, one down, then the second down is rejected
        assert_eq!(err.step, 2);
        assert_eq!(err.description, "down x8");
        assert_eq!(keyboard.sent().len(), 2);
    }
}
