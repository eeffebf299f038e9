use crate::bridge::Action;
use std::collections::HashSet;

// ============================================================================
// Key State Tracking
// ============================================================================

/// Tracks the current state of pressed keys
#[derive(Debug, Default)]
pub struct KeyState {
    /// Set of currently pressed key codes
    pub pressed_keys: HashSet<u16>,
}

impl KeyState {
    pub fn key_down(&mut self, key_code: u16) {
        self.pressed_keys.insert(key_code);
    }

    pub fn key_up(&mut self, key_code: u16) {
        self.pressed_keys.remove(&key_code);
    }

    pub fn get_pressed_keys(&self) -> &HashSet<u16> {
        &self.pressed_keys
    }
}

// ============================================================================
// Chord Pattern System
// ============================================================================

/// Represents different types of chord patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChordPattern {
    /// All groups pressed at once, nothing else held.
    ///
    /// Each group lists interchangeable codes (left/right modifier); any one
    /// of them satisfies the group.
    Simultaneous { key_groups: Vec<Vec<u16>> },
}

impl ChordPattern {
    /// Parse key names (`["ctrl", "option", "shift", "f1"]`) into a chord
    pub fn parse(key_names: &[String]) -> Result<Self, String> {
        if key_names.is_empty() {
            return Err("chord cannot be empty".to_string());
        }

        let key_groups = key_names
            .iter()
            .map(|name| {
                crate::keycodes::key_name_to_codes(name)
                    .ok_or_else(|| format!("unknown key name: {}", name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ChordPattern::Simultaneous { key_groups })
    }

    /// Checks if the current pressed keys match this chord pattern
    pub fn matches(&self, pressed_keys: &HashSet<u16>) -> bool {
        match self {
            ChordPattern::Simultaneous { key_groups } => {
                let all_groups_satisfied = key_groups
                    .iter()
                    .all(|group| group.iter().any(|key| pressed_keys.contains(key)));

                if !all_groups_satisfied {
                    return false;
                }

                let chord_keys_pressed: usize = key_groups
                    .iter()
                    .map(|group| group.iter().filter(|key| pressed_keys.contains(key)).count())
                    .sum();

                // Extra keys held means a different chord (ctrl+shift+f1 vs ctrl+shift+option+f1)
                pressed_keys.len() == chord_keys_pressed
            }
        }
    }

    /// Returns a human-readable description of the chord for logging
    pub fn describe(&self) -> String {
        use crate::keycodes::keycode_to_name;

        match self {
            ChordPattern::Simultaneous { key_groups } => key_groups
                .iter()
                .filter_map(|group| group.first().and_then(|&code| keycode_to_name(code)))
                .collect::<Vec<_>>()
                .join("+"),
        }
    }
}

// ============================================================================
// Hotkey Definition
// ============================================================================

/// A chord bound to an orchestrator action
#[derive(Debug, Clone)]
pub struct Hotkey {
    pub chord: ChordPattern,

    /// The action name as written in the config (for logging)
    pub action_name: String,

    pub action: Action,

    /// Fire once every chord key is released instead of on key down
    pub trigger_on_release: bool,
}

/// A hotkey that matched and is waiting for its keys to be released
#[derive(Debug, Clone)]
struct PendingHotkey {
    hotkey_index: usize,
    chord_keys: HashSet<u16>,
}

// ============================================================================
// Registry
// ============================================================================

/// Key state plus bound hotkeys; fed raw key events, yields actions to run.
///
/// Every key event that completes or belongs to a pending chord is reported
/// as consumed so it never reaches the focused application.
#[derive(Debug, Default)]
pub struct HotkeyRegistry {
    hotkeys: Vec<Hotkey>,
    state: KeyState,
    pending: Option<PendingHotkey>,
}

/// Outcome of feeding one key event
#[derive(Debug, Default, PartialEq)]
pub struct KeyOutcome {
    pub consume: bool,
    pub action: Option<Action>,
}

impl HotkeyRegistry {
    pub fn new(hotkeys: Vec<Hotkey>) -> Self {
        Self {
            hotkeys,
            ..Self::default()
        }
    }

    pub fn hotkeys(&self) -> &[Hotkey] {
        &self.hotkeys
    }

    pub fn key_down(&mut self, key_code: u16) -> KeyOutcome {
        self.state.key_down(key_code);
        self.check_trigger()
    }

    pub fn key_up(&mut self, key_code: u16) -> KeyOutcome {
        self.state.key_up(key_code);
        self.check_release()
    }

    fn check_trigger(&mut self) -> KeyOutcome {
        let pressed = self.state.get_pressed_keys();

        for (index, hotkey) in self.hotkeys.iter().enumerate() {
            if !hotkey.chord.matches(pressed) {
                continue;
            }

            log::debug!("Hotkey matched: {} => {}", hotkey.chord.describe(), hotkey.action_name);

            if hotkey.trigger_on_release {
                self.pending = Some(PendingHotkey {
                    hotkey_index: index,
                    chord_keys: pressed.clone(),
                });
                return KeyOutcome {
                    consume: true,
                    action: None,
                };
            }

            return KeyOutcome {
                consume: true,
                action: Some(hotkey.action.clone()),
            };
        }

        KeyOutcome::default()
    }

    fn check_release(&mut self) -> KeyOutcome {
        let Some(pending) = &self.pending else {
            return KeyOutcome::default();
        };

        let pressed = self.state.get_pressed_keys();
        if pending.chord_keys.iter().any(|k| pressed.contains(k)) {
            return KeyOutcome {
                consume: true,
                action: None,
            };
        }

        let action = self
            .hotkeys
            .get(pending.hotkey_index)
            .map(|hotkey| hotkey.action.clone());
        self.pending = None;

        KeyOutcome {
            consume: true,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycodes::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn f1() -> u16 {
        key_code("f1").unwrap()
    }

    fn registry(trigger_on_release: bool) -> HotkeyRegistry {
        HotkeyRegistry::new(vec![Hotkey {
            chord: ChordPattern::parse(&keys(&["ctrl", "option", "shift", "f1"])).unwrap(),
            action_name: "start_basic".to_string(),
            action: Action::StartBasic,
            trigger_on_release,
        }])
    }

    #[test]
    fn test_chord_requires_exact_keys() {
        let chord = ChordPattern::parse(&keys(&["ctrl", "shift", "f1"])).unwrap();
        let mut pressed = HashSet::from([KEY_CONTROL_LEFT, KEY_SHIFT_RIGHT, f1()]);
        assert!(chord.matches(&pressed));

        pressed.insert(KEY_OPTION_LEFT);
        assert!(!chord.matches(&pressed));
    }

    #[test]
    fn test_chord_parse_rejects_unknown() {
        assert!(ChordPattern::parse(&keys(&["ctrl", "hyper"])).is_err());
        assert!(ChordPattern::parse(&[]).is_err());
    }

    #[test]
    fn test_describe() {
        let chord = ChordPattern::parse(&keys(&["ctrl", "alt", "f3"])).unwrap();
        assert_eq!(chord.describe(), "ctrl+option+f3");
    }

    #[test]
    fn test_trigger_on_key_down() {
        let mut reg = registry(false);
        assert_eq!(reg.key_down(KEY_CONTROL_LEFT), KeyOutcome::default());
        reg.key_down(KEY_OPTION_LEFT);
        reg.key_down(KEY_SHIFT_LEFT);
        let outcome = reg.key_down(f1());
        assert!(outcome.consume);
        assert_eq!(outcome.action, Some(Action::StartBasic));
    }

    #[test]
    fn test_trigger_on_release_waits_for_all_keys() {
        let mut reg = registry(true);
        for code in [KEY_CONTROL_LEFT, KEY_OPTION_LEFT, KEY_SHIFT_LEFT] {
            reg.key_down(code);
        }
        let outcome = reg.key_down(f1());
        assert!(outcome.consume);
        assert_eq!(outcome.action, None);

        assert_eq!(reg.key_up(f1()).action, None);
        reg.key_up(KEY_SHIFT_LEFT);
        reg.key_up(KEY_OPTION_LEFT);
        let outcome = reg.key_up(KEY_CONTROL_LEFT);
        assert_eq!(outcome.action, Some(Action::StartBasic));

        // Nothing pending any more
        assert_eq!(reg.key_up(KEY_CONTROL_LEFT), KeyOutcome::default());
    }
}
