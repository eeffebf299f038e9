// macOS virtual key codes
// Reference: https://developer.apple.com/documentation/appkit/nsevent/specialkey
//
// Key codes name physical keys on an ANSI layout. The same table is used to
// parse hotkey chords and to post macro key events.

// ====== Modifier Flags (CGEventFlags) ======

pub const MOD_CMD: u64 = 1 << 20;
pub const MOD_SHIFT: u64 = 1 << 17;
pub const MOD_OPTION: u64 = 1 << 19;
pub const MOD_CONTROL: u64 = 1 << 18;

// ====== Physical Modifier Keys ======

pub const KEY_CMD_LEFT: u16 = 55;
pub const KEY_CMD_RIGHT: u16 = 54;
pub const KEY_SHIFT_LEFT: u16 = 56;
pub const KEY_SHIFT_RIGHT: u16 = 60;
pub const KEY_OPTION_LEFT: u16 = 58;
pub const KEY_OPTION_RIGHT: u16 = 61;
pub const KEY_CONTROL_LEFT: u16 = 59;
pub const KEY_CONTROL_RIGHT: u16 = 62;

/// Canonical key names and their codes; the first name for a code is the
/// one printed back by `keycode_to_name`.
const KEYS: &[(&str, u16)] = &[
    // Letters
    ("a", 0), ("s", 1), ("d", 2), ("f", 3), ("h", 4), ("g", 5), ("z", 6),
    ("x", 7), ("c", 8), ("v", 9), ("b", 11), ("q", 12), ("w", 13), ("e", 14),
    ("r", 15), ("y", 16), ("t", 17), ("o", 31), ("u", 32), ("i", 34),
    ("p", 35), ("l", 37), ("j", 38), ("k", 40), ("n", 45), ("m", 46),
    // Top-row digits
    ("1", 18), ("2", 19), ("3", 20), ("4", 21), ("6", 22), ("5", 23),
    ("9", 25), ("7", 26), ("8", 28), ("0", 29),
    // Function keys
    ("f1", 122), ("f2", 120), ("f3", 99), ("f4", 118), ("f5", 96),
    ("f6", 97), ("f7", 98), ("f8", 100), ("f9", 101), ("f10", 109),
    ("f11", 103), ("f12", 111), ("f13", 105), ("f14", 107), ("f15", 113),
    ("f16", 106), ("f17", 64), ("f18", 79), ("f19", 80), ("f20", 90),
    // Navigation
    ("left", 123), ("right", 124), ("down", 125), ("up", 126),
    ("home", 115), ("end", 119), ("pageup", 116), ("pagedown", 121),
    // Editing
    ("return", 36), ("tab", 48), ("space", 49), ("delete", 51),
    ("esc", 53), ("forwarddelete", 117),
    // Punctuation
    ("=", 24), ("-", 27), ("]", 30), ("[", 33), ("'", 39), (";", 41),
    ("\\", 42), (",", 43), ("/", 44), (".", 47), ("`", 50),
];

/// Alternative spellings accepted in config files
fn canonical(name: &str) -> &str {
    match name {
        "enter" => "return",
        "escape" => "esc",
        "backspace" => "delete",
        "page_up" => "pageup",
        "page_down" => "pagedown",
        "minus" | "underscore" | "_" => "-",
        "equal" | "equals" | "plus" => "=",
        "comma" => ",",
        "period" => ".",
        "slash" => "/",
        "semicolon" => ";",
        "quote" => "'",
        "grave" => "`",
        "leftbracket" => "[",
        "rightbracket" => "]",
        "backslash" => "\\",
        other => other,
    }
}

/// Modifier flag for a modifier key name, None for regular keys
pub fn modifier_flag(name: &str) -> Option<u64> {
    match name.to_lowercase().as_str() {
        "cmd" | "command" | "win" | "super" => Some(MOD_CMD),
        "shift" => Some(MOD_SHIFT),
        "option" | "alt" => Some(MOD_OPTION),
        "control" | "ctrl" => Some(MOD_CONTROL),
        _ => None,
    }
}

/// Code of a regular (non-modifier) key
pub fn key_code(name: &str) -> Option<u16> {
    let lower = name.to_lowercase();
    let wanted = canonical(&lower);
    KEYS.iter()
        .find(|(key, _)| *key == wanted)
        .map(|(_, code)| *code)
}

/// Maps a key name to the physical codes that satisfy it.
///
/// Modifiers return both the left and right key; regular keys return one code.
pub fn key_name_to_codes(name: &str) -> Option<Vec<u16>> {
    match modifier_flag(name) {
        Some(MOD_CMD) => Some(vec![KEY_CMD_LEFT, KEY_CMD_RIGHT]),
        Some(MOD_SHIFT) => Some(vec![KEY_SHIFT_LEFT, KEY_SHIFT_RIGHT]),
        Some(MOD_OPTION) => Some(vec![KEY_OPTION_LEFT, KEY_OPTION_RIGHT]),
        Some(MOD_CONTROL) => Some(vec![KEY_CONTROL_LEFT, KEY_CONTROL_RIGHT]),
        _ => key_code(name).map(|code| vec![code]),
    }
}

/// Human-readable name for a key code; modifiers lose their side
pub fn keycode_to_name(code: u16) -> Option<&'static str> {
    match code {
        KEY_CMD_LEFT | KEY_CMD_RIGHT => Some("cmd"),
        KEY_SHIFT_LEFT | KEY_SHIFT_RIGHT => Some("shift"),
        KEY_OPTION_LEFT | KEY_OPTION_RIGHT => Some("option"),
        KEY_CONTROL_LEFT | KEY_CONTROL_RIGHT => Some("ctrl"),
        _ => KEYS.iter().find(|(_, c)| *c == code).map(|(name, _)| *name),
    }
}

/// A chord split into modifier flags and the regular keys to press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub flags: u64,
    pub codes: Vec<u16>,
}

/// Parse `["ctrl", "alt", "1"]` into flags plus key codes
pub fn parse_key_chord(keys: &[String]) -> Result<KeyChord, String> {
    let mut flags = 0u64;
    let mut codes = Vec::new();

    for key in keys {
        if let Some(flag) = modifier_flag(key) {
            flags |= flag;
        } else {
            codes.push(key_code(key).ok_or_else(|| key.clone())?);
        }
    }

    if codes.is_empty() {
        return Err(keys.join("+"));
    }
    Ok(KeyChord { flags, codes })
}
