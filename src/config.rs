//! Configuration snapshot
//!
//! Loaded once at startup from `config.toml`. Nothing here is fatal: an
//! unreadable file, a parse error or a bad value is logged and the built-in
//! default used instead. Only hotkeys with unknown keys or actions are
//! dropped, each with its own error line.

use crate::bridge::Action;
use crate::error::ConfigError;
use crate::hotkey::{ChordPattern, Hotkey};
use crate::notifier::{Cue, default_player};
use crate::params::Params;
use crate::session::timer::default_reminders;
use crate::session::{FocusPolicy, MacroSequence, MacroStep, ReminderSchedule, TargetApp};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize)]
pub struct HotkeyConfig {
    pub keys: Vec<String>,
    pub action: String,
    #[serde(default)]
    pub params: toml::Table,
    #[serde(default)]
    pub trigger_on_release: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundConfig {
    pub dir: PathBuf,
    pub player: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub source_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub archive_prefix: String,
    pub clear_on_end: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    /// `version.json` locations, checked in order
    pub sources: Vec<PathBuf>,
    pub sync_scripts: Vec<PathBuf>,
    pub local_version: String,
}

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub target: TargetApp,
    pub focus: FocusPolicy,
    pub duration_basic: u32,
    pub duration_premium: u32,
    pub reminders: ReminderSchedule,
    pub tether_macro: MacroSequence,
    pub export_macro: MacroSequence,
    pub sound: SoundConfig,
    pub exports: ExportConfig,
    pub update: UpdateConfig,
    pub hotkeys: Vec<Hotkey>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::from_params(&Params::empty())
    }
}

fn report(error: ConfigError) {
    log::warn!("{}; using default", error);
}

fn invalid(key: &str, reason: impl Into<String>) {
    report(ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    });
}

/// Parse a config file into a lookup table
pub fn read_params(path: &Path) -> Result<Params, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Table = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Params::from_table(table))
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches(['/', '\\'])),
        _ => PathBuf::from(path),
    }
}

fn non_negative(params: &Params, key: &str, default: i64) -> u64 {
    let value = params.get_int(key, default);
    if value < 0 {
        invalid(key, format!("{} is negative", value));
        return default as u64;
    }
    value as u64
}

fn millis(params: &Params, key: &str, default_ms: i64) -> Duration {
    Duration::from_millis(non_negative(params, key, default_ms))
}

fn count(params: &Params, key: &str, default: u32) -> u32 {
    u32::try_from(non_negative(params, key, i64::from(default))).unwrap_or(default)
}

fn minutes(params: &Params, key: &str, default: u32) -> u32 {
    match count(params, key, default) {
        0 => {
            invalid(key, "session length must be at least one minute");
            default
        }
        n => n,
    }
}

fn reminders(params: &Params) -> ReminderSchedule {
    let Some(table) = params.get_table("session.reminders") else {
        return default_reminders();
    };

    let mut schedule = ReminderSchedule::new();
    for (threshold, cue) in table.iter() {
        let key = format!("session.reminders.{}", threshold);
        let Ok(minutes) = threshold.parse::<u32>() else {
            invalid(&key, "threshold must be a whole number of minutes");
            continue;
        };
        match cue.as_str().map(str::parse::<Cue>) {
            Some(Ok(cue)) => {
                schedule.insert(minutes, cue);
            }
            Some(Err(reason)) => invalid(&key, reason),
            None => invalid(&key, "cue must be a string"),
        }
    }
    schedule
}

fn macro_table(params: &Params, name: &str, default: MacroSequence) -> MacroSequence {
    let key = format!("macro.{}", name);
    let Some(value) = params.get(&key) else {
        return default;
    };

    match value.clone().try_into::<Vec<MacroStep>>() {
        Ok(steps) => {
            let sequence = MacroSequence::new(name, steps);
            match sequence.validate() {
                Ok(()) => sequence,
                Err(reason) => {
                    invalid(&key, reason);
                    default
                }
            }
        }
        Err(e) => {
            invalid(&key, e.to_string());
            default
        }
    }
}

fn path_list(params: &Params, key: &str) -> Vec<PathBuf> {
    params
        .get_str_list(key)
        .unwrap_or_default()
        .iter()
        .map(|p| expand_home(p))
        .collect()
}

#[derive(Deserialize)]
struct VersionStamp {
    version: String,
}

/// `version.json` next to the binary's working directory, else the crate version
fn local_version(params: &Params) -> String {
    if let Some(version) = params.get("update.local_version").and_then(|v| v.as_str()) {
        return version.to_string();
    }
    fs::read_to_string("version.json")
        .ok()
        .and_then(|text| serde_json::from_str::<VersionStamp>(&text).ok())
        .map(|stamp| stamp.version)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
}

fn default_hotkeys() -> Vec<HotkeyConfig> {
    ["start_basic", "start_premium", "end_session"]
        .iter()
        .zip(["f1", "f2", "f3"])
        .map(|(action, key)| HotkeyConfig {
            keys: ["ctrl", "option", "shift", key].iter().map(|k| k.to_string()).collect(),
            action: action.to_string(),
            params: toml::Table::new(),
            trigger_on_release: false,
        })
        .collect()
}

fn hotkey_configs(params: &Params) -> Vec<HotkeyConfig> {
    let Some(value) = params.get("hotkey") else {
        return default_hotkeys();
    };
    match value.clone().try_into::<Vec<HotkeyConfig>>() {
        Ok(configs) => configs,
        Err(e) => {
            invalid("hotkey", e.to_string());
            default_hotkeys()
        }
    }
}

/// Convert config hotkeys to runtime hotkeys, skipping the ones that don't resolve
pub fn config_to_hotkeys(configs: Vec<HotkeyConfig>) -> Vec<Hotkey> {
    let mut hotkeys = Vec::new();

    for config in configs {
        let chord = match ChordPattern::parse(&config.keys) {
            Ok(chord) => chord,
            Err(reason) => {
                log::error!("Hotkey {:?} skipped: {}", config.keys, reason);
                continue;
            }
        };

        let params = Params::from_table(config.params);
        let Some(action) = Action::from_name(&config.action, &params) else {
            log::error!("Hotkey {:?} skipped: unknown action '{}'", config.keys, config.action);
            continue;
        };

        hotkeys.push(Hotkey {
            chord,
            action_name: config.action,
            action,
            trigger_on_release: config.trigger_on_release,
        });
    }

    hotkeys
}

impl StudioConfig {
    /// Load from a file; never fails
    pub fn load(path: &Path) -> Self {
        match read_params(path) {
            Ok(params) => {
                log::info!("Loaded config from {}", path.display());
                Self::from_params(&params)
            }
            Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                report(e);
                Self::default()
            }
        }
    }

    pub fn from_params(params: &Params) -> Self {
        let executable = params
            .get("lightroom.path")
            .and_then(|v| v.as_str())
            .filter(|p| !p.trim().is_empty())
            .map(expand_home);

        let target = TargetApp {
            process_name: params.get_str("lightroom.process_name", "Lightroom"),
            window_title: params.get_str("lightroom.window_title_contains", "Lightroom"),
            executable,
        };

        let focus = FocusPolicy {
            poll_interval: millis(params, "delays.window_poll_interval_ms", 1500),
            window_poll_retries: count(params, "delays.window_poll_retries", 20),
            settle_delay: millis(params, "delays.settle_ms", 5000),
            focus_retries: count(params, "delays.focus_retries", 10),
            focus_backoff: millis(params, "delays.focus_backoff_ms", 800),
            activation_delay: millis(params, "delays.window_activation_wait_ms", 500),
        };

        let source_dir = params
            .get("exports.source_dir")
            .and_then(|v| v.as_str())
            .map(expand_home)
            .unwrap_or_else(default_export_dir);
        let archive_dir = params
            .get("exports.archive_dir")
            .and_then(|v| v.as_str())
            .map(expand_home)
            .or_else(|| source_dir.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| source_dir.clone());

        let exports = ExportConfig {
            archive_dir,
            source_dir,
            archive_prefix: params.get_str("exports.archive_prefix", "photos"),
            clear_on_end: params.get_bool("exports.clear_on_end", false),
        };

        let sound = SoundConfig {
            dir: expand_home(&params.get_str("sound.dir", "sounds")),
            player: params
                .get_str_list("sound.player")
                .filter(|player| !player.is_empty())
                .unwrap_or_else(default_player),
        };

        let update = UpdateConfig {
            sources: path_list(params, "update.sources"),
            sync_scripts: path_list(params, "update.sync_scripts"),
            local_version: local_version(params),
        };

        StudioConfig {
            target,
            focus,
            duration_basic: minutes(params, "session.duration_basic", 30),
            duration_premium: minutes(params, "session.duration_premium", 55),
            reminders: reminders(params),
            tether_macro: macro_table(params, "tether", MacroSequence::default_tether()),
            export_macro: macro_table(params, "export", MacroSequence::default_export()),
            sound,
            exports,
            update,
            hotkeys: config_to_hotkeys(hotkey_configs(params)),
        }
    }
}

fn default_export_dir() -> PathBuf {
    dirs::desktop_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Desktop")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Exports")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> StudioConfig {
        let table: toml::Table = toml::from_str(text).unwrap();
        StudioConfig::from_params(&Params::from_table(table))
    }

    #[test]
    fn test_defaults() {
        let config = StudioConfig::default();
        assert_eq!(config.target.process_name, "Lightroom");
        assert_eq!(config.target.executable, None);
        assert_eq!(config.focus, FocusPolicy::default());
        assert_eq!((config.duration_basic, config.duration_premium), (30, 55));
        assert_eq!(config.reminders, default_reminders());
        assert_eq!(config.tether_macro, MacroSequence::default_tether());
        assert_eq!(config.hotkeys.len(), 3);
        assert_eq!(config.hotkeys[1].action, Action::StartPremium);
        assert!(!config.exports.clear_on_end);
        assert!(config.exports.source_dir.ends_with("Exports"));
    }

    #[test]
    fn test_overrides() {
        let config = parse(
            r#"
            [lightroom]
            path = "/Applications/Adobe Lightroom Classic/Adobe Lightroom Classic.app"
            process_name = "Lightroom Classic"

            [delays]
            window_activation_wait_ms = 250
            window_poll_retries = 3

            [session]
            duration_basic = 20
            reminders = { "10" = "end_15min", "2" = "end_5min" }

            [exports]
            source_dir = "/tmp/exports"
            archive_prefix = "shoot"

            [[hotkey]]
            keys = ["cmd", "f5"]
            action = "start_session"
            params = { minutes = 45 }
            "#,
        );

        assert_eq!(config.target.process_name, "Lightroom Classic");
        assert!(config.target.executable.is_some());
        assert_eq!(config.focus.activation_delay, Duration::from_millis(250));
        assert_eq!(config.focus.window_poll_retries, 3);
        assert_eq!(config.duration_basic, 20);
        assert_eq!(config.duration_premium, 55);
        assert_eq!(
            config.reminders,
            ReminderSchedule::from([(10, Cue::End15Min), (2, Cue::End5Min)])
        );
        assert_eq!(config.exports.archive_dir, PathBuf::from("/tmp"));
        assert_eq!(config.exports.archive_prefix, "shoot");
        assert_eq!(config.hotkeys.len(), 1);
        assert_eq!(config.hotkeys[0].action, Action::StartSession { minutes: 45 });
    }

    #[test]
    fn test_negative_delays_fall_back() {
        let config = parse(
            r#"
            [delays]
            settle_ms = -5
            focus_backoff_ms = -1
            [session]
            duration_premium = 0
            "#,
        );
        assert_eq!(config.focus.settle_delay, Duration::from_secs(5));
        assert_eq!(config.focus.focus_backoff, Duration::from_millis(800));
        assert_eq!(config.duration_premium, 55);
    }

    #[test]
    fn test_bad_macro_falls_back_to_default() {
        let config = parse(
            r#"
            [[macro.export]]
            kind = "chord"
            keys = ["ctrl", "nosuchkey"]
            "#,
        );
        assert_eq!(config.export_macro, MacroSequence::default_export());

        let config = parse(
            r#"
            [[macro.export]]
            kind = "chord"
            keys = ["cmd", "e"]
            delay_ms = 100
            "#,
        );
        assert_eq!(config.export_macro.steps, vec![MacroStep::chord(&["cmd", "e"], 100)]);
    }

    #[test]
    fn test_unknown_hotkeys_are_skipped() {
        let config = parse(
            r#"
            [[hotkey]]
            keys = ["ctrl", "banana"]
            action = "end_session"

            [[hotkey]]
            keys = ["ctrl", "f4"]
            action = "dance"

            [[hotkey]]
            keys = ["ctrl", "f6"]
            action = "compress_exports"
            "#,
        );
        assert_eq!(config.hotkeys.len(), 1);
        assert_eq!(config.hotkeys[0].action, Action::CompressExports);
    }

    #[test]
    fn test_load_missing_or_broken_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StudioConfig::load(&dir.path().join("absent.toml"));
        assert_eq!(config.duration_basic, 30);

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[lightroom\npath = ").unwrap();
        assert!(matches!(read_params(&broken), Err(ConfigError::Parse { .. })));
        assert_eq!(StudioConfig::load(&broken).duration_premium, 55);
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~/Desktop/Exports"), home.join("Desktop/Exports"));
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    }
}
