//! Audible cues
//!
//! Cue names map to fixed file names inside the sounds directory. Playback is
//! fire-and-forget: a background thread runs the configured player command and
//! reaps it. Missing files or a missing player only log a warning.

use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    Start,
    #[serde(rename = "end_15min")]
    End15Min,
    #[serde(rename = "end_5min")]
    End5Min,
    End,
}

impl Cue {
    pub fn name(self) -> &'static str {
        match self {
            Cue::Start => "start",
            Cue::End15Min => "end_15min",
            Cue::End5Min => "end_5min",
            Cue::End => "end",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Cue::Start => "Start_shoot.mp3",
            Cue::End15Min => "end_15min.mp3",
            Cue::End5Min => "end_5min.mp3",
            Cue::End => "The_end.mp3",
        }
    }
}

impl FromStr for Cue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Cue::Start),
            "end_15min" => Ok(Cue::End15Min),
            "end_5min" => Ok(Cue::End5Min),
            "end" => Ok(Cue::End),
            other => Err(format!("unknown cue: {}", other)),
        }
    }
}

pub trait Notifier: Send + Sync {
    /// Play a cue without waiting for it to finish
    fn play(&self, cue: Cue);
}

/// Plays cue files with an external audio player (`afplay` on macOS)
#[derive(Debug, Clone)]
pub struct SoundPlayer {
    sounds_dir: PathBuf,
    player: Vec<String>,
}

pub fn default_player() -> Vec<String> {
    if cfg!(target_os = "macos") {
        vec!["afplay".to_string()]
    } else {
        ["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

impl SoundPlayer {
    pub fn new(sounds_dir: PathBuf, player: Vec<String>) -> Self {
        Self { sounds_dir, player }
    }

    pub fn cue_path(&self, cue: Cue) -> PathBuf {
        self.sounds_dir.join(cue.file_name())
    }
}

impl Notifier for SoundPlayer {
    fn play(&self, cue: Cue) {
        let path = self.cue_path(cue);
        if !path.exists() {
            log::warn!("Sound file not found for '{}': {}", cue.name(), path.display());
            return;
        }

        let Some((program, args)) = self.player.split_first() else {
            log::warn!("No audio player configured, skipping '{}'", cue.name());
            return;
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let cue_name = cue.name();
        std::thread::spawn(move || match command.spawn() {
            Ok(mut child) => {
                if let Err(e) = child.wait() {
                    log::warn!("Sound playback for '{}' did not finish cleanly: {}", cue_name, e);
                }
            }
            Err(e) => log::warn!("Sound playback failed for '{}': {}", cue_name, e),
        });
        log::debug!("Playing cue '{}'", cue.name());
    }
}
