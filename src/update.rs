//! Update check against a shared drive
//!
//! Each source is a `version.json` on a synced network drive. The first
//! readable one with a newer version wins; unreachable drives are skipped.
//! Applying an update launches the sync script and leaves the rest to it.

use crate::config::UpdateConfig;
use crate::error::UpdateError;
use semver::Version;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Deserialize)]
pub struct VersionFile {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateInfo {
    Available { version: String, message: String },
    UpToDate,
}

/// Parse the leading version token ("4.2.0 beta" -> 4.2.0); "4.2" counts as 4.2.0
fn parse_version(text: &str) -> Option<Version> {
    let token = text.split_whitespace().next()?.trim_start_matches('v');
    Version::parse(token).ok().or_else(|| {
        let padded = match token.matches('.').count() {
            0 => format!("{}.0.0", token),
            1 => format!("{}.0", token),
            _ => return None,
        };
        Version::parse(&padded).ok()
    })
}

pub fn is_newer(remote: &str, local: &str) -> bool {
    match (parse_version(remote), parse_version(local)) {
        (Some(remote), Some(local)) => remote > local,
        (Some(_), None) => true,
        _ => false,
    }
}

fn read_version_file(path: &Path) -> Option<VersionFile> {
    let text = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(file) => Some(file),
        Err(e) => {
            log::warn!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

pub fn check_update(config: &UpdateConfig) -> UpdateInfo {
    for source in &config.sources {
        let Some(file) = read_version_file(source) else {
            log::debug!("Update source unavailable: {}", source.display());
            continue;
        };
        if is_newer(&file.version, &config.local_version) {
            log::info!("Update available: {} (running {})", file.version, config.local_version);
            return UpdateInfo::Available {
                version: file.version,
                message: file
                    .message
                    .unwrap_or_else(|| "A new version is ready.".to_string()),
            };
        }
    }
    UpdateInfo::UpToDate
}

pub fn find_sync_script(config: &UpdateConfig) -> Option<PathBuf> {
    config.sync_scripts.iter().find(|p| p.is_file()).cloned()
}

fn script_command(script: &Path) -> Command {
    let is_batch = script
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("bat") || e.eq_ignore_ascii_case("cmd"));

    if cfg!(windows) && is_batch {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]).arg(script);
        command
    } else if is_batch {
        Command::new(script)
    } else {
        let mut command = Command::new("sh");
        command.arg(script);
        command
    }
}

/// Launch the first existing sync script detached; returns its path
pub fn apply_update(config: &UpdateConfig) -> Result<PathBuf, UpdateError> {
    let script = find_sync_script(config).ok_or(UpdateError::NoSyncScript)?;

    script_command(&script)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| UpdateError::Launch {
            path: script.clone(),
            source,
        })?;

    log::info!("Started sync script {}", script.display());
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sources: Vec<PathBuf>, local: &str) -> UpdateConfig {
        UpdateConfig {
            sources,
            sync_scripts: Vec::new(),
            local_version: local.to_string(),
        }
    }

    #[test]
    fn test_version_comparison_is_numeric() {
        assert!(is_newer("4.10.0", "4.9.1"));
        assert!(is_newer("4.2", "4.1.0"));
        assert!(is_newer("v5.0.0 (studio)", "4.1.0"));
        assert!(!is_newer("4.1.0", "4.1.0"));
        assert!(!is_newer("garbage", "4.1.0"));
    }

    #[test]
    fn test_first_newer_source_wins() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.json");
        let new = dir.path().join("new.json");
        fs::write(&old, r#"{"version": "4.0.0"}"#).unwrap();
        fs::write(&new, r#"{"version": "4.2.0", "message": "Timer fixes"}"#).unwrap();

        let sources = vec![dir.path().join("offline.json"), old, new];
        assert_eq!(
            check_update(&config(sources, "4.1.0")),
            UpdateInfo::Available {
                version: "4.2.0".into(),
                message: "Timer fixes".into()
            }
        );
    }

    #[test]
    fn test_no_sources_is_up_to_date() {
        assert_eq!(check_update(&config(vec![], "4.1.0")), UpdateInfo::UpToDate);
    }

    #[test]
    fn test_apply_without_script() {
        let config = config(vec![], "4.1.0");
        assert!(matches!(apply_update(&config), Err(UpdateError::NoSyncScript)));
    }
}
