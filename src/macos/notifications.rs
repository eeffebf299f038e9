use crate::events::SessionEvent;
use std::process::Command;
use tokio::sync::broadcast::{self, error::RecvError};

const TITLE: &str = "Studio Tether";

/// Show a macOS notification
///
/// Tries the native notification center first and falls back to osascript.
pub fn show_notification(message: &str) {
    let message = message.to_string();
    std::thread::spawn(move || {
        if let Err(e) = show_notification_native(&message) {
            log::debug!("Native notification failed ({}), falling back to osascript", e);
            if let Err(e) = show_notification_osascript(&message) {
                log::error!("Failed to show notification: {}", e);
            }
        }
    });
}

fn show_notification_native(message: &str) -> Result<(), String> {
    mac_notification_sys::send_notification(TITLE, None, message, None)
        .map(|_| log::debug!("Native notification delivered: {}", message))
        .map_err(|e| e.to_string())
}

fn show_notification_osascript(message: &str) -> Result<(), String> {
    let escaped = message.replace('\\', "\\\\").replace('"', "\\\"");
    let script = format!("display notification \"{}\" with title \"{}\"", escaped, TITLE);

    let output = Command::new("osascript")
        .arg("-e")
        .arg(&script)
        .output()
        .map_err(|e| format!("Failed to execute osascript: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("osascript failed: {}", stderr));
    }

    log::debug!("osascript notification delivered: {}", message);
    Ok(())
}

/// Banner text for events worth interrupting the operator for
fn banner(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Started { session_name, minutes } => {
            Some(format!("Session {} started ({} min)", session_name, minutes))
        }
        SessionEvent::Reminder { message, .. } => Some(message.clone()),
        SessionEvent::Expired => Some("Session time is over".to_string()),
        SessionEvent::Failed { reason } => Some(format!("Session failed: {}", reason)),
        _ => None,
    }
}

/// Mirror session events as desktop notifications until the bus closes
pub async fn forward_events(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Some(text) = banner(&event) {
                    show_notification(&text);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Notification forwarder skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
