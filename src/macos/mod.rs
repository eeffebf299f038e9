//! macOS platform integration
//!
//! Window focus goes through NSWorkspace and the Accessibility API, keystrokes
//! through CGEvent, hotkeys through a session event tap.

pub mod ffi;
pub mod events;
pub mod keystroke;
pub mod notifications;

mod app;

pub use app::MacDesktop;
pub use events::{install_hotkeys, run_event_loop};
pub use notifications::forward_events;
