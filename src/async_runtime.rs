//! Shared async runtime
//!
//! One multi-thread tokio runtime runs the dispatcher, every action worker
//! and the session timer. The main thread stays free for the platform event
//! loop (the CFRunLoop that drives the hotkey tap on macOS).

use anyhow::Context;
use std::sync::OnceLock;
use tokio::runtime::Runtime;

static TOKIO_RT: OnceLock<Runtime> = OnceLock::new();

/// Initialize the runtime (called once from main)
pub fn init() -> anyhow::Result<&'static Runtime> {
    if let Some(rt) = TOKIO_RT.get() {
        return Ok(rt);
    }

    log::info!("Initializing shared tokio runtime");
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("studio-tether-worker")
        .build()
        .context("Failed to create Tokio runtime")?;
    Ok(TOKIO_RT.get_or_init(|| rt))
}

/// Spawn a task on the shared runtime; None before `init`
pub fn spawn<F>(future: F) -> Option<tokio::task::JoinHandle<F::Output>>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    TOKIO_RT.get().map(|rt| rt.spawn(future))
}
