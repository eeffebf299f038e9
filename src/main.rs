mod archive;
mod async_runtime;
mod bridge;
mod config;
mod desktop;
mod error;
mod events;
mod hotkey;
mod keycodes;
#[cfg(target_os = "macos")]
mod macos;
mod notifier;
mod params;
mod session;
mod update;

use anyhow::Context;
use bridge::{Action, Bridge};
use clap::Parser;
use config::StudioConfig;
use events::EventBus;
use notifier::SoundPlayer;
use session::Orchestrator;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedSender};

/// Lightroom tethering session helper: hotkeys, countdown and exports
#[derive(Debug, Parser)]
#[command(name = "studio-tether", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "STUDIO_TETHER_CONFIG", default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log file, appended to across runs
    #[arg(long, default_value = "studio-tether.log")]
    log_file: PathBuf,

    /// Console commands only, no global hotkeys
    #[arg(long)]
    no_hotkeys: bool,

    /// Print session events to stdout as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = init_logging(&cli.log_file)?;
    log::info!("=== studio-tether {} starting ===", env!("CARGO_PKG_VERSION"));
    log::info!("Logging to {}", log_path);

    let config = Arc::new(StudioConfig::load(&cli.config));
    let rt = async_runtime::init()?;

    let events = EventBus::default();
    let (desktop, keyboard) = desktop::system();
    let notifier = Arc::new(SoundPlayer::new(
        config.sound.dir.clone(),
        config.sound.player.clone(),
    ));
    let orchestrator = Orchestrator::new(config.clone(), desktop, keyboard, notifier, events.clone());

    let (tx, rx) = mpsc::unbounded_channel::<Action>();
    async_runtime::spawn(bridge::dispatch_loop(Bridge::new(orchestrator), rx));
    async_runtime::spawn(bridge::print_events(events.subscribe(), cli.json));

    if !cli.json {
        println!("studio-tether ready. Type 'help' for commands.");
    }

    run_triggers(rt, &cli, &config, &events, tx)
}

/// Hotkeys on the main run loop, console on the runtime
#[cfg(target_os = "macos")]
fn run_triggers(
    rt: &'static Runtime,
    cli: &Cli,
    config: &StudioConfig,
    events: &EventBus,
    actions: UnboundedSender<Action>,
) -> anyhow::Result<()> {
    async_runtime::spawn(macos::forward_events(events.subscribe()));

    if cli.no_hotkeys || config.hotkeys.is_empty() {
        log::info!("Hotkeys disabled, console only");
        rt.block_on(bridge::console_loop(actions));
        return Ok(());
    }

    macos::install_hotkeys(config.hotkeys.clone(), actions.clone())
        .context("Failed to install hotkeys")?;

    async_runtime::spawn(async move {
        if bridge::console_loop(actions).await {
            log::info!("Quit requested from console");
            std::process::exit(0);
        }
        log::info!("Console closed, hotkeys stay active");
    });

    log::info!("Listening for hotkeys...");
    macos::run_event_loop();
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run_triggers(
    rt: &'static Runtime,
    cli: &Cli,
    config: &StudioConfig,
    _events: &EventBus,
    actions: UnboundedSender<Action>,
) -> anyhow::Result<()> {
    if !cli.no_hotkeys && !config.hotkeys.is_empty() {
        log::warn!("Global hotkeys need macOS; running with the console only");
    }
    rt.block_on(bridge::console_loop(actions));
    Ok(())
}

/// Initialize logging to an append-mode file
/// Returns the absolute path to the log file
fn init_logging(log_file: &Path) -> anyhow::Result<String> {
    use std::env;
    use std::fs::OpenOptions;

    let absolute_path = env::current_dir()
        .context("Failed to get current directory")?
        .join(log_file)
        .to_string_lossy()
        .to_string();

    let target = Box::new(
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context("Failed to open log file for writing")?,
    );

    // Info unless RUST_LOG says otherwise
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(target))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    Ok(absolute_path)
}
