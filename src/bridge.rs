//! Trigger side: hotkeys and console commands become `Action`s
//!
//! Triggers only enqueue. The dispatch loop hands every action to its own
//! worker task and turns its outcome into a `Status` event, so a slow focus
//! wait or a failing macro never blocks or crashes the loop.

use crate::error::SessionError;
use crate::events::{EventBus, SessionEvent, format_clock};
use crate::params::Params;
use crate::session::Orchestrator;
use crate::update::{self, UpdateInfo};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Delay between launching the sync script and exiting
const UPDATE_EXIT_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    StartSession { minutes: u32 },
    StartBasic,
    StartPremium,
    EndSession,
    ExportAll,
    CompressExports,
    CheckUpdate,
    ApplyUpdate,
    Status,
}

impl Action {
    /// Resolve a config action name; `start_session` reads `minutes` from params
    pub fn from_name(name: &str, params: &Params) -> Option<Self> {
        let action = match name {
            "start_session" => {
                let minutes = u32::try_from(params.get_int("minutes", 30)).ok()?;
                if minutes == 0 {
                    return None;
                }
                Action::StartSession { minutes }
            }
            "start_basic" => Action::StartBasic,
            "start_premium" => Action::StartPremium,
            "end_session" => Action::EndSession,
            "export_all" => Action::ExportAll,
            "compress_exports" => Action::CompressExports,
            "check_update" => Action::CheckUpdate,
            "apply_update" => Action::ApplyUpdate,
            "status" => Action::Status,
            _ => return None,
        };
        Some(action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Run(Action),
    Help,
    Quit,
}

pub const CONSOLE_HELP: &str = "\
Commands:
  start <minutes>   start a session of the given length
  basic | premium   start a session with the configured length
  end               end the session and close Lightroom
  export            select all and export from Lightroom
  compress          zip the export folder
  status            show the session state
  update            check for a new version
  apply-update      run the sync script and exit
  help | quit";

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err("empty command".to_string());
    };

    let action = match command.to_lowercase().as_str() {
        "start" => {
            let arg = words.next().ok_or("usage: start <minutes>")?;
            match arg.parse::<u32>() {
                Ok(minutes) if minutes > 0 => Action::StartSession { minutes },
                _ => return Err(format!("not a session length: {}", arg)),
            }
        }
        "basic" => Action::StartBasic,
        "premium" => Action::StartPremium,
        "end" | "stop" => Action::EndSession,
        "export" => Action::ExportAll,
        "compress" | "zip" => Action::CompressExports,
        "status" => Action::Status,
        "update" => Action::CheckUpdate,
        "apply-update" => Action::ApplyUpdate,
        "help" | "?" => return Ok(ConsoleCommand::Help),
        "quit" | "exit" => return Ok(ConsoleCommand::Quit),
        other => return Err(format!("unknown command: {} (try 'help')", other)),
    };
    Ok(ConsoleCommand::Run(action))
}

/// Runs actions against the orchestrator and reports their outcome
#[derive(Clone)]
pub struct Bridge {
    orchestrator: Orchestrator,
}

impl Bridge {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    fn events(&self) -> &EventBus {
        self.orchestrator.events()
    }

    /// Run `action` on its own worker; the outcome is published as a status
    pub fn dispatch(&self, action: Action) -> JoinHandle<()> {
        log::info!("Dispatching {:?}", action);
        let bridge = self.clone();
        tokio::spawn(async move {
            let message = bridge.run(action).await;
            bridge.events().publish(SessionEvent::status(message));
        })
    }

    /// Perform an action; every failure is folded into the returned text
    pub async fn run(&self, action: Action) -> String {
        let config = self.orchestrator.config();
        match action {
            Action::StartSession { minutes } => self.start(minutes).await,
            Action::StartBasic => self.start(config.duration_basic).await,
            Action::StartPremium => self.start(config.duration_premium).await,
            Action::EndSession => match self.orchestrator.end().await {
                Ok(message) => message,
                Err(e) => e.to_string(),
            },
            Action::ExportAll => match self.orchestrator.export_all().await {
                Ok(message) => message,
                Err(e) => format!("Export failed: {}", e),
            },
            Action::CompressExports => match self.orchestrator.compress_exports().await {
                Ok(path) => format!("Compressed: {}", path.display()),
                Err(e) => e.to_string(),
            },
            Action::CheckUpdate => {
                let update = config.update.clone();
                match tokio::task::spawn_blocking(move || update::check_update(&update)).await {
                    Ok(UpdateInfo::Available { version, message }) => {
                        format!("Update {} available: {}", version, message)
                    }
                    Ok(UpdateInfo::UpToDate) => {
                        format!("Up to date ({})", config.update.local_version)
                    }
                    Err(e) => SessionError::Worker(e.to_string()).to_string(),
                }
            }
            Action::ApplyUpdate => match update::apply_update(&config.update) {
                Ok(script) => {
                    log::info!("Exiting for update via {}", script.display());
                    tokio::spawn(async {
                        tokio::time::sleep(UPDATE_EXIT_DELAY).await;
                        std::process::exit(0);
                    });
                    "Update started...".to_string()
                }
                Err(e) => format!("Update failed: {}", e),
            },
            Action::Status => self.orchestrator.status().to_string(),
        }
    }

    async fn start(&self, minutes: u32) -> String {
        let worker = match self.orchestrator.start(minutes) {
            Ok(worker) => worker,
            Err(e) => return e.to_string(),
        };
        match worker.await {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => format!("Start failed: {}", e),
            Err(e) => SessionError::Worker(e.to_string()).to_string(),
        }
    }
}

/// Drain triggered actions until every sender is gone
pub async fn dispatch_loop(bridge: Bridge, mut actions: UnboundedReceiver<Action>) {
    while let Some(action) = actions.recv().await {
        bridge.dispatch(action);
    }
    log::info!("Action channel closed");
}

/// Read console commands from stdin; true if the operator asked to quit,
/// false on EOF or when the dispatcher is gone
pub async fn console_loop(actions: UnboundedSender<Action>) -> bool {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return false,
            Err(e) => {
                log::error!("Failed to read stdin: {}", e);
                return false;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(ConsoleCommand::Run(action)) => {
                if actions.send(action).is_err() {
                    return false;
                }
            }
            Ok(ConsoleCommand::Help) => println!("{}", CONSOLE_HELP),
            Ok(ConsoleCommand::Quit) => return true,
            Err(e) => eprintln!("{}", e),
        }
    }
}

/// Human-readable console line for an event; quiet ticks return None
pub fn describe_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Status { message } => Some(message.clone()),
        SessionEvent::Started {
            session_name,
            minutes,
        } => Some(format!("Session {} started, {} min", session_name, minutes)),
        SessionEvent::Tick { remaining_seconds } if remaining_seconds % 60 == 0 => {
            Some(format!("{} remaining", format_clock(*remaining_seconds)))
        }
        SessionEvent::Tick { .. } => None,
        SessionEvent::Reminder { message, .. } => Some(message.clone()),
        SessionEvent::Expired => Some("Time is up".to_string()),
        SessionEvent::Ended => Some("Session ended".to_string()),
        SessionEvent::Failed { reason } => Some(format!("Failed: {}", reason)),
    }
}

/// Print events to stdout, as JSON lines when `json` is set
pub async fn print_events(mut events: broadcast::Receiver<SessionEvent>, json: bool) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Event printer skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => log::error!("Failed to encode event: {}", e),
            }
        } else if let Some(line) = describe_event(&event) {
            println!("{}", line);
        }
    }
}
