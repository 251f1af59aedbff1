//! Doorman
//!
//! Runs the door controller against simulated pins and a JSON settings file,
//! with a console on stdin for presenting cards, toggling inputs and sending
//! HTTP and MQTT requests.

mod console;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doorman_controller::{ControllerConfig, DoorController, SystemRequest, runtime};
use doorman_core::{
    VERSION,
    constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_TICK_MS},
};
use doorman_hardware::BusyPolicy;
use doorman_storage::JsonFileStore;

use console::{Console, ConsoleCommand, Flow, simulated_pins};

/// How often rule notifications are drained and printed.
const NOTIFICATION_POLL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "doorman")]
#[command(version, about = "Door access controller with a simulated hardware console")]
struct Args {
    /// Path to the settings document.
    #[arg(long, env = "DOORMAN_SETTINGS", default_value = "settings.json")]
    settings: PathBuf,

    /// Controller tick period in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TICK_MS, value_parser = clap::value_parser!(u64).range(1..=1000))]
    tick_ms: u64,

    /// Debounce window for the door, exit and reset inputs in milliseconds.
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS)]
    debounce_ms: u64,

    /// Queue one relay pulse while the relay is busy instead of refusing it.
    #[arg(long)]
    queue_pulses: bool,

    /// Accept Wiegand frames without verifying parity.
    #[arg(long)]
    no_parity: bool,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            tick_interval: Duration::from_millis(self.tick_ms),
            debounce: Duration::from_millis(self.debounce_ms),
            check_parity: !self.no_parity,
            busy_policy: if self.queue_pulses {
                BusyPolicy::Queue
            } else {
                BusyPolicy::Reject
            },
            ..ControllerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("doorman=info", args.log_json);

    info!(
        version = VERSION,
        settings = %args.settings.display(),
        tick_ms = args.tick_ms,
        "Starting doorman"
    );

    let mut lines = stdin_lines();
    loop {
        match run_controller(&args, &mut lines).await? {
            SystemRequest::Shutdown => break,
            SystemRequest::Restart => info!("Restarting with saved settings"),
            SystemRequest::Reboot => info!("Rebooting"),
            SystemRequest::FactoryReset => warn!("Rebooting with factory settings"),
        }
    }

    info!("doorman stopped");
    Ok(())
}

fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Forward stdin lines; the channel closes at end of input.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Console input failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Build one controller from the settings file and serve it until it asks
/// for a restart, reboot or shutdown.
async fn run_controller(
    args: &Args,
    lines: &mut mpsc::Receiver<String>,
) -> anyhow::Result<SystemRequest> {
    let config = args.controller_config();
    let (pins, inputs) = simulated_pins();
    let store = Box::new(JsonFileStore::new(&args.settings));
    let (controller, edges) = DoorController::new(config, pins, store, runtime::now());

    let (handle, mut task) = runtime::spawn_controller(controller, config.tick_interval);
    let console = Console::new(handle, edges, inputs);
    let mut notifications = time::interval(NOTIFICATION_POLL);
    let mut console_open = true;

    loop {
        tokio::select! {
            outcome = &mut task => return Ok(outcome?),
            _ = notifications.tick() => {
                if let Err(e) = console.flush_notifications().await {
                    debug!(error = %e, "Notification poll failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.recv(), if console_open => match line {
                Some(line) => match ConsoleCommand::parse(&line) {
                    Ok(Some(command)) => match console.run(command).await {
                        Ok(Flow::Quit) => break,
                        Ok(Flow::Continue) => {}
                        Err(e) => println!("error: {e}"),
                    },
                    Ok(None) => {}
                    Err(e) => println!("error: {e}"),
                },
                None => {
                    debug!("Console input closed");
                    console_open = false;
                }
            },
        }
    }

    if let Err(e) = console.handle().shutdown().await {
        debug!(error = %e, "Controller already stopped");
    }
    Ok(task.await?)
}
