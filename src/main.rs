use std::{error::Error, process, time::Duration};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, warn, LevelFilter};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::broadcast,
};

use pandero::{
    config::Config, events::PlaybackEvent, gateway::Gateway, monitor::EventMonitor,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    ///
    /// Ensure that this file is kept secure and not shared publicly, as it
    /// contains the credentials that grant access to your Pandora account.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("pandero.toml"))]
    config: String,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Main application loop.
///
/// Bridges the monitor to the outside world: raw playback events come in as
/// JSON lines on stdin, outbound monitor events leave as JSON lines on
/// stdout. Runs until the input stream ends or a shutdown signal arrives.
///
/// # Errors
///
/// This function returns an error when the configuration cannot be loaded or
/// one of the standard streams fails.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Config::from_file(&args.config)?;

    if !config.event_support_enabled {
        info!("event support is disabled; nothing to monitor");
        return Ok(());
    }

    let gateway = Gateway::new(&config)?;
    let monitor = EventMonitor::start(&config, gateway);
    let mut events = monitor.subscribe();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut input_open = true;

    // Once the input stream ends, armed recognizers may still settle; keep
    // draining outbound events for one full gesture window before exiting.
    let drain_timer = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(drain_timer);

    loop {
        tokio::select! {
            // Prioritize shutdown signals.
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("shutting down gracefully");
                break Ok(());
            }

            () = &mut drain_timer, if !input_open => {
                break Ok(());
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let mut line = serde_json::to_string(&event)?;
                        line.push('\n');
                        stdout.write_all(line.as_bytes()).await?;
                        stdout.flush().await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("dropped {skipped} outbound events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break Ok(()),
                }
            }

            line = lines.next_line(), if input_open => {
                match line? {
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<PlaybackEvent>(line) {
                            Ok(event) => monitor.on_event(event)?,
                            Err(e) => warn!("skipping malformed input line: {e}"),
                        }
                    }
                    None => {
                        info!("event stream ended");
                        input_open = false;
                        let grace = config.interval() * 2 + Duration::from_secs(1);
                        drain_timer.as_mut().reset(tokio::time::Instant::now() + grace);
                    }
                }
            }
        }
    }
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and starts the main application loop.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
