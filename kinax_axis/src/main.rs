//! # kinax
//!
//! Command-line front end for an instrument configuration. Builds every
//! actuator and logical axis from one TOML file (simulated drivers), adopts
//! the recovery state file, and runs a single operation against it.
//!
//! ```text
//! kinax --config config/instrument.toml status
//! kinax --config config/instrument.toml move wavelength 2.55
//! ```

use clap::{Parser, Subcommand};
use kinax_axis::config::load_config;
use kinax_axis::context::DeviceContext;
use kinax_axis::recovery::FileStore;
use kinax_common::channel::TracingChannel;
use kinax_common::consts::DEFAULT_STATE_FILE;
use kinax_hal::{DriverRegistry, SimClock};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// kinax: constrained logical axes
#[derive(Parser, Debug)]
#[command(name = "kinax")]
#[command(version)]
#[command(about = "Drive constrained logical axes from an instrument configuration")]
struct Args {
    /// Instrument configuration TOML.
    #[arg(long, default_value = "config/instrument.toml")]
    config: PathBuf,

    /// Recovery state file (overrides `supervisor.state_file`).
    #[arg(long, value_name = "FILE")]
    state_file: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the status of every axis.
    Status,
    /// Read the logical value of one axis.
    Read { axis: String },
    /// Move one axis and wait for verification.
    Move { axis: String, target: f64 },
    /// Check one resting axis against its transform.
    Verify { axis: String },
    /// Stop every axis.
    Stop,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("kinax v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    info!(
        "Config OK: instrument={}, actuators={}, axes={}",
        config.shared.service_name,
        config.actuators.len(),
        config.axes.len()
    );

    let state_file = args
        .state_file
        .clone()
        .or_else(|| config.supervisor.state_file.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));
    let store = Arc::new(FileStore::new(&state_file));
    info!("Recovery state: {}", state_file.display());

    let registry = DriverRegistry::with_simulation(SimClock::wall());
    let context = DeviceContext::build(&config, &registry, Arc::new(TracingChannel), store)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    })?;
    let supervisor = context.supervisor(shutdown);

    let axis = |name: &str| {
        context
            .axis(name)
            .ok_or_else(|| format!("unknown axis {name}"))
    };

    match &args.command {
        Command::Status => print_json(&supervisor.status_all())?,
        Command::Read { axis: name } => {
            let value = axis(name)?.lock().read()?;
            print_json(&serde_json::json!({ "axis": name, "value": value }))?;
        }
        Command::Move { axis: name, target } => {
            let stats = supervisor.move_to(name, *target)?;
            info!(
                "{name} settled in {:?} after {} polls ({})",
                stats.elapsed, stats.polls, stats.state
            );
            print_json(&axis(name)?.lock().status())?;
        }
        Command::Verify { axis: name } => {
            let value = axis(name)?.lock().verify()?;
            print_json(&serde_json::json!({ "axis": name, "value": value, "consistent": true }))?;
        }
        Command::Stop => {
            supervisor.stop_all()?;
            print_json(&supervisor.status_all())?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
