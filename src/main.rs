//! Plant Ledger CLI
//!
//! Operates on a persisted ledger state file: each mutating command loads
//! the state, applies one operation and saves it back.

use anyhow::{bail, Context};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use plant_ledger::{
    audit::create_shared_audit_log_with_persistence,
    config::Config,
    core::{HealthSnapshot, OwnerId, PlantId, PlantStatus},
    ledger::{Ledger, SystemClock},
    store, TracingSink, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plant-ledger")]
#[command(version = VERSION)]
#[command(about = "Append-only plant health ledger", long_about = None)]
struct Cli {
    /// Ledger state file (defaults to the configured data directory)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Identity to act as
    #[arg(long = "as", global = true, env = "PLANT_LEDGER_CALLER")]
    caller: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new plant owned by the caller
    Register {
        name: String,
        species: String,
    },

    /// Submit a health reading
    Submit {
        id: u64,
        /// Soil moisture, percent
        #[arg(long)]
        moisture: u8,
        /// Temperature in hundredths of a degree Celsius
        #[arg(long, allow_hyphen_values = true)]
        temperature: i32,
        /// Relative humidity, percent
        #[arg(long)]
        humidity: u8,
        /// pH in hundredths (e.g. 650 for 6.50)
        #[arg(long)]
        ph: u16,
        /// Light intensity in lux
        #[arg(long)]
        light: u32,
    },

    /// Transfer a plant to a new owner
    Transfer { id: u64, new_owner: String },

    /// Mark a plant active or dormant
    #[command(name = "status-set")]
    SetStatus {
        id: u64,
        #[arg(value_parser = parse_status)]
        status: PlantStatus,
    },

    /// Show a plant
    Show { id: u64 },

    /// Show reading history
    History {
        id: u64,
        /// Number of most recent readings (0 = all)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Show analytics for a plant
    Analyze {
        id: u64,
        /// Include per-metric window statistics
        #[arg(long)]
        extended: bool,
    },

    /// List plants held by an owner (defaults to the caller)
    Owned { owner: Option<String> },

    /// Show ledger activity counters
    Stats,

    /// Show configuration
    Config,

    /// Serve the ledger over HTTP
    #[cfg(feature = "server")]
    Serve {
        /// Port to bind to (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn parse_status(s: &str) -> Result<PlantStatus, String> {
    match s.to_lowercase().as_str() {
        "active" => Ok(PlantStatus::Active),
        "dormant" => Ok(PlantStatus::Dormant),
        other => Err(format!("unknown status '{other}' (expected active or dormant)")),
    }
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    init_tracing(&config);

    if let Err(e) = run(cli, config) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Files used for one state file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StatePaths {
    state: PathBuf,
    audit: PathBuf,
    #[cfg_attr(not(feature = "server"), allow(dead_code))]
    events: PathBuf,
}

impl StatePaths {
    /// An explicit `--state` keeps its audit and event files beside it.
    fn resolve(explicit: Option<PathBuf>, config: &Config) -> Self {
        match explicit {
            Some(state) => Self {
                audit: state.with_extension("audit.json"),
                events: state.with_extension("events.jsonl"),
                state,
            },
            None => Self {
                state: config.state_path(),
                audit: config.audit_path(),
                events: config.data_path.join("events.jsonl"),
            },
        }
    }
}

fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let paths = StatePaths::resolve(cli.state, &config);
    let caller = cli.caller.as_deref().map(OwnerId::new);

    match cli.command {
        Commands::Register { name, species } => {
            let owner = require_caller(caller)?;
            let id = mutate(&paths, |ledger| Ok(ledger.register(&name, &species, &owner)?))?;
            println!("Registered plant {id} ({name}, {species}) for {owner}");
        }
        Commands::Submit {
            id,
            moisture,
            temperature,
            humidity,
            ph,
            light,
        } => {
            let who = require_caller(caller)?;
            let reading = HealthSnapshot::new(moisture, temperature, humidity, ph, light);
            let outcome = mutate(&paths, |ledger| Ok(ledger.submit(PlantId(id), reading, &who)?))?;

            println!(
                "Recorded reading for plant {id} at {} | score: {}",
                format_time(outcome.snapshot.timestamp),
                outcome.score
            );
            for alert in &outcome.alerts {
                println!("  [{}] {}", alert.kind, alert.message);
            }
        }
        Commands::Transfer { id, new_owner } => {
            let who = require_caller(caller)?;
            let new_owner = OwnerId::new(new_owner);
            mutate(&paths, |ledger| Ok(ledger.transfer(PlantId(id), &new_owner, &who)?))?;
            println!("Transferred plant {id} to {new_owner}");
        }
        Commands::SetStatus { id, status } => {
            let who = require_caller(caller)?;
            mutate(&paths, |ledger| Ok(ledger.set_status(PlantId(id), status, &who)?))?;
            println!("Plant {id} is now {status}");
        }
        Commands::Show { id } => {
            let ledger = open_ledger(&paths)?;
            let plant = ledger.plant(PlantId(id))?;
            println!("{}", serde_json::to_string_pretty(&plant)?);
        }
        Commands::History { id, limit } => {
            let ledger = open_ledger(&paths)?;
            let readings = ledger.history(PlantId(id), limit)?;
            if readings.is_empty() {
                println!("No readings recorded for plant {id}");
            }
            for r in readings {
                println!(
                    "[{}] moisture: {}% | temp: {:.2}°C | humidity: {}% | pH: {:.2} | light: {} lx",
                    format_time(r.timestamp),
                    r.soil_moisture,
                    f64::from(r.temperature) / 100.0,
                    r.humidity,
                    f64::from(r.ph) / 100.0,
                    r.light_intensity
                );
            }
        }
        Commands::Analyze { id, extended } => {
            let ledger = open_ledger(&paths)?;
            let report = ledger.analyze(PlantId(id))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if extended {
                let window = ledger.window_statistics(PlantId(id))?;
                println!("{}", serde_json::to_string_pretty(&window)?);
            }
        }
        Commands::Owned { owner } => {
            let owner = match owner {
                Some(o) => OwnerId::new(o),
                None => require_caller(caller)?,
            };
            let ledger = open_ledger(&paths)?;
            let mut plants = ledger.owner_set_of(&owner);
            plants.sort();
            if plants.is_empty() {
                println!("{owner} holds no plants");
            } else {
                let ids: Vec<String> = plants.iter().map(PlantId::to_string).collect();
                println!("{owner} holds plants: {}", ids.join(", "));
            }
        }
        Commands::Stats => {
            let ledger = open_ledger(&paths)?;
            println!("Plants: {}", ledger.total_plants());
            println!("Readings: {}", ledger.total_readings());
            println!();
            println!("{}", ledger.audit().summary());
        }
        Commands::Config => {
            println!("Config file: {:?}", Config::config_path());
            println!("State file: {:?}", paths.state);
            println!("Audit file: {:?}", paths.audit);
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        #[cfg(feature = "server")]
        Commands::Serve { port } => {
            store::with_exclusive_lock(&paths.state, store::LOCK_TIMEOUT, || {
                serve(&paths, &config, port)
            })?;
        }
    }

    Ok(())
}

fn require_caller(caller: Option<OwnerId>) -> anyhow::Result<OwnerId> {
    match caller {
        Some(id) if !id.is_null() => Ok(id),
        _ => bail!("this command needs an identity: pass --as <IDENTITY> or set PLANT_LEDGER_CALLER"),
    }
}

fn format_time(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Load the ledger from the state file, or start an empty one.
fn open_ledger(paths: &StatePaths) -> anyhow::Result<Ledger> {
    let path = &paths.state;
    let audit = create_shared_audit_log_with_persistence(paths.audit.clone());
    let ledger = match store::load_if_exists(path)
        .with_context(|| format!("failed to read ledger state from {path:?}"))?
    {
        Some(snapshot) => Ledger::restore(snapshot, SystemClock)
            .with_context(|| format!("ledger state in {path:?} is invalid"))?,
        None => Ledger::new(SystemClock),
    };
    Ok(ledger.with_audit(audit).with_sink(Arc::new(TracingSink)))
}

/// Apply one mutation under the state file lock and save the result.
///
/// Audit counters are saved even when the mutation is rejected.
fn mutate<T>(paths: &StatePaths, f: impl FnOnce(&Ledger) -> anyhow::Result<T>) -> anyhow::Result<T> {
    store::with_exclusive_lock(&paths.state, store::LOCK_TIMEOUT, || {
        let ledger = open_ledger(paths)?;
        let result = f(&ledger);
        if result.is_ok() {
            save_state(&paths.state, &ledger)?;
        }
        save_audit(&ledger);
        result
    })
}

fn save_state(path: &Path, ledger: &Ledger) -> anyhow::Result<()> {
    store::save(path, &ledger.snapshot())
        .with_context(|| format!("failed to write ledger state to {path:?}"))
}

fn save_audit(ledger: &Ledger) {
    if let Err(e) = ledger.audit().save() {
        tracing::warn!(error = %e, "could not save audit stats");
    }
}

/// Serve until Ctrl+C. Runs with the state file lock held, so CLI
/// mutations against the same file wait and then fail instead of being
/// overwritten by the server.
#[cfg(feature = "server")]
fn serve(paths: &StatePaths, config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    use plant_ledger::server::{run as run_server, ServerConfig};
    use plant_ledger::ChannelSink;
    use std::io::Write;

    // Events are appended to a JSON Lines log by a dedicated thread, in delivery order.
    let (sink, receiver) = ChannelSink::bounded(config.event_channel_capacity);
    let events_path = paths.events.clone();
    if let Some(parent) = events_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("could not create directory {parent:?}"))?;
    }
    let mut events_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&events_path)
        .with_context(|| format!("could not open event log {events_path:?}"))?;
    let writer = std::thread::spawn(move || {
        for envelope in receiver {
            match serde_json::to_string(&envelope) {
                Ok(line) => {
                    if let Err(e) = writeln!(events_file, "{line}") {
                        tracing::warn!(error = %e, "failed to append event");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
            }
        }
    });

    let ledger = Arc::new(open_ledger(paths)?.with_sink(Arc::new(sink)));
    let server_config = ServerConfig::new(
        config.server.host.clone(),
        port.unwrap_or(config.server.port),
        Some(paths.state.clone()),
    );

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("error setting Ctrl+C handler")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async {
        let handle = run_server(server_config, ledger.clone()).await?;
        println!("Plant Ledger v{VERSION} listening on http://{}", handle.addr());
        println!("Press Ctrl+C to stop");

        tokio::task::spawn_blocking(move || stop_rx.recv())
            .await
            .context("signal wait failed")?
            .ok();
        handle.shutdown().await;
        anyhow::Ok(())
    })?;

    save_state(&paths.state, &ledger)?;
    save_audit(&ledger);
    // Dropping the ledger drops the channel sender and ends the writer thread.
    drop(ledger);
    if writer.join().is_err() {
        tracing::warn!("event writer thread panicked");
    }

    println!();
    println!("Stopped.");
    Ok(())
}
