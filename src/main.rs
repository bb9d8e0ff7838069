//! Car Simulator - serial ECU simulator
//!
//! Usage:
//!   car-sim --port COM3 --concept fast    Run the simulator
//!   car-sim ports                         List serial ports
//!   car-sim check Response.txt            Validate a response file
//!   car-sim init-config                   Write car-sim.toml

mod cli;

use car_simulator::config::{self, Config};
use car_simulator::constants::{CHANNEL_CAPACITY, DEFAULT_CONFIG_FILE};
use car_simulator::engine::{Engine, Status};
use car_simulator::error::{Result, SimError};
use car_simulator::framer::Concept;
use car_simulator::logging::{self, hex, LogEntry};
use car_simulator::responses::ResponseTable;
use car_simulator::transport::SerialTransport;
use clap::Parser;
use cli::{Cli, Command, HostCommand, HOST_HELP};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = effective_config(cli, &config_path)?;

    match &cli.command {
        Some(Command::Ports) => {
            list_ports(cli.json);
            Ok(())
        }
        Some(Command::Check { file }) => check(
            file.as_deref()
                .unwrap_or(config.simulator.response_file.as_path()),
            config.simulator.concept,
            cli.json,
        ),
        Some(Command::InitConfig) => {
            config::save(&config, &config_path)?;
            println!("Wrote {}", config_path.display());
            Ok(())
        }
        Some(Command::Run) | None => {
            let rt = tokio::runtime::Runtime::new().map_err(|e| SimError::Runtime { source: e })?;
            rt.block_on(run_simulator(config, cli.json))
        }
    }
}

/// Config file values with command-line overrides applied
fn effective_config(cli: &Cli, path: &Path) -> Result<Config> {
    let mut config = config::load(path)?;
    if let Some(port) = &cli.port {
        config.simulator.port = port.clone();
    }
    if let Some(concept) = cli.concept {
        config.simulator.concept = concept;
    }
    if let Some(file) = &cli.responses {
        config.simulator.response_file = file.clone();
    }
    config.engine.validate()?;
    Ok(config)
}

/// Load the response table, falling back to an empty one
///
/// The simulator stays useful without a file: synthesized jobs and the
/// fallback policy still answer.
fn load_table(path: &Path, concept: Concept) -> ResponseTable {
    match ResponseTable::load(path, concept) {
        Ok(table) => table,
        Err(e) => {
            warn!("{}, answering synthesized jobs only", e);
            ResponseTable::empty(concept)
        }
    }
}

// =============================================================================
// Subcommands
// =============================================================================

fn list_ports(json: bool) {
    let ports = SerialTransport::available_ports();
    if json {
        println!("{}", serde_json::json!({ "ports": ports }));
    } else if ports.is_empty() {
        println!("No serial ports found");
    } else {
        for port in ports {
            println!("{}", port);
        }
    }
}

fn check(path: &Path, concept: Concept, json: bool) -> Result<()> {
    let table = ResponseTable::load(path, concept)?;

    if json {
        let warnings: Vec<String> = table.warnings().iter().map(|w| w.to_string()).collect();
        let report = serde_json::json!({
            "file": path.display().to_string(),
            "concept": concept,
            "entries": table.len(),
            "warnings": warnings,
        });
        println!("{}", report);
        return Ok(());
    }

    for entry in table.entries() {
        println!(
            "line {:>4}: {} -> {} ({} telegram{})",
            entry.line,
            hex(&entry.request),
            hex(&entry.response),
            entry.response_list.len(),
            if entry.response_list.len() == 1 { "" } else { "s" }
        );
    }
    for warning in table.warnings() {
        println!("warning: {}", warning);
    }
    println!(
        "{}: {} entries, {} warnings ({})",
        path.display(),
        table.len(),
        table.warnings().len(),
        concept
    );
    Ok(())
}

// =============================================================================
// Interactive session
// =============================================================================

async fn run_simulator(config: Config, json: bool) -> Result<()> {
    let sim = &config.simulator;
    if sim.port.is_empty() {
        return Err(SimError::ConfigValidation {
            field: "simulator.port",
            reason: "no serial port given (use --port or the config file)".into(),
        });
    }

    let (log_tx, mut log_rx) = mpsc::channel::<LogEntry>(CHANNEL_CAPACITY);
    let engine = Engine::new(SerialTransport::new(), config.engine)
        .with_observer(log_tx)
        .with_vehicle(config.vehicle.snapshot());

    let table = load_table(&sim.response_file, sim.concept);
    let status = engine.start(&sim.port, sim.concept, table)?;
    report(&engine, &status, json);
    eprintln!("Type 'help' for commands");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            Some(entry) = log_rx.recv() => print_entry(&entry, json),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<HostCommand>() {
                    Ok(HostCommand::Quit) => break,
                    Ok(cmd) => handle_command(&engine, &config, cmd, json),
                    Err(e) => eprintln!("{}", e),
                },
                Ok(None) => {
                    info!("stdin closed, running until interrupted");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    engine.stop()?;
    while let Ok(entry) = log_rx.try_recv() {
        print_entry(&entry, json);
    }
    Ok(())
}

fn handle_command(engine: &Engine, config: &Config, cmd: HostCommand, json: bool) {
    let sim = &config.simulator;
    let vehicle = engine.vehicle();

    let result = match cmd {
        HostCommand::Moving(value) => {
            engine.set_moving(value.unwrap_or(!vehicle.moving()));
            Ok(())
        }
        HostCommand::VariableValues(value) => {
            engine.set_variable_values(value.unwrap_or(!vehicle.variable_values()));
            Ok(())
        }
        HostCommand::IgnitionOk(value) => {
            engine.set_ignition_ok(value.unwrap_or(!vehicle.ignition_ok()));
            Ok(())
        }
        HostCommand::Start => engine.start_current(&sim.port, sim.concept).map(|_| ()),
        HostCommand::Stop => engine.stop(),
        HostCommand::Reload => ResponseTable::load(&sim.response_file, sim.concept)
            .and_then(|table| engine.reload(table)),
        HostCommand::Status => Ok(()),
        HostCommand::Help => {
            println!("{}", HOST_HELP);
            return;
        }
        HostCommand::Quit => return,
    };

    match result {
        Ok(()) => report(engine, &engine.status(), json),
        Err(e) => eprintln!("Error: {}", e),
    }
}

fn report(engine: &Engine, status: &Status, json: bool) {
    let vehicle = engine.vehicle().snapshot();
    if json {
        let report = serde_json::json!({
            "status": status,
            "vehicle": {
                "moving": vehicle.moving,
                "variable_values": vehicle.variable_values,
                "ignition_ok": vehicle.ignition_ok,
            },
        });
        println!("{}", report);
    } else {
        println!("{}", status);
        println!(
            "vehicle: moving={} variable={} ignition={}",
            vehicle.moving, vehicle.variable_values, vehicle.ignition_ok
        );
    }
}

fn print_entry(entry: &LogEntry, json: bool) {
    if json {
        match serde_json::to_string(entry) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("cannot serialize log entry: {}", e),
        }
    } else {
        println!("{}", entry);
    }
}
