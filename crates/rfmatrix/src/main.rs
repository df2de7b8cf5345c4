// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RF Matrix Switch CLI
//!
//! Command-line front end for the matrix client.
//!
//! # Usage
//!
//! ```bash
//! # Full status, as a table or JSON
//! rfmatrix --host 192.168.1.50 status
//! rfmatrix --host 192.168.1.50 status --json
//!
//! # Health flags only
//! rfmatrix --host 192.168.1.50 status --quick
//!
//! # Alias table
//! rfmatrix --host 192.168.1.50 aliases
//!
//! # Route input 5 to output 2, or inputs 5/6 to outputs 1/2
//! rfmatrix --host 192.168.1.50 route --output 2 --input 5
//! rfmatrix --host 192.168.1.50 route --output 1 --input 5 --pair
//!
//! # Continuous monitoring from a config file
//! rfmatrix --config matrix.toml monitor
//! ```

use clap::{Parser, Subcommand};
use rfmatrix::{
    ConfigError, HealthFlag, MatrixClient, MatrixConfig, MatrixEvent, MatrixSnapshot,
    PollOutcome,
};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// RF matrix switch control and monitoring
#[derive(Parser, Debug)]
#[command(name = "rfmatrix")]
#[command(about = "RF matrix switch control and monitoring client")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Device TCP port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll aliases and status continuously and print changes
    Monitor,

    /// Query status once
    Status {
        /// Health flags only
        #[arg(short, long)]
        quick: bool,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query the alias table once
    Aliases,

    /// Route an input to an output
    Route {
        /// Output number (1-based)
        #[arg(short, long)]
        output: usize,

        /// Input number
        #[arg(short, long)]
        input: usize,

        /// Route the odd-anchored pair output/output+1 from input/input+1
        #[arg(long)]
        pair: bool,
    },

    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "matrix.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Commands::GenConfig { ref output } => return cmd_gen_config(output),
        Commands::Validate { ref config } => return cmd_validate(config),
        _ => {}
    }

    let config = build_config(&args)?;
    let client = MatrixClient::new(config)?;

    match args.command {
        Commands::Monitor => cmd_monitor(client).await,
        Commands::Status { quick, json } => cmd_status(client, quick, json).await,
        Commands::Aliases => cmd_aliases(client).await,
        Commands::Route {
            output,
            input,
            pair,
        } => cmd_route(client, output, input, pair).await,
        Commands::GenConfig { .. } | Commands::Validate { .. } => Ok(()),
    }
}

fn build_config(args: &Args) -> Result<MatrixConfig, ConfigError> {
    let mut config = match args.config {
        Some(ref path) => MatrixConfig::from_file(path)?,
        None => MatrixConfig::default(),
    };

    if let Some(ref host) = args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.log_level = args.log_level.clone();

    config.validate()?;
    Ok(config)
}

async fn cmd_monitor(client: MatrixClient) -> Result<(), Box<dyn std::error::Error>> {
    let config = client.config();
    println!("RF Matrix Monitor v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!("Device: {} ({}:{})", config.name, config.host, config.port);
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let mut events = client.subscribe();
    let pollers = client.start_polling();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&client, &event),
                Err(RecvError::Lagged(n)) => tracing::warn!("Dropped {} events", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    println!("\nShutting down...");
    pollers.shutdown().await;
    print_snapshot(&client.snapshot());
    Ok(())
}

async fn cmd_status(
    client: MatrixClient,
    quick: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = if quick {
        client.refresh_quick_status().await?
    } else {
        client.refresh_status().await?
    };
    report_outcome(outcome);

    let snapshot = client.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

async fn cmd_aliases(client: MatrixClient) -> Result<(), Box<dyn std::error::Error>> {
    report_outcome(client.refresh_aliases().await?);

    let snapshot = client.snapshot();
    println!("--- Outputs ---");
    for out in &snapshot.outputs {
        println!("  {:>3}  {}", out.index, out.name);
    }
    println!("--- Inputs ---");
    for input in &snapshot.inputs {
        println!("  {:>3}  {}", input.index, input.name);
    }
    Ok(())
}

async fn cmd_route(
    client: MatrixClient,
    output: usize,
    input: usize,
    pair: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if pair {
        client.route_pair(output, input).await?;
        println!(
            "Routed inputs {}/{} -> outputs {}/{}",
            input,
            input + 1,
            output,
            output + 1
        );
    } else {
        client.route(output, input).await?;
        println!("Routed input {} -> output {}", input, output);
    }
    Ok(())
}

fn cmd_gen_config(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = MatrixConfig {
        name: "lab-matrix".into(),
        host: "192.168.1.50".into(),
        inputs: Some(16),
        outputs: Some(16),
        ..Default::default()
    };

    let toml_str = toml::to_string_pretty(&config)?;
    let content = format!(
        r#"# RF Matrix Client Configuration
# Generated by rfmatrix gen-config

{}
"#,
        toml_str
    );

    std::fs::write(output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match MatrixConfig::from_file(config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Device:  {}", config.name);
            println!("Address: {}:{}", config.host, config.port);
            println!(
                "Packets: DA={} SA={}",
                config.dest_address, config.source_address
            );
            println!(
                "Polling: aliases every {:?}, status every {:?} ({:?})",
                config.alias_interval(),
                config.status_interval(),
                config.status_mode
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn report_outcome(outcome: PollOutcome) {
    match outcome {
        PollOutcome::Updated => {}
        PollOutcome::NoData => eprintln!("Warning: device closed the connection without a reply"),
        PollOutcome::Unparsable => eprintln!("Warning: device reply could not be parsed"),
    }
}

fn print_event(client: &MatrixClient, event: &MatrixEvent) {
    match event {
        MatrixEvent::TopologyChanged { inputs, outputs } => {
            println!("Topology: {} inputs x {} outputs", inputs, outputs);
        }
        MatrixEvent::AliasesChanged => println!("Aliases updated"),
        MatrixEvent::RoutingChanged { outputs } => {
            client.with_state(|state| {
                for &out in outputs {
                    let input = state.routed_input(out);
                    println!(
                        "Route: {} <- {}",
                        state.output_name(out),
                        if input == 0 {
                            "-".to_string()
                        } else {
                            state.input_name(input as usize)
                        }
                    );
                }
            });
        }
        MatrixEvent::HealthChanged { flags } => {
            let parts: Vec<String> = HealthFlag::ALL
                .iter()
                .map(|&f| format!("{}={}", f.name(), flags.get(f)))
                .collect();
            println!("Health: {}", parts.join(" "));
        }
        MatrixEvent::SelectionChanged { output } => println!("Selection: {:?}", output),
        MatrixEvent::ConnectionChanged { health } => println!("Connection: {}", health),
    }
}

fn print_snapshot(snapshot: &MatrixSnapshot) {
    println!("--- Matrix Status ---");
    println!(
        "  {} inputs x {} outputs ({:?}), connection {}",
        snapshot.topology.inputs,
        snapshot.topology.outputs,
        snapshot.topology.source,
        snapshot.connection
    );
    for flag in HealthFlag::ALL {
        let value = snapshot.health.get(flag).to_string();
        println!(
            "  {:<8} {}",
            flag.name(),
            if value.is_empty() { "?" } else { value.as_str() }
        );
    }
    for out in &snapshot.outputs {
        println!(
            "  {:>3} {:<16} <- {}",
            out.index,
            out.name,
            if out.source == 0 {
                "-".to_string()
            } else {
                format!("{} ({})", out.source, out.source_name)
            }
        );
    }
    if !snapshot.last_error.is_empty() {
        println!("  last error: {}", snapshot.last_error);
    }
}
