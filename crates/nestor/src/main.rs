// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nestor - job dispatch, data access and socket propagation.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod dispatch;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nestor_config::NestorConfig;

/// Nestor - job dispatch, data access and socket propagation.
#[derive(Parser, Debug)]
#[command(name = "nestor", version, about, long_about = None)]
struct Cli {
    /// Configuration file to load instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the worker, the event bus and the socket gateway.
    Serve,
    /// Dispatch one job and print its audit record.
    Dispatch {
        /// Queue to publish on.
        queue: String,
        /// The job as JSON, e.g. '{"action": "findAll"}'.
        job: String,
    },
    /// Print the effective configuration as TOML.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> NestorConfig {
    let loaded = match path {
        Some(path) => nestor_config::load_and_validate_path(path),
        None => nestor_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            nestor_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Some(Commands::Serve) => {
            serve::init_tracing(&config.app.log_level);
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Dispatch { queue, job }) => {
            serve::init_tracing(&config.app.log_level);
            match dispatch::run_dispatch(&config, &queue, &job).await {
                Ok(response) => {
                    match serde_json::to_string_pretty(&response) {
                        Ok(json) => println!("{json}"),
                        Err(e) => eprintln!("error: {e}"),
                    }
                    if response.error.is_some() {
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("nestor: use --help for available commands");
        }
    }
}
