// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! pkgrelay - package creation and forwarding service.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pkgrelay_config::{ConfigError, PkgrelayConfig};

/// pkgrelay - package creation and forwarding service.
#[derive(Parser, Debug)]
#[command(name = "pkgrelay", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the queue consumer and the HTTP gateway.
    Serve,
    /// Push a delivery envelope (JSON file, `-` for stdin) onto the inbound queue.
    Enqueue {
        file: PathBuf,
        /// Queue to push onto. Defaults to `queue.inbound`.
        #[arg(long)]
        queue: Option<String>,
    },
    /// Print a package's status and event history.
    Status {
        name: String,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Validate configuration and report every problem found.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<PkgrelayConfig, Vec<ConfigError>> {
    match path {
        Some(path) => pkgrelay_config::load_and_validate_path(path),
        None => pkgrelay_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            pkgrelay_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Enqueue { file, queue }) => {
            commands::run_enqueue(&config, &file, queue.as_deref()).await
        }
        Some(Commands::Status { name, json }) => commands::run_status(&config, &name, json).await,
        Some(Commands::CheckConfig) => {
            println!(
                "pkgrelay: configuration is valid (service.name={})",
                config.service.name
            );
            Ok(())
        }
        None => {
            println!("pkgrelay: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["pkgrelay", "status", "msg-1", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Status { ref name, json: true }) if name == "msg-1"
        ));

        let cli =
            Cli::try_parse_from(["pkgrelay", "--config", "/tmp/p.toml", "enqueue", "req.json"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert!(matches!(cli.command, Some(Commands::Enqueue { queue: None, .. })));

        assert!(matches!(
            Cli::try_parse_from(["pkgrelay", "check-config"]).unwrap().command,
            Some(Commands::CheckConfig)
        ));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkgrelay.toml");
        std::fs::write(&path, "[service]\nname = \"relay-test\"\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.service.name, "relay-test");
    }
}
