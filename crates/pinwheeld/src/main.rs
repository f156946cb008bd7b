//! pinwheeld: the Pinwheel daemon.
//!
//! Single binary that assembles the Pinwheel subsystems:
//! - State store (redb)
//! - Gate flags (config file, overridden by persisted flags)
//! - Reconciliation engine
//! - Event-bus worker
//! - REST API + metrics
//!
//! # Usage
//!
//! ```text
//! pinwheeld serve --port 8080 --data-dir /var/lib/pinwheel --config pinwheel.toml
//! pinwheeld default-config > pinwheel.toml
//! ```

mod bus;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pinwheel_core::PinwheelConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,pinwheeld=debug,pinwheel=debug";

#[derive(Parser)]
#[command(name = "pinwheeld", about = "Pinwheel deployment reconciliation daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server, bus worker, and engine in one process.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/pinwheel")]
        data_dir: PathBuf,

        /// Path to pinwheel.toml. Built-in defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the default configuration as TOML.
    DefaultConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    match cli.command {
        Command::Serve {
            port,
            data_dir,
            config,
        } => {
            let config = match config {
                Some(path) => PinwheelConfig::from_file(&path)?,
                None => PinwheelConfig::default(),
            };
            serve::run_serve(port, data_dir, config).await
        }
        Command::DefaultConfig => {
            print!("{}", PinwheelConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(DEFAULT_LOG_FILTER)?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
