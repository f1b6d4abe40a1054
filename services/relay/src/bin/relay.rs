use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use relay_core::{RelayConfig, SessionRegistry};
use tracing::error;

/// Line-oriented TCP chat relay.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "Named-session chat relay")]
struct Cli {
    /// Listen port (default 10000).
    port: Option<u16>,

    /// Optional YAML config file; overrides `port` when given.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    chat_protocol::logging::init();

    let config = match &cli.config {
        Some(path) => match RelayConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                return ExitCode::from(1);
            }
        },
        None => match cli.port {
            Some(port) => RelayConfig::new(port),
            None => RelayConfig::default(),
        },
    };

    let registry = Arc::new(SessionRegistry::new());

    if let Err(e) = relay_core::run(config, registry).await {
        error!("relay exited: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
