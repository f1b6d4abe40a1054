use std::io::BufRead;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

/// Forwards standard input to the relay through the broker adapter.
#[derive(Parser, Debug)]
#[command(name = "client", about = "Broker-adapter command-line driver")]
struct Cli {
    host: String,
    port: u16,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    chat_protocol::logging::init();

    let adapter = match broker_client::BrokerAdapter::with_default_hooks(
        cli.host.clone(),
        cli.port,
        None,
        "broker",
    ) {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("failed to connect to {}:{}: {}", cli.host, cli.port, e);
            return ExitCode::from(2);
        }
    };

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if !line.is_empty() {
            adapter.send_to_broker(&line);
        }
    }

    adapter.disconnect();
    ExitCode::SUCCESS
}
