//! ProdKit entry point: the HTTP server and the background worker.

use clap::Parser;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        tracing::error!("Fatal error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
