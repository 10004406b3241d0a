//! Arbor terminal client: open a document, edit it, and watch it refresh
//! when someone else changes it.
//!
//! Logging goes through `env_logger`; set `RUST_LOG=arbor_sync=debug` to
//! trace channel traffic.

mod args;
mod input;
mod sink;
mod state;

use clap::Parser;

use args::Args;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = args.config();
    log::info!("Document service {}, notifications {}", config.api_base, config.ws_url);

    let app = AppState::init(&config)?;
    app.run(args.open).await?;

    Ok(())
}
