use anyhow::Context;
use clap::Parser;
use rass_core::build_backend;
use rass_server::{AppState, ServerArgs, run_server};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    rass_telemetry::init_logging(args.log_format)?;

    let config = args.rass_config();
    let backend = build_backend(&config).await.context("failed to start backend")?;
    info!(backend = %backend.kind(), seeded = config.seed_sample_data, "starting rass-server");

    let mut state = AppState::new(backend);
    if let Some(key) = &args.api_key {
        state = state.with_api_key(key.clone());
    } else {
        info!("no API key configured, requests are unauthenticated");
    }

    run_server(args.server_config(), state).await
}
