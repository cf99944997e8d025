mod app;
mod config;
mod error;
mod handlers;
mod products;
mod server;
mod state;

use crate::config::{Args, Config};
use crate::error::AppError;
use crate::products::Teardown;
use crate::server::Server;
use crate::state::AppState;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

/// Exit status for --config-only: informational, no service was started.
const CONFIG_ONLY_EXIT: u8 = 2;

enum Outcome {
    Served,
    ConfigOnly,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs controllable via env: RUST_LOG=info|debug|trace

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    match run(Args::parse()).await {
        Ok(Outcome::Served) => ExitCode::SUCCESS,
        Ok(Outcome::ConfigOnly) => ExitCode::from(CONFIG_ONLY_EXIT),
        Err(err) => {
            tracing::error!(error = %err, "exiting");
            ExitCode::FAILURE
        }
    }
}

/// The whole lifecycle: configure, initialize, serve, drain, teardown. Every
/// failure comes back as a typed error; `main` alone decides how the process
/// exits.
async fn run(args: Args) -> Result<Outcome, AppError> {
    let cfg = Config::from_env().map_err(AppError::Config)?;

    if args.config_only {
        println!("{}", serde_json::to_string(&cfg)?);
        return Ok(Outcome::ConfigOnly);
    }

    cfg.validate().map_err(AppError::Validate)?;
    tracing::info!("configured");

    let (svr, teardown) = initialize(&cfg).await?;
    tracing::info!("initialized");

    // Teardown runs however the serve loop ended.
    let result = server::run(svr).await;
    teardown.close().await;
    result?;

    Ok(Outcome::Served)
}

/// Opens the database pool and assembles the server descriptor bound to it.
async fn initialize(cfg: &Config) -> Result<(Server, Teardown), AppError> {
    let pool = products::connect(&cfg.db)
        .await
        .map_err(AppError::ConnectDb)?;

    let state = AppState::new(Arc::new(pool.clone()));
    let svr = Server {
        addr: cfg.http.listen_addr(),
        router: app::build_router(state),
    };

    Ok((svr, Teardown::new(pool)))
}
