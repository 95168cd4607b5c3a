//! UI server - JSON API and event stream over the resolution session.

mod config;
mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "resolver-ui")]
#[command(about = "Web API for the mortality-charts state resolution session")]
struct Args {
    /// Path to the server config TOML (missing file means defaults)
    #[arg(long, default_value = "resolver-ui.toml")]
    config: PathBuf,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,

    /// Initial URL query string to resolve at startup
    #[arg(long, default_value = "")]
    query: String,

    /// Persist the effective config (including --bind/--port
    /// overrides) back to the config file before serving
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("resolver_ui=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut cfg = config::load_config(&args.config)?;
    if let Some(bind) = args.bind {
        cfg.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.port = port;
    }
    cfg.validate()?;

    if args.save_config {
        config::write_config(&args.config, &cfg)?;
        info!(path = %args.config.display(), "config saved");
    }

    let state = AppState::new(cfg.clone(), &args.query)?;
    info!(query = %args.query, "session started");

    // Kick off the initial data load before serving requests.
    state.spawn_refresh(resolver::session::INITIAL_REFRESH_KEY.to_string());

    let api_router = routes::api_router();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", api_router)
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", cfg.bind, cfg.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
