use axum::{routing::get, serve, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use project_hub::api;
use project_hub_core::events::EventBus;
use project_hub_core::seed;
use project_hub_core::tree::ProjectStore;

#[derive(Parser)]
#[command(name = "project-hub", about = "Project document catalog service")]
struct Cli {
    /// Address to listen on. Falls back to PROJECT_HUB_ADDR, then 127.0.0.1:3000.
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Directory holding the JSON collections. Falls back to
    /// PROJECT_HUB_DATA_DIR, then `data`.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seed demo data if the store is empty.
    #[arg(long)]
    seed: bool,

    /// Wipe the store and reseed before serving.
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let addr: SocketAddr = match cli.addr {
        Some(addr) => addr,
        None => std::env::var("PROJECT_HUB_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        PathBuf::from(std::env::var("PROJECT_HUB_DATA_DIR").unwrap_or_else(|_| "data".to_string()))
    });

    let mut store = ProjectStore::open(&data_dir)?;
    if cli.reset {
        seed::reset(&mut store)?;
        info!("store wiped and reseeded");
    } else if cli.seed {
        if seed::initialize(&mut store)? {
            info!("seeded demo data");
        } else {
            info!("store already populated, seeding skipped");
        }
    }

    let store = Arc::new(RwLock::new(store));
    let events = EventBus::new();
    let app = Router::new()
        .merge(api::router(store, events))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, data_dir = %data_dir.display(), "listening");
    serve(listener, app.into_make_service()).await?;
    Ok(())
}
