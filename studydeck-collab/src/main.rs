//! Collab service - main entry point
//!
//! Hosts the collaborative term merge engine behind a small HTTP API:
//! attempt initialization, submission merge, and an SSE stream of
//! staleness events for dependent caches.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studydeck_collab::api::{self, AppContext};
use studydeck_collab::CollabEngine;
use studydeck_common::config;
use studydeck_common::db::init::{get_setting_i64, init_database};
use studydeck_common::events::EventBus;

/// Command-line arguments for studydeck-collab
#[derive(Parser, Debug)]
#[command(name = "studydeck-collab")]
#[command(about = "Collaborative term merge service for studydeck")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5730", env = "STUDYDECK_COLLAB_PORT")]
    port: u16,

    /// Data folder containing the service database
    #[arg(short, long)]
    data_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studydeck_collab=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting studydeck collab service on port {}", args.port);

    let data_folder =
        config::resolve_data_folder(args.data_folder.as_deref(), "STUDYDECK_DATA_FOLDER")
            .context("Failed to resolve data folder")?;
    info!("Data folder: {}", data_folder.display());

    let db = init_database(&config::database_path(&data_folder))
        .await
        .context("Failed to initialize database")?;

    let capacity = get_setting_i64(&db, "event_channel_capacity", 256).await? as usize;
    let events = EventBus::new(capacity);

    let engine = Arc::new(CollabEngine::new(db.clone(), events.clone()));

    let ctx = AppContext { engine, events };

    api::run(args.port, ctx).await.context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
