//! Server bootstrap.
//!
//! Wires config → store → dispatcher → effects worker → HTTP router, and
//! serves with graceful shutdown. Station configuration is read from
//! `stations.json` in the working directory when present.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shared::Station;
use tokio_util::sync::CancellationToken;

use crate::api;
use crate::core::config::Config;
use crate::core::state::AppState;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::dispatch::{EventDispatcher, StationRegistry};
use crate::effects::{Catalog, EffectHooks, EffectsWorker, StaticCatalog};
use crate::orders::{OrderService, OrderStore};

/// Assemble application state from config and collaborator hooks.
pub fn build_state(
    config: Arc<Config>,
    catalog: Arc<dyn Catalog>,
    hooks: EffectHooks,
    tasks: &mut BackgroundTasks,
) -> anyhow::Result<AppState> {
    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("creating work dir {}", config.work_dir))?;

    let store = OrderStore::open(
        config.db_path(),
        config.store_pool_size,
        Duration::from_millis(config.store_wait_ms),
    )
    .context("opening order store")?;

    let stations = load_stations(&config.stations_path());
    tracing::info!(count = stations.len(), "Loaded station configuration");
    let registry = Arc::new(StationRegistry::new(stations));
    let dispatcher = EventDispatcher::with_capacity(registry, config.dispatch_channel_capacity);

    let (effects, worker) = EffectsWorker::new(
        config.effects_queue_capacity,
        hooks,
        tasks.shutdown_token(),
    );
    tasks.spawn("effects_worker", TaskKind::Worker, worker.run());

    let orders = OrderService::new(
        store,
        dispatcher.clone(),
        effects,
        catalog,
        config.tax_rate,
    );

    Ok(AppState::new(config, orders, dispatcher))
}

/// Run the HTTP server until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let mut tasks = BackgroundTasks::new();

    // Until a catalog collaborator is attached, the menu is empty; item
    // adds fail with UnknownMenuItem rather than guessing at prices
    let state = build_state(
        config.clone(),
        Arc::new(StaticCatalog::default()),
        EffectHooks::null(),
        &mut tasks,
    )?;

    let router = api::router(state);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, "Venue server listening");

    let shutdown = shutdown_signal(tasks.shutdown_token());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving")?;

    tasks.shutdown().await;
    Ok(())
}

fn load_stations(path: &std::path::Path) -> Vec<Station> {
    match std::fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(stations) => stations,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Invalid stations.json, starting with none");
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    }
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received ctrl-c, shutting down");
        }
        _ = token.cancelled() => {}
    }
}
