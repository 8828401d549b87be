use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal, sync::watch};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use env_telemetry_service::{
    api::{self, AppState},
    config::Config,
    db::{self, PgReadingStore, ReadingStore},
    generator::DiurnalGenerator,
    simulation::{LoopExit, SimulationLoop},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env; a missing file is fine, vars may be set externally
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;
    let generator = DiurnalGenerator::new(config.simulation.generator.clone())?;

    // Connect to DB and run migrations; an unreachable store aborts startup
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    let store: Arc<dyn ReadingStore> = Arc::new(PgReadingStore::new(pool));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Bind before the loop is spawned; on failure only the store needs closing
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let bound = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"));
    let listener = match bound {
        Ok(listener) => listener,
        Err(e) => {
            store.close().await;
            return Err(e);
        }
    };

    // Spawn simulation task
    let simulation = if config.simulation.enabled {
        let sim = SimulationLoop::new(
            store.clone(),
            generator,
            config.zone,
            config.simulation.device_id.clone(),
            config.simulation.interval,
        );
        Some(tokio::spawn(sim.run(shutdown_rx)))
    } else {
        info!("Simulation loop disabled");
        None
    };

    // Start HTTP server
    let state = AppState::new(
        store.clone(),
        config.ingest_schema,
        config.ingest_limits,
        config.zone,
        config.query_limit,
        config.query_limit_max,
    );
    info!(addr = %addr, schema = %config.ingest_schema, "HTTP server listening");

    let served = axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // In-flight requests have drained; stop the loop and wait for its
    // current tick before releasing the store.
    let _ = shutdown_tx.send(true);
    if let Some(handle) = simulation {
        match handle.await {
            Ok(LoopExit::Cancelled) => info!("Simulation loop stopped"),
            Ok(LoopExit::Halted(e)) => warn!(error = %e, "Simulation loop had halted earlier"),
            Err(e) => error!(error = %e, "Simulation task panicked"),
        }
    }
    store.close().await;

    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
