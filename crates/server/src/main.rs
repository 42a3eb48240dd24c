use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use songsmith_core::events::EventStore;
use songsmith_core::notify::{
    EndpointRegistry, NotificationLogStore, SqliteEndpointRegistry, SqliteNotificationLog,
    WebhookPushTransport,
};
use songsmith_core::{
    create_event_log, load_config, validate_config, GenerationProvider, OpenAiCompatibleProvider,
    OrderEvent, OrderStore, SqliteEventStore, SqliteOrderStore,
};
use songsmith_server::api::create_router;
use songsmith_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the event log channel
const EVENT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("SONGSMITH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!(
        "Generation provider: {} (model {})",
        config.generation.api_base, config.generation.model
    );

    // Hash of the effective config, recorded with ServiceStarted
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    let order_store: Arc<dyn OrderStore> = Arc::new(
        SqliteOrderStore::new(&config.database.path).context("Failed to create order store")?,
    );
    info!("Order store initialized");

    let event_store: Arc<dyn EventStore> = Arc::new(
        SqliteEventStore::new(&config.database.path).context("Failed to create event store")?,
    );

    let endpoints: Arc<dyn EndpointRegistry> = Arc::new(
        SqliteEndpointRegistry::new(&config.database.path)
            .context("Failed to create push endpoint registry")?,
    );

    let notification_log: Arc<dyn NotificationLogStore> = Arc::new(
        SqliteNotificationLog::new(&config.database.path)
            .context("Failed to create notification log")?,
    );

    let (event_handle, event_writer) = create_event_log(Arc::clone(&event_store), EVENT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(event_writer.run());

    event_handle
        .emit(OrderEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;
    info!("Emitted ServiceStarted event");

    let provider: Arc<dyn GenerationProvider> =
        Arc::new(OpenAiCompatibleProvider::new(&config.generation));
    let transport = Arc::new(WebhookPushTransport::new());

    let state = Arc::new(AppState::new(
        config.clone(),
        order_store,
        event_handle.clone(),
        event_store,
        endpoints,
        notification_log,
        provider,
        transport,
    ));

    if config.recovery.enabled {
        state.recovery().start();
        info!(
            "Recovery sweep started (every {}s, batch {})",
            config.recovery.interval_secs, config.recovery.batch_limit
        );
    } else {
        info!("Recovery sweep disabled in config");
    }

    let app = create_router(Arc::clone(&state));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    state.recovery().stop();

    event_handle
        .emit(OrderEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // Every component holds an EventHandle clone; the writer drains once all
    // of them are gone.
    drop(state);
    drop(event_handle);

    let _ = writer_handle.await;
    info!("Event writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}
