use std::sync::Arc;

use tokio::net::TcpListener;

use huddle_server::chat::storage::SqliteChatStore;
use huddle_server::config::{generate_config_template, Config};
use huddle_server::events::hub::EventHub;
use huddle_server::events::snapshot::SqliteSnapshotStore;
use huddle_server::ws::registry::ConnectionRegistry;
use huddle_server::{auth, db, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "huddle_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "huddle_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Huddle server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Load or generate JWT signing key (256-bit random, stored in data_dir)
    let jwt_secret = auth::token::load_or_generate_jwt_secret(&config.data_dir)?;

    // Build application state. Call signaling and chat keep separate
    // connection registries so frames can never cross features; notification
    // and project SSE subscribers likewise live in separate hubs.
    let app_state = state::AppState {
        db: db.clone(),
        jwt_secret,
        call_connections: ConnectionRegistry::new(),
        chat_connections: ConnectionRegistry::new(),
        notification_events: EventHub::new(),
        project_events: EventHub::new(),
        chat_store: Arc::new(SqliteChatStore::new(db.clone())),
        snapshots: Arc::new(SqliteSnapshotStore::new(db)),
    };

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
