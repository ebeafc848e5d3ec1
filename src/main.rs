use anyhow::{Context, Result};
use formdrop::api::{create_router, AppState};
use formdrop::config;
use formdrop::credentials::{CredentialStore, SqliteOptionStore};
use formdrop::dropbox::DropboxClientFactory;
use formdrop::notify;
use formdrop::oauth::AuthFlow;
use formdrop::upload::UploadDispatcher;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formdrop=info".into()),
        )
        .init();

    info!("formdrop starting...");

    let config = config::load_from_env().context("Failed to load configuration")?;

    let encryption_key = std::env::var("FORMDROP_ENCRYPTION_KEY")
        .context("FORMDROP_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;

    info!(
        bind_addr = %config.server.bind_addr,
        db_path = %config.storage.db_path,
        dropbox_root = %config.dropbox.root,
        admin_token = config.server.admin_token.is_some(),
        "Configuration loaded"
    );

    let options = SqliteOptionStore::new(&config.storage.db_path, &encryption_key)
        .context("Failed to initialize option store")?;
    let store = CredentialStore::new(Arc::new(options));
    info!("Option store initialized");

    let clients = DropboxClientFactory::new(config.dropbox.clone())
        .context("Failed to build Dropbox client")?;
    let http_client = clients.http_client().clone();

    let notifier = notify::from_config(&config.notifications, http_client.clone());
    let auth_flow = AuthFlow::new(store.clone(), http_client, config.dropbox.clone());
    let dispatcher = UploadDispatcher::new(
        store.clone(),
        Arc::new(clients),
        notifier,
        config.uploads.clone(),
    )
    .with_debug(config.debug);

    let state = AppState {
        store,
        auth_flow,
        dispatcher,
        admin_token: config.server.admin_token.clone(),
        callback_url: config.server.callback_url(),
        settings_url: config.server.settings_url.clone(),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .context("Failed to bind API address")?;
    info!(bind_addr = %config.server.bind_addr, "API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("formdrop stopped");

    Ok(())
}
