mod config;
mod database;
mod models;
mod payload;
mod server;
mod store;
mod utils;

use log::{error, info};

use config::ServiceConfig;
use server::AppState;
use store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ServiceConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Open the store once; handlers receive it through router state
    let store = match Store::from_config(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize store: {}", e);
            return Err(e.into());
        }
    };
    let state = AppState::new(store, &config);

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        let _ = tx.send(());
    });

    // Run the server or wait for shutdown signal
    tokio::select! {
        result = server::serve(state, config.port) => {
            match result {
                Ok(_) => info!("Server stopped"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
