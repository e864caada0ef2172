#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(warnings)]

//! Ops entry point: checks provider health for the current
//! configuration and reports local storage usage.

use menu_upload_service::infrastructure::config::UploadServiceConfig;
use menu_upload_service::infrastructure::storage::factory;
use menu_upload_service::infrastructure::storage::LocalProvider;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    init_tracing();

    // Load configuration
    let config = UploadServiceConfig::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Menu upload service diagnostics");
    info!(
        default_provider = %config.default_provider,
        fallback_provider = ?config.fallback_provider,
        "configured providers"
    );

    let available = factory::available_providers(&config).await;
    if available.is_empty() {
        warn!("no storage provider is constructible with the current configuration");
    }

    for provider in available {
        let status = factory::health_check(provider, &config).await;
        if status.healthy {
            info!(provider = %provider, "provider healthy");
        } else {
            warn!(
                provider = %provider,
                error = status.error.as_deref().unwrap_or("unknown"),
                "provider unhealthy"
            );
        }
    }

    if let Some(local) = &config.providers.local {
        let provider = LocalProvider::new(local.clone()).await?;
        let usage = provider.storage_usage().await;
        info!(
            file_count = usage.file_count,
            total_bytes = usage.total_bytes,
            scan_errors = usage.errors.len(),
            "local storage usage"
        );
    }

    Ok(())
}

/// Initialize structured logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "menu_upload_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
