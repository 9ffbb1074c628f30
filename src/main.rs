use clap::Parser;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use htsgetd::{
    Config,
    handlers::{AppState, create_router},
    storage::LocalStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let whitelist = config.bucket_whitelist();
    if let Some(buckets) = &whitelist {
        tracing::info!("Restricting reads to {} bucket(s)", buckets.len());
    }
    if config.secure {
        tracing::info!("Secure mode: requiring and forwarding bearer tokens");
    }

    let state = AppState {
        store: Arc::new(LocalStore::new(config.data_dir.clone())),
        base_url: config.effective_base_url(),
        block_size: config.block_size,
        whitelist,
        secure: config.secure,
    };

    let app = create_router(state).layer(TraceLayer::new_for_http());
    let app = if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting htsgetd on {}", addr);
    tracing::info!("Data directory: {:?}", config.data_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
