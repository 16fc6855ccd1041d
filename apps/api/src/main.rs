use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use registration_cell::services::NotificationWorker;
use registration_cell::RegistrationServices;
use shared_config::AppConfig;
use statistics_cell::{SnapshotStore, StatisticsAggregator, StatisticsRefresher, StatisticsState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic registration API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    // Registration services and the notification worker draining their events
    let (services, events) = RegistrationServices::from_config(config.clone()).await?;
    let _notifications = NotificationWorker::new(events, RegistrationServices::default_sinks(&config)).spawn();
    let services = Arc::new(services);

    // Statistics read side over the same ledger
    let aggregator = Arc::new(StatisticsAggregator::new(services.ledger.clone()));
    let snapshots = Arc::new(SnapshotStore::new());
    let _refresher = StatisticsRefresher::new(
        aggregator.clone(),
        services.directory.clone(),
        snapshots.clone(),
        Duration::from_secs(config.statistics_refresh_seconds),
    )
    .spawn();
    let statistics = Arc::new(StatisticsState {
        config: config.clone(),
        aggregator,
        snapshots,
    });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(services, statistics)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
