use std::sync::Arc;

use clap::Parser;
use ridehail_backend::{
    AppState,
    config::Config,
    coordinator::RideRequestCoordinator,
    create_router,
    geocoding::{CachingSearchProvider, NominatimSearchProvider},
    providers::{LocationSearchProvider, RideScheduler},
    runtime::CoordinatorHandle,
    scheduler::{HttpRideScheduler, InMemoryRideScheduler},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridehail_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();

    let geocoder = NominatimSearchProvider::new(
        config.geocoder_url.as_str(),
        config.search_limit,
        config.device_position(),
    )?;
    let search: Arc<dyn LocationSearchProvider> = match config.search_cache_capacity() {
        Some(capacity) => Arc::new(CachingSearchProvider::new(geocoder, capacity)),
        None => Arc::new(geocoder),
    };
    tracing::info!("geocoding via {}", config.geocoder_url);

    let scheduler: Arc<dyn RideScheduler> = match &config.scheduler_url {
        Some(url) => {
            tracing::info!("scheduling rides via {url}");
            Arc::new(HttpRideScheduler::new(url.as_str())?)
        }
        None => {
            tracing::info!(
                "no scheduler configured, confirming rides in memory ({} drivers)",
                config.driver_capacity
            );
            Arc::new(InMemoryRideScheduler::new(config.driver_capacity))
        }
    };

    let coordinator = RideRequestCoordinator::new(config.initial_viewport()?);
    let handle = CoordinatorHandle::spawn(
        coordinator,
        search,
        scheduler,
        config.coordinator_config(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(AppState {
        coordinator: handle,
    })
    .layer(cors)
    .layer(TraceLayer::new_for_http());

    tracing::info!("starting ride coordinator on http://{}", config.listen);
    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
