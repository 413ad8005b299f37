use giving_checkout::api::{self, ApiState};
use giving_checkout::config::AppConfig;
use giving_checkout::health::HealthChecker;
use giving_checkout::logging::init_tracing;
use giving_checkout::middleware::logging::{request_logging_middleware, UuidRequestId};
use giving_checkout::payments::checkout::{CheckoutLauncher, RelayCheckout};
use giving_checkout::payments::gateway::{CollectionGateway, HttpCollectionGateway};
use giving_checkout::services::catalog::CatalogService;
use giving_checkout::services::session::{
    MemoryAttemptStore, SessionConfig, SessionRegistry, StoreProvider,
};
use giving_checkout::workers::session_sweeper::{SessionSweeper, SessionSweeperConfig};
use http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
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
                warn!("failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[cfg(feature = "cache")]
async fn attempt_stores(
    config: &AppConfig,
    health: HealthChecker,
) -> anyhow::Result<(StoreProvider, HealthChecker)> {
    use giving_checkout::cache::{attempt_store::RedisAttemptStore, init_cache_pool, CacheConfig};

    let Some(redis_url) = config.cache.redis_url.clone() else {
        info!("REDIS_URL not set, keeping attempt state in memory");
        return Ok((StoreProvider::Memory(MemoryAttemptStore::new()), health));
    };

    let pool = init_cache_pool(CacheConfig {
        redis_url,
        max_connections: config.cache.max_connections,
        ..CacheConfig::default()
    })
    .await?;

    Ok((
        StoreProvider::Redis(RedisAttemptStore::new(pool.clone())),
        health.with_cache(pool),
    ))
}

#[cfg(not(feature = "cache"))]
async fn attempt_stores(
    _config: &AppConfig,
    health: HealthChecker,
) -> anyhow::Result<(StoreProvider, HealthChecker)> {
    Ok((StoreProvider::Memory(MemoryAttemptStore::new()), health))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        backend = %config.backend.base_url,
        checkout_mode = config.checkout.connection_mode.as_str(),
        hosted_checkout = config.checkout.merchant_key.is_some(),
        "Starting donation checkout service"
    );
    if config.checkout.merchant_key.is_none() {
        warn!("PAYAZA_PUBLIC_KEY not set, hosted checkout submissions will be rejected");
    }

    let gateway: Arc<dyn CollectionGateway> = Arc::new(HttpCollectionGateway::new(&config.backend)?);
    let relay = Arc::new(RelayCheckout::new());
    let launcher: Arc<dyn CheckoutLauncher> = relay.clone();

    let (stores, health) = attempt_stores(&config, HealthChecker::new(Arc::clone(&gateway))).await?;

    let registry = Arc::new(SessionRegistry::new(
        Arc::clone(&gateway),
        launcher,
        stores,
        SessionConfig::new(&config.session, &config.checkout),
    ));

    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let sweeper = SessionSweeper::new(
        Arc::clone(&registry),
        SessionSweeperConfig::from_settings(&config.session),
    );
    let sweeper_handle = tokio::spawn(sweeper.run(worker_shutdown_rx));

    let state = ApiState {
        registry,
        relay,
        catalog: CatalogService::new(Arc::clone(&gateway)),
        health,
    };

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors_layer(&config.server.cors_allowed_origins)),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Err(e) = tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await {
        error!(error = %e, "Timed out waiting for session sweeper shutdown");
    }

    info!("Server shut down");
    Ok(())
}
