use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpServer};
use dating_retrieval::config::{Settings, StoreBackend};
use dating_retrieval::core::RetrievalService;
use dating_retrieval::models::ScoringWeights;
use dating_retrieval::routes::{self, AppState};
use dating_retrieval::services::{
    AppwriteStore, CacheManager, IdentityVerifier, InMemoryStore, JwtVerifier, UserStore,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str, format: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }
}

fn io_error(message: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, message)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| io_error(format!("Configuration error: {}", e)))?;

    init_logging(&settings.logging.level, &settings.logging.format);

    info!("Starting dating retrieval service...");

    // Document store
    let store: Arc<dyn UserStore> = match settings.store.backend {
        StoreBackend::Appwrite => {
            let appwrite = AppwriteStore::from_settings(&settings.store).map_err(|e| {
                error!("Failed to initialize Appwrite store: {}", e);
                io_error(e.to_string())
            })?;
            info!("Appwrite store initialized (membership limit: {})", settings.store.membership_limit);
            Arc::new(appwrite)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is not persisted");
            Arc::new(InMemoryStore::new(settings.store.membership_limit))
        }
    };

    // Identity verification
    let verifier: Arc<dyn IdentityVerifier> = Arc::new(
        JwtVerifier::from_settings(&settings.auth).map_err(|e| {
            error!("Failed to initialize token verifier: {}", e);
            io_error(e.to_string())
        })?,
    );

    // Viewer profile cache; Redis is optional, the app runs on L1 alone without it
    let cache = match &settings.cache.redis_url {
        Some(url) => match CacheManager::new(url, settings.cache.l1_cache_size, settings.cache.ttl_secs).await {
            Ok(c) => {
                info!("Cache manager initialized (L1: {} entries, TTL: {}s, Redis L2)", settings.cache.l1_cache_size, settings.cache.ttl_secs);
                c
            }
            Err(e) => {
                error!("Failed to connect to Redis ({}), using in-process cache only", e);
                CacheManager::local(settings.cache.l1_cache_size, settings.cache.ttl_secs)
            }
        },
        None => CacheManager::local(settings.cache.l1_cache_size, settings.cache.ttl_secs),
    };

    let mut retrieval_settings = settings.retrieval.clone();
    retrieval_settings.membership_limit = Some(settings.effective_membership_limit());

    let retrieval = RetrievalService::new(store, retrieval_settings)
        .with_cache(Arc::new(cache))
        .with_weights(ScoringWeights::from(&settings.scoring.weights));

    info!("Retrieval service initialized (membership limit: {})", settings.effective_membership_limit());

    let app_state = AppState { retrieval, verifier };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION]);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(routes::json_config())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
