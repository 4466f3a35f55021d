mod analytics;
mod auth;
mod config;
mod db;
mod directory;
mod eligibility;
mod enrollment;
mod errors;
mod llm_client;
mod models;
mod portal;
mod resume;
mod routes;
mod state;
mod store;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analytics::export::ExportArchive;
use crate::auth::rate_limit::{MemoryRateLimiter, RateLimiter, RedisRateLimiter};
use crate::auth::verifier::{JwtVerifier, TokenVerifier};
use crate::config::{Config, StorageBackend};
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::LlmClient;
use crate::routes::{build_router, cors_layer};
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, PlacementStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Placement API v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.app_env
    );

    // Document store
    let store: Arc<dyn PlacementStore> = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Token verification
    let verifier: Option<Arc<dyn TokenVerifier>> = match &config.auth_jwt_secret {
        Some(secret) => Some(Arc::new(JwtVerifier::new(secret))),
        None => {
            warn!("AUTH_JWT_SECRET not set; bearer tokens cannot be verified");
            None
        }
    };
    if config.auth_bypass_enabled() {
        warn!("DEV_AUTH_BYPASS is on: every request runs as the development user");
    }

    // Rate limiting
    let rate_limiter: Arc<dyn RateLimiter> = match &config.redis_url {
        Some(url) => {
            let limiter = RedisRateLimiter::connect(
                url,
                config.rate_limit_max_requests,
                config.rate_limit_window_secs,
            )
            .await?;
            info!("Redis rate limiter initialized");
            Arc::new(limiter)
        }
        None => Arc::new(MemoryRateLimiter::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_secs),
            config.rate_limit_max_keys,
        )),
    };

    // LLM client for ATS scoring
    let llm = match &config.openrouter_api_key {
        Some(key) => {
            let client = LlmClient::new(
                key.clone(),
                config.llm_model.clone(),
                config.frontend_url.clone(),
            )?;
            info!("LLM client initialized (model: {})", client.model());
            Some(client)
        }
        None => {
            warn!("OPENROUTER_API_KEY not set; ATS scoring is disabled");
            None
        }
    };

    // Export archive (S3 / MinIO)
    let archive = match &config.s3_bucket {
        Some(bucket) => {
            let s3 = build_s3_client(&config).await;
            info!("S3 client initialized (bucket: {bucket})");
            Some(ExportArchive::new(s3, bucket.clone()))
        }
        None => None,
    };

    // Build app state
    let state = AppState {
        store,
        verifier,
        rate_limiter,
        llm,
        archive,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Constructs an S3 client for MinIO (when `S3_ENDPOINT` is set) or AWS.
/// Static credentials are used when both keys are configured; otherwise the
/// default provider chain applies.
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"));

    if let (Some(key_id), Some(secret)) = (&config.aws_access_key_id, &config.aws_secret_access_key)
    {
        loader = loader.credentials_provider(Credentials::new(
            key_id,
            secret,
            None,
            None,
            "placement-static",
        ));
    }
    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    aws_sdk_s3::Client::new(&loader.load().await)
}
