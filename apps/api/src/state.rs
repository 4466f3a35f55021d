use std::sync::Arc;

use crate::analytics::export::ExportArchive;
use crate::auth::rate_limit::RateLimiter;
use crate::auth::verifier::TokenVerifier;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::store::PlacementStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PlacementStore>,
    /// `None` when no signing secret is configured; only the development bypass can authenticate then.
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// ATS scoring is unavailable without an OpenRouter key.
    pub llm: Option<LlmClient>,
    pub archive: Option<ExportArchive>,
    pub config: Config,
}

/// In-memory state with the development auth bypass switched on.
#[cfg(test)]
pub fn test_state() -> AppState {
    use crate::auth::rate_limit::MemoryRateLimiter;
    use crate::store::MemoryStore;

    AppState {
        store: Arc::new(MemoryStore::new()),
        verifier: None,
        rate_limiter: Arc::new(MemoryRateLimiter::new(
            10_000,
            std::time::Duration::from_secs(60),
            1_000,
        )),
        llm: None,
        archive: None,
        config: Config::default(),
    }
}
