//! HTTP front end for the admission gateway.
//!
//! The binary in `main.rs` loads configuration, builds the store, keyword auditor and
//! rule set, and serves the router from [`create_app`].

pub mod middleware;
pub mod router;

use admit_core::{
    audit::ContentAuditor,
    config::AppConfig,
    pipeline::AdmissionPipeline,
    quota::{RateLimitRuleSet, RuleSetError},
    store::KeyValueStore,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use router::StatusPolicy;
use std::{path::Path, sync::Arc, time::Duration};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer};
use tracing::error;

/// Maximum accepted audit request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AdmissionPipeline>,
    pub store: Arc<dyn KeyValueStore>,
    pub policy: StatusPolicy,
    pub request_timeout: Duration,
}

impl AppState {
    /// Builds handler state from already-loaded components.
    ///
    /// # Errors
    ///
    /// Returns an error string if the policy section holds unsupported status codes.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn KeyValueStore>,
        auditor: ContentAuditor,
        rules: RateLimitRuleSet,
    ) -> Result<Self, String> {
        let policy = StatusPolicy::try_from(&config.policy)?;
        let pipeline =
            Arc::new(AdmissionPipeline::new(store.clone(), Arc::new(auditor), Arc::new(rules)));

        Ok(Self { pipeline, store, policy, request_timeout: config.request_timeout() })
    }
}

/// Loads the keyword list. A missing or unreadable list disables content audit rather
/// than failing startup.
#[must_use]
pub fn load_auditor(path: impl AsRef<Path>) -> ContentAuditor {
    let path = path.as_ref();
    match ContentAuditor::from_file(path) {
        Ok(auditor) => auditor,
        Err(e) => {
            error!(path = %path.display(), error = %e, "content audit disabled");
            ContentAuditor::disabled()
        }
    }
}

/// Loads and validates the rate limit rules.
///
/// # Errors
///
/// Returns [`RuleSetError`] if the document cannot be read or any rule is invalid.
pub fn load_rules(path: impl AsRef<Path>) -> Result<RateLimitRuleSet, RuleSetError> {
    RateLimitRuleSet::from_file(path)
}

/// Builds the router: public readiness and health routes plus the audit route behind
/// the cookie, concurrency, body-size and compression layers.
pub fn create_app(state: AppState, max_concurrent_requests: usize) -> Router {
    let (set_request_id, propagate_request_id) = middleware::create_request_id_layers();
    let (set_request_id_public, propagate_request_id_public) =
        middleware::create_request_id_layers();

    let public = Router::new()
        .route("/", get(router::handle_root))
        .route("/health", get(router::handle_health))
        .with_state(state.clone())
        .layer(propagate_request_id_public)
        .layer(set_request_id_public);

    let audit = Router::new()
        .route("/audit", post(router::handle_audit).get(router::handle_root))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::session_cookie_middleware))
        .layer(ConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        // Layers run in reverse order, so propagate runs after set.
        .layer(propagate_request_id)
        .layer(set_request_id);

    public.merge(audit)
}
