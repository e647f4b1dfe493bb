//! HTTP API
//!
//! JSON handlers for accounts, assets, compliance, training and security
//! records. Every privileged handler takes [`Session`](crate::auth::Session)
//! first and scopes its work by the session's organization id.

mod account;
mod assets;
mod compliance;
mod security;
mod training;

use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::Serialize;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::error::ActionResult;
use crate::layers::SecureRouter;
use crate::password::PasswordError;
use crate::store::MemoryStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<MemoryStore>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Fresh store with reference data and an auth service over it.
    pub fn new(config: AppConfig) -> Result<Self, PasswordError> {
        Self::with_store(config, MemoryStore::with_reference_data().shared())
    }

    pub fn with_store(config: AppConfig, store: Arc<MemoryStore>) -> Result<Self, PasswordError> {
        let auth = AuthService::new(&config, store.clone())?.shared();
        Ok(Self {
            config: Arc::new(config),
            store,
            auth,
        })
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for Arc<MemoryStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

/// Routes without the hardening layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(account::register))
        .route("/auth/login", post(account::login))
        .route("/auth/logout", post(account::logout))
        .route("/auth/session", get(account::current_session))
        .route("/assets", get(assets::list).post(assets::add))
        .route("/assets/{id}", delete(assets::remove))
        .route("/compliance/frameworks", get(compliance::frameworks))
        .route("/compliance/status", get(compliance::status).put(compliance::update_status))
        .route("/compliance/report", post(compliance::report))
        .route("/training/modules", get(training::modules))
        .route("/training/progress", get(training::progress).put(training::update_progress))
        .route("/training/start", post(training::start))
        .route("/training/assign", post(training::assign))
        .route("/scans", get(security::list_scans).post(security::run_scan))
        .route("/threats", get(security::list_threats).post(security::report_threat))
        .route("/threats/{id}/status", put(security::update_threat_status))
        .route(
            "/vulnerabilities",
            get(security::list_vulnerabilities).post(security::record_vulnerability),
        )
        .route("/dashboard", get(security::dashboard))
        .with_state(state)
}

/// The full application: routes plus the configured security layers.
pub fn app(state: AppState) -> Router {
    let security = state.config.security.clone();
    router(state).with_security(security)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    version: &'static str,
    environment: String,
}

async fn health(State(config): State<Arc<AppConfig>>) -> ActionResult<Health> {
    ActionResult::ok(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: config.environment.to_string(),
    })
}
