//! # SecureBiz
//!
//! Session and authentication manager for a small-business security-posture
//! service, with organization-scoped records behind it.
//!
//! ## Features
//!
//! - **Sessions**: HS256 tokens in an HTTP-only, SameSite=Strict cookie,
//!   revocable on logout
//! - **Passwords**: bcrypt with a configurable cost and a length policy
//! - **Tenancy**: privileged reads and writes are scoped by the organization
//!   id of the verified session
//! - **Records**: assets, vulnerabilities, threats, scans, compliance status
//!   and training progress
//! - **HTTP hardening**: security headers, body limits, timeouts, a CORS
//!   allowlist and audit logging
//!
//! ## Quick Start
//!
//! ```ignore
//! use securebiz::{api, AppConfig};
//! use securebiz::observability::{self, ObservabilityConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     observability::init(ObservabilityConfig::from_env())?;
//!
//!     let config = AppConfig::from_env()?;
//!     let addr = config.bind_addr;
//!     let app = api::app(api::AppState::new(config)?);
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audit;
pub mod auth;
mod config;
pub mod error;
mod jwt_secret;
mod layers;
pub mod models;
pub mod observability;
mod parse;
pub mod password;
pub mod session;
pub mod store;
pub mod validation;

// Re-exports
pub use api::{app, router, AppState};
pub use auth::{AuthService, Session};
pub use config::{
    map_lookup, AppConfig, AppConfigBuilder, ConfigError, Environment, SecurityConfig,
    SecurityConfigBuilder, DEFAULT_BCRYPT_COST, DEFAULT_SESSION_LIFETIME,
};
pub use error::{ActionResult, AppError, ErrorKind};
pub use jwt_secret::{shannon_entropy, SecretError, SecretPolicy, SigningSecret};
pub use layers::SecureRouter;
pub use parse::{parse_bool, parse_duration, parse_size};
pub use session::{SessionClaims, TokenIssuer, SESSION_COOKIE};
pub use store::{CredentialStore, MemoryStore, StoreError};
