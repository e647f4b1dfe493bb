//! Application configuration
//!
//! Everything the process needs is read once at startup. [`AppConfig::from_env`]
//! fails fast: a missing `JWT_SECRET` or an unparseable value is an error, never
//! a silent default.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::jwt_secret::{SecretError, SecretPolicy, SigningSecret};
use crate::password::PasswordPolicy;
use crate::parse::{parse_bool, parse_duration, parse_size};

/// Default session lifetime (token `exp` and cookie `Max-Age`).
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Default bcrypt work factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Configuration errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set")]
    MissingSecret,

    #[error("JWT_SECRET rejected: {0}")]
    WeakSecret(#[from] SecretError),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("BCRYPT_COST must be between 4 and 31, got {0}")]
    BcryptCost(u32),
}

// ============================================================================
// Environment
// ============================================================================

/// Deployment environment.
///
/// Production turns on the `Secure` cookie attribute and the strict secret policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    /// Parse loosely; unknown names are `None`.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "test" | "testing" => Some(Self::Test),
            "development" | "dev" | "local" => Some(Self::Development),
            _ => None,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Test => write!(f, "test"),
            Self::Production => write!(f, "production"),
        }
    }
}

// ============================================================================
// HTTP layer settings
// ============================================================================

/// Settings for the HTTP hardening layers applied by
/// [`SecureRouter`](crate::SecureRouter).
///
/// ```ignore
/// let security = SecurityConfig::builder()
///     .max_request_size(64 * 1024)
///     .cors_origins(vec!["https://app.example.com"])
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes
    pub max_request_size: usize,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// CORS allowed origins
    /// Empty = same-origin only
    /// ["*"] = any origin (development only)
    pub cors_origins: Vec<String>,

    /// Enable security response headers
    pub security_headers_enabled: bool,

    /// Enable tower-http request tracing
    pub tracing_enabled: bool,

    /// Enable the audit middleware
    pub audit_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024,
            request_timeout: Duration::from_secs(30),
            cors_origins: Vec::new(),
            security_headers_enabled: true,
            tracing_enabled: true,
            audit_enabled: true,
        }
    }
}

impl SecurityConfig {
    pub fn builder() -> SecurityConfigBuilder {
        SecurityConfigBuilder::default()
    }

    /// Check if CORS is in permissive mode (allows any origin).
    pub fn cors_is_permissive(&self) -> bool {
        self.cors_origins.len() == 1 && self.cors_origins[0] == "*"
    }

    /// Check if CORS is in restrictive mode (same-origin only).
    pub fn cors_is_restrictive(&self) -> bool {
        self.cors_origins.is_empty()
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_request_size = match lookup("MAX_REQUEST_SIZE") {
            Some(v) => parse_size(&v).ok_or(ConfigError::Invalid {
                key: "MAX_REQUEST_SIZE",
                value: v,
            })?,
            None => defaults.max_request_size,
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT") {
            Some(v) => parse_duration(&v).ok_or(ConfigError::Invalid {
                key: "REQUEST_TIMEOUT",
                value: v,
            })?,
            None => defaults.request_timeout,
        };

        let cors_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            max_request_size,
            request_timeout,
            cors_origins,
            security_headers_enabled: flag(lookup, "SECURITY_HEADERS_ENABLED", true)?,
            tracing_enabled: flag(lookup, "TRACING_ENABLED", true)?,
            audit_enabled: flag(lookup, "AUDIT_ENABLED", true)?,
        })
    }
}

/// Builder for SecurityConfig
#[derive(Debug, Clone, Default)]
pub struct SecurityConfigBuilder {
    config: SecurityConfig,
}

impl SecurityConfigBuilder {
    pub fn max_request_size(mut self, size: usize) -> Self {
        self.config.max_request_size = size;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn cors_origins(mut self, origins: Vec<&str>) -> Self {
        self.config.cors_origins = origins.into_iter().map(String::from).collect();
        self
    }

    pub fn disable_security_headers(mut self) -> Self {
        self.config.security_headers_enabled = false;
        self
    }

    pub fn disable_tracing(mut self) -> Self {
        self.config.tracing_enabled = false;
        self
    }

    pub fn disable_audit(mut self) -> Self {
        self.config.audit_enabled = false;
        self
    }

    pub fn build(self) -> SecurityConfig {
        self.config
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// Process-wide configuration. Immutable after startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    /// HS256 key for session tokens
    pub jwt_secret: SigningSecret,
    /// Token lifetime and cookie Max-Age
    pub session_lifetime: Duration,
    pub bcrypt_cost: u32,
    /// Rules for passwords chosen at registration
    pub password_policy: PasswordPolicy,
    pub bind_addr: SocketAddr,
    pub security: SecurityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `APP_ENV` / `RUST_ENV`: "development", "test", "production" (default: development)
    /// - `JWT_SECRET`: required, validated against the environment's policy
    /// - `SESSION_LIFETIME`: e.g. "24h" (default: 24h)
    /// - `BCRYPT_COST`: 4-31 (default: 10)
    /// - `PASSWORD_POLICY`: "default" or "strict" (default: default)
    /// - `BIND_ADDR`: listen address (default: 127.0.0.1:3000)
    /// - `MAX_REQUEST_SIZE`, `REQUEST_TIMEOUT`, `CORS_ALLOWED_ORIGINS`,
    ///   `SECURITY_HEADERS_ENABLED`, `TRACING_ENABLED`, `AUDIT_ENABLED`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = match lookup("APP_ENV").or_else(|| lookup("RUST_ENV")) {
            Some(v) => Environment::from_str_loose(&v).ok_or(ConfigError::Invalid {
                key: "APP_ENV",
                value: v,
            })?,
            None => Environment::default(),
        };

        let raw_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        let jwt_secret =
            SigningSecret::new(raw_secret, &SecretPolicy::for_environment(environment))?;

        let session_lifetime = match lookup("SESSION_LIFETIME") {
            Some(v) => parse_duration(&v)
                .filter(|d| d.as_secs() > 0)
                .ok_or(ConfigError::Invalid {
                    key: "SESSION_LIFETIME",
                    value: v,
                })?,
            None => DEFAULT_SESSION_LIFETIME,
        };

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(v) => v.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: v.clone(),
            })?,
            None => DEFAULT_BCRYPT_COST,
        };
        check_bcrypt_cost(bcrypt_cost)?;

        let password_policy = match lookup("PASSWORD_POLICY") {
            Some(v) => PasswordPolicy::from_name(&v).ok_or(ConfigError::Invalid {
                key: "PASSWORD_POLICY",
                value: v,
            })?,
            None => PasswordPolicy::default(),
        };

        let bind_addr = match lookup("BIND_ADDR") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "BIND_ADDR",
                value: v.clone(),
            })?,
            None => default_bind_addr(),
        };

        Ok(Self {
            environment,
            jwt_secret,
            session_lifetime,
            bcrypt_cost,
            password_policy,
            bind_addr,
            security: SecurityConfig::from_lookup(&lookup)?,
        })
    }

    /// Start a builder around an already-validated secret.
    pub fn builder(jwt_secret: SigningSecret) -> AppConfigBuilder {
        AppConfigBuilder {
            config: Self {
                environment: Environment::default(),
                jwt_secret,
                session_lifetime: DEFAULT_SESSION_LIFETIME,
                bcrypt_cost: DEFAULT_BCRYPT_COST,
                password_policy: PasswordPolicy::default(),
                bind_addr: default_bind_addr(),
                security: SecurityConfig::default(),
            },
        }
    }

    /// Whether session cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }
}

/// Builder for AppConfig
#[derive(Debug, Clone)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    pub fn session_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.session_lifetime = lifetime;
        self
    }

    pub fn bcrypt_cost(mut self, cost: u32) -> Self {
        self.config.bcrypt_cost = cost;
        self
    }

    pub fn password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.config.password_policy = policy;
        self
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    pub fn build(self) -> Result<AppConfig, ConfigError> {
        check_bcrypt_cost(self.config.bcrypt_cost)?;
        Ok(self.config)
    }
}

fn check_bcrypt_cost(cost: u32) -> Result<(), ConfigError> {
    if (4..=31).contains(&cost) {
        Ok(())
    } else {
        Err(ConfigError::BcryptCost(cost))
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key) {
        Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid { key, value: v }),
        None => Ok(default),
    }
}

/// Turn a fixed map into a lookup function. Handy in tests and the CLI.
pub fn map_lookup(vars: HashMap<String, String>) -> impl Fn(&str) -> Option<String> {
    move |key| vars.get(key).cloned()
}
