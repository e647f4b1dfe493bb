//! Error Envelope
//!
//! Every handler answers with the same tagged envelope:
//!
//! ```json
//! {"success": true,  "data": ...}
//! {"success": false, "error": "<safe message>", "field": "<optional>", "requestId": "<correlation id>"}
//! ```
//!
//! [`AppError`] carries an [`ErrorKind`] that decides the HTTP status and how
//! much of the message may reach the client. Internal details and sources are
//! logged with `tracing`, never returned.
//!
//! # Usage
//!
//! ```ignore
//! use securebiz::error::{ActionResult, AppError, StoreResultExt};
//!
//! async fn handler(session: Session, State(store): State<Arc<MemoryStore>>)
//!     -> Result<ActionResult<Vec<Asset>>, AppError>
//! {
//!     let assets = store.list_assets(session.organization_id);
//!     Ok(ActionResult::ok(assets))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use crate::config::Environment;
use crate::password::PasswordError;
use crate::session::TokenError;
use crate::store::StoreError;
use crate::validation::ValidationError;

/// Message returned for both unknown emails and wrong passwords.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

// ============================================================================
// Error Configuration
// ============================================================================

/// How much of an error may be exposed.
#[derive(Debug, Clone)]
pub struct ErrorConfig {
    /// Include internal details in responses. Never in production.
    pub expose_details: bool,

    pub log_errors: bool,

    /// Message substituted for internal errors
    pub internal_error_message: String,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl ErrorConfig {
    pub fn production() -> Self {
        Self {
            expose_details: false,
            log_errors: true,
            internal_error_message: "An internal error occurred".to_string(),
        }
    }

    pub fn development() -> Self {
        Self {
            expose_details: true,
            log_errors: true,
            internal_error_message: "Internal server error".to_string(),
        }
    }

    pub fn for_environment(environment: Environment) -> Self {
        if environment.is_production() {
            Self::production()
        } else {
            Self::development()
        }
    }
}

// Set once at startup
static ERROR_CONFIG: std::sync::OnceLock<ErrorConfig> = std::sync::OnceLock::new();

/// Install the error configuration. Later calls are ignored.
pub fn init(config: ErrorConfig) {
    let _ = ERROR_CONFIG.set(config);
}

pub fn config() -> &'static ErrorConfig {
    ERROR_CONFIG.get_or_init(ErrorConfig::default)
}

// ============================================================================
// Error Types
// ============================================================================

/// Application error with safe client messaging.
#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
    /// Client-facing message
    pub message: String,
    /// Offending input field, for validation errors
    pub field: Option<String>,
    /// Internal details (logged, exposed only in development)
    pub details: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Correlation id of the failing request, filled in when the response is built
    pub request_id: Option<String>,
}

/// Error categories with their HTTP status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request body (400)
    BadRequest,
    /// Input rejected by validation (422)
    Validation,
    /// Login failed; one outcome for unknown email and wrong password (401)
    InvalidCredentials,
    /// No valid session (401)
    Unauthorized,
    /// Session valid but not allowed (403)
    Forbidden,
    /// Missing, or owned by another organization (404)
    NotFound,
    /// Uniqueness violation (409)
    Conflict,
    /// A persistence step failed; message is "Failed to <action>" (500)
    Failed,
    /// Anything else (500)
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Failed | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message is safe to return verbatim
    pub fn expose_message(&self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
            details: None,
            source: None,
            request_id: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// The single login failure outcome.
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorKind::InvalidCredentials, INVALID_CREDENTIALS)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized, "Unauthorized")
    }

    pub fn forbidden() -> Self {
        Self::new(ErrorKind::Forbidden, "Access denied")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// "Failed to <action>"
    pub fn failed(action: &str) -> Self {
        Self::new(ErrorKind::Failed, format!("Failed to {action}"))
    }

    /// Internal error with a source; the source is logged, not exposed.
    pub fn internal(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            details: Some(source.to_string()),
            source: Some(Box::new(source)),
            ..Self::new(ErrorKind::Internal, message)
        }
    }

    pub fn internal_msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn log(&self) {
        if !config().log_errors {
            return;
        }

        let request_id = self.request_id.as_deref().unwrap_or("unknown");
        let details = self.details.as_deref().unwrap_or("none");

        match self.kind {
            ErrorKind::Internal | ErrorKind::Failed => {
                tracing::error!(
                    error_kind = %self.kind,
                    message = %self.message,
                    details = %details,
                    request_id = %request_id,
                    "Internal error"
                );
            }
            ErrorKind::InvalidCredentials | ErrorKind::Unauthorized | ErrorKind::Forbidden => {
                tracing::warn!(
                    error_kind = %self.kind,
                    request_id = %request_id,
                    "Auth error"
                );
            }
            _ => {
                tracing::debug!(
                    error_kind = %self.kind,
                    message = %self.message,
                    field = ?self.field,
                    request_id = %request_id,
                    "Client error"
                );
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest => write!(f, "bad_request"),
            Self::Validation => write!(f, "validation_error"),
            Self::InvalidCredentials => write!(f, "invalid_credentials"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Failed => write!(f, "failed"),
            Self::Internal => write!(f, "internal_error"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// The tagged result envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Development only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            field: None,
            request_id: None,
            details: None,
        }
    }
}

impl ActionResult<()> {
    fn failure(error: String, field: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            field,
            request_id: None,
            details: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ActionResult<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// A success envelope answered with `201 Created`.
#[derive(Debug)]
pub struct Created<T>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, ActionResult::ok(self.0)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(mut self) -> Response {
        if self.request_id.is_none() {
            self.request_id = crate::audit::current_correlation_id();
        }
        self.log();

        let cfg = config();
        let status = self.kind.status_code();

        let message = if self.kind.expose_message() {
            self.message
        } else {
            cfg.internal_error_message.clone()
        };

        let mut body = ActionResult::failure(message, self.field);
        body.request_id = self.request_id;
        if cfg.expose_details {
            body.details = self.details;
        }

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let app = AppError::validation(err.message);
        match err.field {
            Some(field) => app.with_field(field),
            None => app,
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        if err.is_policy() {
            AppError::validation(err.to_string()).with_field("password")
        } else {
            AppError::internal("Password hashing failed", err)
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::internal("Failed to create session", err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::not_found(err.to_string()),
            StoreError::Conflict(message) => AppError::conflict(message),
            StoreError::Backend(_) => AppError::internal("Storage failure", err),
        }
    }
}

/// Maps storage results into client errors, naming the failed action.
pub trait StoreResultExt<T> {
    /// Backend failures become "Failed to `action`"; not-found and conflicts
    /// keep their own messages.
    fn failed_to(self, action: &str) -> Result<T>;
}

impl<T> StoreResultExt<T> for std::result::Result<T, StoreError> {
    fn failed_to(self, action: &str) -> Result<T> {
        self.map_err(|err| match err {
            StoreError::Backend(details) => AppError::failed(action).with_details(details),
            other => other.into(),
        })
    }
}

/// Result type alias for handlers returning AppError
pub type Result<T> = std::result::Result<T, AppError>;

// ============================================================================
// Tests
// ============================================================================
