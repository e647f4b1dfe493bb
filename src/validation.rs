//! Input Validation
//!
//! Request bodies are checked before any handler logic runs:
//! - Declarative validation via the `Validate` trait
//! - Validators for required fields, lengths, emails, ranges and collections
//! - `ValidatedJson`, an axum extractor that deserializes then validates
//! - `ValidatedPath` and `ValidatedQuery`, which answer parse failures with
//!   the error envelope instead of axum's plain-text rejection
//!
//! The first failing rule wins, and its message is returned as-is in the
//! error envelope together with the offending field.
//!
//! # Usage
//!
//! ```ignore
//! use securebiz::validation::{Validate, ValidationError, validate_email, validate_length};
//!
//! struct LoginRequest {
//!     email: String,
//!     password: String,
//! }
//!
//! impl Validate for LoginRequest {
//!     fn validate(&self) -> Result<(), ValidationError> {
//!         validate_email(&self.email)?;
//!         validate_length(&self.password, 8, 72, "password")?;
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashSet;
use std::fmt;

use axum::body::Body;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Validation error with field context
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Field that failed validation (if applicable)
    pub field: Option<String>,
    /// Error code for programmatic handling
    pub code: ValidationErrorCode,
    /// Human-readable message
    pub message: String,
}

impl ValidationError {
    pub fn new(code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: None,
            code,
            message: message.into(),
        }
    }

    pub fn for_field(
        field: impl Into<String>,
        code: ValidationErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: Some(field.into()),
            code,
            message: message.into(),
        }
    }

    /// Replace the message, keeping field and code.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validation error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    Required,
    TooShort,
    TooLong,
    InvalidFormat,
    InvalidEmail,
    OutOfRange,
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::TooShort => write!(f, "too_short"),
            Self::TooLong => write!(f, "too_long"),
            Self::InvalidFormat => write!(f, "invalid_format"),
            Self::InvalidEmail => write!(f, "invalid_email"),
            Self::OutOfRange => write!(f, "out_of_range"),
        }
    }
}

/// Implemented by request bodies.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;

    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// "ipAddress" -> "IpAddress"
fn label(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// String Validators
// ============================================================================

/// Non-empty after trimming.
pub fn validate_required(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::for_field(
            field,
            ValidationErrorCode::Required,
            format!("{} is required", label(field)),
        ));
    }
    Ok(())
}

/// Character count within `min..=max`, measured on the trimmed value.
pub fn validate_length(
    value: &str,
    min: usize,
    max: usize,
    field: &str,
) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(ValidationError::for_field(
            field,
            ValidationErrorCode::TooShort,
            format!("{} must be at least {} characters", label(field), min),
        ));
    }
    if len > max {
        return Err(ValidationError::for_field(
            field,
            ValidationErrorCode::TooLong,
            format!("{} must be at most {} characters", label(field), max),
        ));
    }
    Ok(())
}

/// Optional text fields only have an upper bound.
pub fn validate_optional_length(
    value: Option<&str>,
    max: usize,
    field: &str,
) -> Result<(), ValidationError> {
    match value {
        Some(v) => validate_length(v, 0, max, field),
        None => Ok(()),
    }
}

/// Pragmatic email shape check. Does not validate deliverability.
pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    let invalid = || {
        ValidationError::for_field(
            "email",
            ValidationErrorCode::InvalidEmail,
            "Invalid email address",
        )
    };

    let value = value.trim();
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;

    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return Err(invalid());
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err(invalid());
    }
    if local.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }

    if domain.is_empty() || domain.len() > 255 || !domain.contains('.') {
        return Err(invalid());
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(invalid());
    }
    if !domain.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-') {
        return Err(invalid());
    }

    Ok(())
}

// ============================================================================
// Numeric and Collection Validators
// ============================================================================

pub fn validate_range<T: PartialOrd + fmt::Display>(
    value: T,
    min: T,
    max: T,
    field: &str,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::for_field(
            field,
            ValidationErrorCode::OutOfRange,
            format!("{} must be between {} and {}", label(field), min, max),
        ));
    }
    Ok(())
}

pub fn validate_collection_size<T>(
    collection: &[T],
    min: usize,
    max: usize,
    field: &str,
) -> Result<(), ValidationError> {
    let len = collection.len();
    if len < min {
        return Err(ValidationError::for_field(
            field,
            ValidationErrorCode::TooShort,
            format!("Must have at least {} items", min),
        ));
    }
    if len > max {
        return Err(ValidationError::for_field(
            field,
            ValidationErrorCode::TooLong,
            format!("Must have at most {} items", max),
        ));
    }
    Ok(())
}

pub fn validate_unique<T: std::hash::Hash + Eq>(
    collection: &[T],
    field: &str,
) -> Result<(), ValidationError> {
    let set: HashSet<_> = collection.iter().collect();
    if set.len() != collection.len() {
        return Err(ValidationError::for_field(
            field,
            ValidationErrorCode::InvalidFormat,
            "Collection contains duplicate values",
        ));
    }
    Ok(())
}

// ============================================================================
// Axum Extractor
// ============================================================================

/// JSON body that has been deserialized and validated.
///
/// Malformed JSON is a 400, a failed rule is a 422; both answer with the
/// error envelope.
///
/// ```ignore
/// async fn add_asset(
///     session: Session,
///     ValidatedJson(body): ValidatedJson<AddAssetRequest>,
/// ) -> Result<Created<Asset>> {
///     // body is guaranteed to be valid
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::warn!(error = %e, "JSON parsing failed");
            AppError::bad_request("Invalid request body").with_details(e.body_text())
        })?;

        check(&value)?;
        Ok(ValidatedJson(value))
    }
}

/// `Option<ValidatedJson<T>>` is `None` for an empty or all-whitespace body.
///
/// Anything else must still parse and validate.
impl<T, S> axum::extract::OptionalFromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.map_err(|e| {
            tracing::warn!(error = %e, "Request body could not be read");
            AppError::bad_request("Invalid request body")
        })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let req = Request::from_parts(parts, Body::from(bytes));
        <Self as FromRequest<S>>::from_request(req, state)
            .await
            .map(Some)
    }
}

fn check<T: Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(|error| {
        tracing::warn!(
            field = ?error.field,
            code = %error.code,
            message = %error.message,
            "Validation failed"
        );
        error.into()
    })
}

/// Path parameters; a value that does not parse is a 400 envelope.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Path parameter parsing failed");
                AppError::bad_request("Invalid path parameter").with_details(e.body_text())
            })?;
        Ok(ValidatedPath(value))
    }
}

/// Query string parameters; a malformed query is a 400 envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Query string parsing failed");
                AppError::bad_request("Invalid query string").with_details(e.body_text())
            })?;
        Ok(ValidatedQuery(value))
    }
}

// ============================================================================
// Tests
// ============================================================================
