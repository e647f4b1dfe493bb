//! Authentication and Session Management
//!
//! [`AuthService`] is the only component that touches password hashes and
//! signing keys. It issues the session cookie on login and registration,
//! revokes it on logout, and verifies it for every privileged request.
//!
//! # Privileged handlers
//!
//! Put the [`Session`] extractor first in the handler's arguments. It reads
//! the `session` cookie, verifies it and hands over the claims; anything
//! else is rejected with 401 before the handler body runs.
//!
//! ```ignore
//! async fn list_assets(session: Session, State(store): State<Arc<MemoryStore>>)
//!     -> ActionResult<Vec<Asset>>
//! {
//!     ActionResult::ok(store.list_assets(session.organization_id))
//! }
//! ```
//!
//! # Login failures
//!
//! An unknown email and a wrong password produce the same error and the
//! same bcrypt work, so responses do not reveal which accounts exist.

use std::ops::Deref;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::models::{Credential, NewAccount, NewOrganization};
use crate::observability::SecurityEvent;
use crate::password::{self, PasswordError, PasswordPolicy};
use crate::session::{
    CookiePolicy, NewSession, SessionClaims, TokenIssuer, TokenState, SESSION_COOKIE,
};
use crate::store::{CredentialStore, StoreError};
use crate::validation::{
    validate_email, validate_length, Validate, ValidationError, ValidationErrorCode,
};

/// Compared against when the email is unknown, so both failure paths pay
/// for one bcrypt verification.
const TIMING_DUMMY_PASSWORD: &str = "timing-equalizer-not-a-password";

// ============================================================================
// Requests
// ============================================================================

/// Shape check only; the full [`PasswordPolicy`] runs at registration.
fn validate_password_present(password: &str) -> std::result::Result<(), ValidationError> {
    if password.chars().count() < 8 {
        return Err(ValidationError::for_field(
            "password",
            ValidationErrorCode::TooShort,
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_email(&self.email)?;
        validate_password_present(&self.password)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub company: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_length(&self.name, 2, 100, "name")?;
        validate_email(&self.email)?;
        validate_password_present(&self.password)?;
        validate_length(&self.company, 2, 200, "company").map_err(|e| match e.code {
            ValidationErrorCode::TooShort => {
                e.with_message("Company name must be at least 2 characters")
            }
            _ => e,
        })?;
        Ok(())
    }
}

// ============================================================================
// AuthService
// ============================================================================

/// Issues, verifies and revokes sessions.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    issuer: TokenIssuer,
    cookies: CookiePolicy,
    policy: PasswordPolicy,
    bcrypt_cost: u32,
    timing_dummy_hash: String,
}

impl AuthService {
    /// Build from configuration. Hashes one dummy password up front.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
    ) -> std::result::Result<Self, PasswordError> {
        let timing_dummy_hash = password::hash_password(TIMING_DUMMY_PASSWORD, config.bcrypt_cost)?;
        Ok(Self {
            store,
            issuer: TokenIssuer::new(&config.jwt_secret, config.session_lifetime),
            cookies: CookiePolicy::new(config.secure_cookies(), config.session_lifetime),
            policy: config.password_policy.clone(),
            bcrypt_cost: config.bcrypt_cost,
            timing_dummy_hash,
        })
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    // ------------------------------------------------------------------------
    // Passwords
    // ------------------------------------------------------------------------

    /// bcrypt at the configured cost, off the async executor.
    pub async fn hash_password(&self, plaintext: &str) -> Result<String> {
        let plaintext = plaintext.to_owned();
        let cost = self.bcrypt_cost;
        let hashed = tokio::task::spawn_blocking(move || password::hash_password(&plaintext, cost))
            .await
            .map_err(|e| AppError::internal("Password hashing task failed", e))??;
        Ok(hashed)
    }

    /// Never errors: a malformed hash or a failed task compares unequal.
    pub async fn compare_password(&self, plaintext: &str, hash: &str) -> bool {
        let plaintext = plaintext.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || password::compare_password(&plaintext, &hash))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Password comparison task failed");
                false
            })
    }

    // ------------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------------

    pub fn issue_token(&self, session: &NewSession) -> Result<(String, SessionClaims)> {
        Ok(self.issuer.issue(session)?)
    }

    pub fn verify_token(&self, token: &str) -> Option<SessionClaims> {
        self.issuer.verify(token)
    }

    fn start_session(&self, jar: CookieJar, credential: &Credential) -> Result<(CookieJar, SessionClaims)> {
        let (token, claims) = self.issue_token(&NewSession::from(credential))?;

        crate::security_event!(
            SecurityEvent::SessionCreated,
            user_id = %claims.id,
            organization_id = %claims.organization_id,
            jti = %claims.jti,
            "Session created"
        );

        Ok((jar.add(self.cookies.session_cookie(token)), claims))
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Check credentials and set the session cookie.
    pub async fn login(
        &self,
        jar: CookieJar,
        email: &str,
        password: &str,
    ) -> Result<(CookieJar, SessionClaims)> {
        let credential = self
            .store
            .find_by_email(email)
            .await
            .map_err(|e| AppError::internal("Credential lookup failed", e))?;

        let Some(credential) = credential else {
            // same cost as a real comparison
            let _ = self.compare_password(password, &self.timing_dummy_hash).await;
            crate::security_event!(
                SecurityEvent::AuthenticationFailure,
                reason = "unknown_email",
                "Authentication failed"
            );
            return Err(AppError::invalid_credentials());
        };

        if !self.compare_password(password, &credential.password_hash).await {
            crate::security_event!(
                SecurityEvent::AuthenticationFailure,
                user_id = %credential.id,
                reason = "invalid_password",
                "Authentication failed"
            );
            return Err(AppError::invalid_credentials());
        }

        crate::security_event!(
            SecurityEvent::AuthenticationSuccess,
            user_id = %credential.id,
            organization_id = %credential.organization_id,
            "User authenticated"
        );

        self.start_session(jar, &credential)
    }

    /// Create an organization and its owner, then log the owner in.
    pub async fn register(
        &self,
        jar: CookieJar,
        request: &RegisterRequest,
    ) -> Result<(CookieJar, SessionClaims)> {
        if self
            .store
            .find_by_email(&request.email)
            .await
            .map_err(|e| AppError::internal("Credential lookup failed", e))?
            .is_some()
        {
            return Err(AppError::conflict("Email already in use").with_field("email"));
        }

        self.policy
            .validate_with_email(&request.password, Some(&request.email))?;

        let password_hash = self.hash_password(&request.password).await?;
        let (organization, credential) = self
            .store
            .create_account(NewAccount {
                organization: NewOrganization::from_company(request.company.trim()),
                name: request.name.trim().to_string(),
                email: request.email.clone(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(message) => {
                    AppError::conflict(message).with_field("email")
                }
                other => AppError::failed("create account").with_details(other.to_string()),
            })?;

        crate::security_event!(
            SecurityEvent::OrganizationCreated,
            organization_id = %organization.id,
            "Organization created"
        );

        crate::security_event!(
            SecurityEvent::UserRegistered,
            user_id = %credential.id,
            organization_id = %organization.id,
            "User registered"
        );

        self.start_session(jar, &credential)
    }

    /// Remove the session cookie and revoke its token. Idempotent.
    pub fn logout(&self, jar: CookieJar) -> CookieJar {
        if let Some(claims) = jar
            .get(SESSION_COOKIE)
            .and_then(|c| self.issuer.verify(c.value()))
        {
            self.issuer.revoke(&claims);
            crate::security_event!(
                SecurityEvent::SessionRevoked,
                user_id = %claims.id,
                jti = %claims.jti,
                "Session revoked"
            );
            crate::security_event!(SecurityEvent::Logout, user_id = %claims.id, "User logged out");
        }

        jar.remove(self.cookies.removal_cookie())
    }

    /// Verified claims from the session cookie, or 401.
    pub fn require_auth(&self, jar: &CookieJar) -> Result<SessionClaims> {
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Err(AppError::unauthorized());
        };

        match self.issuer.inspect(cookie.value()) {
            TokenState::Valid(claims) => Ok(claims),
            state => {
                crate::security_event!(
                    SecurityEvent::SessionRejected,
                    state = state.label(),
                    "Session rejected"
                );
                Err(AppError::unauthorized())
            }
        }
    }
}

// ============================================================================
// Session extractor
// ============================================================================

/// Verified session of the caller.
///
/// Derefs to [`SessionClaims`].
#[derive(Debug, Clone)]
pub struct Session(pub SessionClaims);

impl Deref for Session {
    type Target = SessionClaims;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Session
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth = Arc::<AuthService>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let claims = auth.require_auth(&jar)?;
        crate::audit::record_user(&claims.id);
        Ok(Session(claims))
    }
}
