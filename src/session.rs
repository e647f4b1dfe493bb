//! Session Tokens
//!
//! A session is an HS256-signed token carried in an HTTP-only cookie named
//! `session`. The token embeds the caller's identity, organization and role,
//! so privileged handlers never need a store round-trip to scope their work.
//!
//! # Lifecycle
//!
//! ```text
//! Unissued ──login──▶ Valid ──exp passes──▶ Expired
//!                       │
//!                       └──logout──▶ Revoked
//! ```
//!
//! Expiry is enforced with zero leeway. Revocation is a process-local deny
//! list keyed by `jti`; an entry lives only until the token would have
//! expired anyway. It is not shared between processes.
//!
//! # Cookie attributes
//!
//! | Attribute | Value |
//! |-----------|-------|
//! | Name      | `session` |
//! | HttpOnly  | always |
//! | Secure    | production only |
//! | SameSite  | Strict |
//! | Max-Age   | session lifetime (86400 by default) |
//! | Path      | `/` |

use std::collections::HashMap;
use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::jwt_secret::SigningSecret;
use crate::models::{Credential, Role};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

// ============================================================================
// Claims
// ============================================================================

/// Verified facts carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// User id
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub organization_id: Uuid,
    pub role: Role,
    /// Issued-at, seconds since epoch
    pub iat: i64,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Token id, used for revocation
    pub jti: Uuid,
}

/// Claims to issue, minus everything the issuer stamps (`iat`, `exp`, `jti`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub organization_id: Uuid,
    pub role: Role,
}

impl From<&Credential> for NewSession {
    fn from(c: &Credential) -> Self {
        Self {
            id: c.id,
            email: c.email.clone(),
            name: c.name.clone(),
            organization_id: c.organization_id,
            role: c.role,
        }
    }
}

/// Where a presented token stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Valid(SessionClaims),
    Expired,
    Revoked,
    /// Malformed, tampered, wrong algorithm or wrong key
    Invalid,
}

impl TokenState {
    pub fn into_claims(self) -> Option<SessionClaims> {
        match self {
            Self::Valid(claims) => Some(claims),
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Valid(_) => "valid",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Invalid => "invalid",
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

// ============================================================================
// Revocation
// ============================================================================

/// Process-local deny list of revoked token ids.
#[derive(Debug, Default)]
pub struct RevocationList {
    /// jti -> exp
    entries: Mutex<HashMap<Uuid, i64>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `jti` until `exp`. Entries past their expiry are pruned.
    pub fn revoke(&self, jti: Uuid, exp: i64) {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.lock();
        entries.retain(|_, e| *e >= now);
        if exp >= now {
            entries.insert(jti, exp);
        }
    }

    pub fn is_revoked(&self, jti: &Uuid) -> bool {
        self.entries.lock().contains_key(jti)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// TokenIssuer
// ============================================================================

/// Issues and verifies session tokens with one HS256 key.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
    revocations: RevocationList,
}

impl TokenIssuer {
    pub fn new(secret: &SigningSecret, lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
            revocations: RevocationList::new(),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a token for `session`, stamping `iat`, `exp` and a fresh `jti`.
    pub fn issue(&self, session: &NewSession) -> Result<(String, SessionClaims), TokenError> {
        let iat = Utc::now().timestamp();
        let claims = SessionClaims {
            id: session.id,
            email: session.email.clone(),
            name: session.name.clone(),
            organization_id: session.organization_id,
            role: session.role,
            iat,
            exp: iat + self.lifetime.as_secs() as i64,
            jti: Uuid::new_v4(),
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Classify a presented token.
    pub fn inspect(&self, token: &str) -> TokenState {
        match decode::<SessionClaims>(token, &self.decoding, &self.validation) {
            Ok(data) if self.revocations.is_revoked(&data.claims.jti) => TokenState::Revoked,
            Ok(data) => TokenState::Valid(data.claims),
            Err(e) if matches!(e.kind(), JwtErrorKind::ExpiredSignature) => TokenState::Expired,
            Err(_) => TokenState::Invalid,
        }
    }

    /// Verified claims, or `None` for anything not currently valid.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        self.inspect(token).into_claims()
    }

    /// Deny the token with these claims for the rest of its lifetime.
    pub fn revoke(&self, claims: &SessionClaims) {
        self.revocations.revoke(claims.jti, claims.exp);
    }

    pub fn revocations(&self) -> &RevocationList {
        &self.revocations
    }
}

// ============================================================================
// Cookies
// ============================================================================

/// Attributes for the session cookie.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    pub max_age: Duration,
}

impl CookiePolicy {
    pub fn new(secure: bool, max_age: Duration) -> Self {
        Self { secure, max_age }
    }

    /// The cookie that carries a freshly issued token.
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::seconds(self.max_age.as_secs() as i64))
            .path("/")
            .build()
    }

    /// A cookie matching the session cookie's name and path, for removal.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE).path("/").build()
    }
}
