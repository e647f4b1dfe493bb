//! Password Hashing and Policy
//!
//! Passwords are stored only as bcrypt hashes. The work factor is fixed once at
//! startup from configuration and every hash gets a fresh random salt; both
//! are handled by the `bcrypt` crate.
//!
//! Verification goes through [`compare_password`], which never panics and
//! never falls back to comparing strings: a malformed stored hash simply
//! does not match.
//!
//! # Policy
//!
//! [`PasswordPolicy`] is checked at registration, before hashing:
//! - Minimum 8 characters
//! - Maximum 72 bytes (bcrypt ignores anything beyond that)
//! - Optional checks for common passwords, all-numeric input and the
//!   account's email local part, all off by default
//!
//! `PASSWORD_POLICY=strict` switches to [`PasswordPolicy::strict`], which
//! turns the optional checks on and raises the minimum to 12.
//!
//! # Usage
//!
//! ```ignore
//! use securebiz::password::{compare_password, hash_password, PasswordPolicy};
//!
//! PasswordPolicy::default().validate("password123")?;
//! let hash = hash_password("password123", 10)?;
//! assert!(compare_password("password123", &hash));
//! ```

use std::fmt;

/// bcrypt only reads the first 72 bytes of its input.
pub const BCRYPT_MAX_INPUT: usize = 72;

// ============================================================================
// Hashing
// ============================================================================

/// Hash a plaintext password with bcrypt at `cost`.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, PasswordError> {
    bcrypt::hash(plaintext, cost).map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Verify a plaintext password against a stored bcrypt hash.
///
/// Returns `false` for a mismatch and for a hash bcrypt cannot parse.
pub fn compare_password(plaintext: &str, hash: &str) -> bool {
    match bcrypt::verify(plaintext, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be parsed");
            false
        }
    }
}

// ============================================================================
// Password Policy
// ============================================================================

/// Rules a new password must satisfy.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// Minimum length in characters
    pub min_length: usize,

    /// Maximum length in bytes, capped at [`BCRYPT_MAX_INPUT`]
    pub max_length: usize,

    /// Check against the built-in common password list
    pub check_common_passwords: bool,

    /// Disallow passwords containing the local part of the email
    pub disallow_email_in_password: bool,

    /// Disallow PIN-like passwords
    pub disallow_all_numeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: BCRYPT_MAX_INPUT,
            check_common_passwords: false,
            disallow_email_in_password: false,
            disallow_all_numeric: false,
        }
    }
}

impl PasswordPolicy {
    /// A stricter policy: common, all-numeric and email-derived passwords rejected.
    pub fn strict() -> Self {
        Self {
            min_length: 12,
            check_common_passwords: true,
            disallow_email_in_password: true,
            disallow_all_numeric: true,
            ..Self::default()
        }
    }

    /// Policy by configuration name: "default" or "strict".
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" | "standard" => Some(Self::default()),
            "strict" => Some(Self::strict()),
            _ => None,
        }
    }

    /// Validate a password on its own.
    pub fn validate(&self, password: &str) -> Result<(), PasswordError> {
        self.validate_with_email(password, None)
    }

    /// Validate a password with the account email as context.
    pub fn validate_with_email(
        &self,
        password: &str,
        email: Option<&str>,
    ) -> Result<(), PasswordError> {
        let chars = password.chars().count();
        if chars < self.min_length {
            return Err(PasswordError::TooShort {
                min: self.min_length,
                actual: chars,
            });
        }

        let max = self.max_length.min(BCRYPT_MAX_INPUT);
        if password.len() > max {
            return Err(PasswordError::TooLong {
                max,
                actual: password.len(),
            });
        }

        if self.disallow_all_numeric && password.chars().all(|c| c.is_ascii_digit()) {
            return Err(PasswordError::AllNumeric);
        }

        if self.disallow_email_in_password {
            if let Some(local) = email.and_then(|e| e.split('@').next()) {
                if local.len() > 2 && password.to_lowercase().contains(&local.to_lowercase()) {
                    return Err(PasswordError::ContainsEmail);
                }
            }
        }

        if self.check_common_passwords && is_common_password(password) {
            return Err(PasswordError::TooCommon);
        }

        Ok(())
    }
}

// ============================================================================
// Password Errors
// ============================================================================

/// Password validation and hashing errors
#[derive(Debug, Clone)]
pub enum PasswordError {
    /// Password is too short
    TooShort { min: usize, actual: usize },
    /// Password is too long
    TooLong { max: usize, actual: usize },
    /// Password is too common
    TooCommon,
    /// Password contains the email local part
    ContainsEmail,
    /// Password is all numeric
    AllNumeric,
    /// bcrypt refused to hash (bad cost, internal failure)
    Hash(String),
}

impl PasswordError {
    /// Whether this is a policy rejection the caller can fix.
    pub fn is_policy(&self) -> bool {
        !matches!(self, Self::Hash(_))
    }
}

impl fmt::Display for PasswordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { min, .. } => {
                write!(f, "Password must be at least {} characters", min)
            }
            Self::TooLong { max, .. } => {
                write!(f, "Password must be at most {} bytes", max)
            }
            Self::TooCommon => write!(f, "Password is too common"),
            Self::ContainsEmail => write!(f, "Password cannot contain your email"),
            Self::AllNumeric => write!(f, "Password cannot be all numbers"),
            Self::Hash(e) => write!(f, "Password hashing failed: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {}

// ============================================================================
// Common Password List
// ============================================================================

fn is_common_password(password: &str) -> bool {
    let lower = password.to_lowercase();

    if COMMON_PASSWORDS.contains(&lower.as_str()) {
        return true;
    }

    // "password123456" counts as "password"
    COMMON_PASSWORDS.iter().any(|common| {
        common.len() >= 4
            && lower
                .strip_prefix(common)
                .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
    })
}

static COMMON_PASSWORDS: &[&str] = &[
    "123456", "password", "12345678", "qwerty", "123456789", "12345", "1234", "111111",
    "1234567", "dragon", "123123", "baseball", "abc123", "football", "monkey", "letmein",
    "shadow", "master", "666666", "qwertyuiop", "123321", "mustang", "1234567890",
    "superman", "1qaz2wsx", "7777777", "121212", "000000", "qazwsx", "123qwe", "trustno1",
    "zxcvbnm", "asdfgh", "sunshine", "iloveyou", "starwars", "computer", "freedom",
    "princess", "passw0rd", "admin", "administrator", "root", "welcome", "login", "guest",
    "changeme", "default", "secret", "security", "business", "company",
];

// ============================================================================
// Tests
// ============================================================================
