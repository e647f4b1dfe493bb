//! Session Signing Secret
//!
//! The HS256 key that signs every session token. It is loaded once at startup
//! from `JWT_SECRET`, checked against an environment-dependent policy, and then
//! carried around as a [`SigningSecret`] that never prints its contents.
//!
//! There is no fallback key. A process without a usable secret
//! refuses to start.
//!
//! # Example
//!
//! ```
//! use securebiz::{Environment, SecretPolicy, SigningSecret};
//!
//! let raw = SigningSecret::generate_for(Environment::Production);
//! let secret = SigningSecret::new(raw, &SecretPolicy::for_environment(Environment::Production));
//! assert!(secret.is_ok());
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::config::Environment;

/// Reasons a signing secret is refused.
#[derive(Debug, Clone, PartialEq)]
pub enum SecretError {
    /// Nothing was configured
    Missing,
    /// Secret is shorter than the policy minimum
    TooShort {
        actual: usize,
        minimum: usize,
        context: String,
    },
    /// Secret contains a guessable word
    WeakPattern { pattern: String },
    /// Secret has insufficient entropy
    LowEntropy {
        actual: f64,
        minimum: f64,
        context: String,
    },
    /// Secret lacks required character classes
    InsufficientDiversity { missing: Vec<String> },
}

impl fmt::Display for SecretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "JWT_SECRET is not set"),
            Self::TooShort {
                actual,
                minimum,
                context,
            } => write!(
                f,
                "Secret length ({} chars) is below minimum ({} chars) for {}",
                actual, minimum, context
            ),
            Self::WeakPattern { pattern } => {
                write!(f, "Secret contains weak pattern: '{}'", pattern)
            }
            Self::LowEntropy {
                actual,
                minimum,
                context,
            } => write!(
                f,
                "Secret entropy ({:.1} bits) is below minimum ({:.1} bits) for {}",
                actual, minimum, context
            ),
            Self::InsufficientDiversity { missing } => {
                write!(f, "Secret must contain: {}", missing.join(", "))
            }
        }
    }
}

impl std::error::Error for SecretError {}

/// Requirements a signing secret must meet.
#[derive(Debug, Clone)]
pub struct SecretPolicy {
    /// Minimum secret length in characters
    pub min_length: usize,
    /// Minimum Shannon entropy in bits
    pub min_entropy: f64,
    /// Require upper, lower, digit and special characters
    pub require_diversity: bool,
    /// Reject secrets containing common words
    pub check_weak_patterns: bool,
    /// Context string for error messages
    pub context: String,
}

impl Default for SecretPolicy {
    fn default() -> Self {
        Self::for_environment(Environment::Development)
    }
}

impl SecretPolicy {
    /// Policy for a deployment environment.
    ///
    /// - `Production`: 64 chars, 128-bit entropy, diversity required
    /// - `Test`: 32 chars, 64-bit entropy
    /// - `Development`: 32 chars, 32-bit entropy
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self {
                min_length: 64,
                min_entropy: 128.0,
                require_diversity: true,
                check_weak_patterns: true,
                context: "production environment".to_string(),
            },
            Environment::Test => Self {
                min_length: 32,
                min_entropy: 64.0,
                require_diversity: false,
                check_weak_patterns: true,
                context: "test environment".to_string(),
            },
            Environment::Development => Self {
                min_length: 32,
                min_entropy: 32.0,
                require_diversity: false,
                check_weak_patterns: true,
                context: "development environment".to_string(),
            },
        }
    }

    /// Validate a secret against this policy.
    pub fn validate(&self, secret: &str) -> Result<(), SecretError> {
        if secret.is_empty() {
            return Err(SecretError::Missing);
        }

        if secret.len() < self.min_length {
            return Err(SecretError::TooShort {
                actual: secret.len(),
                minimum: self.min_length,
                context: self.context.clone(),
            });
        }

        if self.check_weak_patterns {
            if let Some(pattern) = find_weak_pattern(secret) {
                return Err(SecretError::WeakPattern {
                    pattern: pattern.to_string(),
                });
            }
        }

        let entropy = shannon_entropy(secret);
        if entropy < self.min_entropy {
            return Err(SecretError::LowEntropy {
                actual: entropy,
                minimum: self.min_entropy,
                context: self.context.clone(),
            });
        }

        if self.require_diversity {
            let missing = missing_character_classes(secret);
            if !missing.is_empty() {
                return Err(SecretError::InsufficientDiversity { missing });
            }
        }

        Ok(())
    }
}

fn find_weak_pattern(secret: &str) -> Option<&'static str> {
    const WEAK_PATTERNS: &[&str] = &[
        "secret", "password", "admin", "123456", "qwerty", "default", "example", "changeme",
        "letmein", "welcome", "securebiz",
    ];

    let lower = secret.to_lowercase();
    WEAK_PATTERNS.iter().copied().find(|p| lower.contains(p))
}

fn missing_character_classes(secret: &str) -> Vec<String> {
    let mut missing = Vec::new();
    if !secret.chars().any(|c| c.is_uppercase()) {
        missing.push("uppercase letters".to_string());
    }
    if !secret.chars().any(|c| c.is_lowercase()) {
        missing.push("lowercase letters".to_string());
    }
    if !secret.chars().any(|c| c.is_ascii_digit()) {
        missing.push("digits".to_string());
    }
    if !secret.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        missing.push("special characters".to_string());
    }
    missing
}

/// Total Shannon entropy of a string in bits (per-char entropy times length).
pub fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }

    let total = s.chars().count() as f64;
    let per_char: f64 = counts
        .values()
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum();

    per_char * total
}

// ============================================================================
// SigningSecret
// ============================================================================

/// A validated HS256 signing key.
///
/// `Debug` is redacted so the key cannot leak through `?config` in a log line.
#[derive(Clone)]
pub struct SigningSecret(String);

impl SigningSecret {
    /// Validate `raw` against `policy` and wrap it.
    pub fn new(raw: impl Into<String>, policy: &SecretPolicy) -> Result<Self, SecretError> {
        let raw = raw.into();
        policy.validate(&raw)?;
        Ok(Self(raw))
    }

    /// Key bytes for the token encoder/decoder.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Generate a random secret of `length` characters.
    pub fn generate(length: usize) -> String {
        use rand::Rng;

        const CHARSET: &[u8] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()_+-=[]{}|;:,.<>?/~";

        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect()
    }

    /// Generate a secret that passes the policy for `environment`.
    pub fn generate_for(environment: Environment) -> String {
        let policy = SecretPolicy::for_environment(environment);
        let length = policy.min_length.max(64);

        for _ in 0..10 {
            let secret = Self::generate(length);
            if policy.validate(&secret).is_ok() {
                return secret;
            }
        }

        Self::generate(length + 32)
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret([REDACTED])")
    }
}
