//! Security Event Logging
//!
//! Structured records for security-relevant events. Each record carries the
//! event name, a category and a severity so log pipelines can filter on them.
//!
//! # Usage
//!
//! ```ignore
//! use securebiz::observability::{SecurityEvent, security_event};
//!
//! security_event!(
//!     SecurityEvent::AuthenticationFailure,
//!     reason = "invalid_credentials",
//!     "Authentication failed"
//! );
//! ```

use std::fmt;

/// Security event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    // Authentication
    AuthenticationSuccess,
    AuthenticationFailure,
    Logout,
    SessionCreated,
    /// Expired, revoked or unverifiable session presented
    SessionRejected,
    SessionRevoked,

    // Authorization
    AccessDenied,

    // Accounts
    UserRegistered,
    OrganizationCreated,

    // Records
    AssetDeleted,
    ComplianceUpdated,
    TrainingAssigned,
    ThreatReported,
    ThreatStatusChanged,
    ScanStarted,

    // System
    SystemStartup,
    SystemShutdown,
}

impl SecurityEvent {
    /// Event category for filtering/grouping
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess
            | Self::AuthenticationFailure
            | Self::Logout
            | Self::SessionCreated
            | Self::SessionRejected
            | Self::SessionRevoked => "authentication",

            Self::AccessDenied => "authorization",

            Self::UserRegistered | Self::OrganizationCreated => "user_management",

            Self::AssetDeleted
            | Self::ComplianceUpdated
            | Self::TrainingAssigned
            | Self::ThreatReported
            | Self::ThreatStatusChanged
            | Self::ScanStarted => "data_change",

            Self::SystemStartup | Self::SystemShutdown => "system",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::AuthenticationFailure | Self::AccessDenied | Self::SessionRejected => {
                Severity::High
            }

            Self::AuthenticationSuccess
            | Self::UserRegistered
            | Self::OrganizationCreated
            | Self::AssetDeleted
            | Self::ThreatReported
            | Self::ThreatStatusChanged
            | Self::SessionRevoked => Severity::Medium,

            Self::Logout
            | Self::SessionCreated
            | Self::ComplianceUpdated
            | Self::TrainingAssigned
            | Self::ScanStarted
            | Self::SystemStartup
            | Self::SystemShutdown => Severity::Low,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess => "authentication_success",
            Self::AuthenticationFailure => "authentication_failure",
            Self::Logout => "logout",
            Self::SessionCreated => "session_created",
            Self::SessionRejected => "session_rejected",
            Self::SessionRevoked => "session_revoked",
            Self::AccessDenied => "access_denied",
            Self::UserRegistered => "user_registered",
            Self::OrganizationCreated => "organization_created",
            Self::AssetDeleted => "asset_deleted",
            Self::ComplianceUpdated => "compliance_updated",
            Self::TrainingAssigned => "training_assigned",
            Self::ThreatReported => "threat_reported",
            Self::ThreatStatusChanged => "threat_status_changed",
            Self::ScanStarted => "scan_started",
            Self::SystemStartup => "system_startup",
            Self::SystemShutdown => "system_shutdown",
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Routine operations
    Low,
    /// Important state changes
    Medium,
    /// Security-relevant failures
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Log a security event with structured fields.
///
/// Adds `security_event`, `category` and `severity` fields and picks the
/// `tracing` level from the severity.
///
/// ```ignore
/// security_event!(
///     SecurityEvent::AccessDenied,
///     user_id = %claims.id,
///     resource = "/training/progress",
///     "Cross-organization access denied"
/// );
/// ```
#[macro_export]
macro_rules! security_event {
    ($event:expr, $($field:tt)*) => {{
        let event = $event;
        let severity = event.severity();
        let category = event.category();
        let event_name = event.name();

        match severity {
            $crate::observability::Severity::High => {
                ::tracing::warn!(
                    security_event = event_name,
                    category = category,
                    severity = "high",
                    $($field)*
                );
            }
            $crate::observability::Severity::Medium => {
                ::tracing::info!(
                    security_event = event_name,
                    category = category,
                    severity = "medium",
                    $($field)*
                );
            }
            $crate::observability::Severity::Low => {
                ::tracing::debug!(
                    security_event = event_name,
                    category = category,
                    severity = "low",
                    $($field)*
                );
            }
        }
    }};
}

pub use security_event;
