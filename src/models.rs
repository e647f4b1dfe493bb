//! Domain records
//!
//! Every tenant-owned record carries an `organization_id`; the handlers only
//! ever take that id from a verified session. Frameworks and training modules
//! are global reference data.
//!
//! Wire names are camelCase and enum values keep their display spelling
//! ("In Progress", "False Positive").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Accounts
// ============================================================================

/// Role of an account within its organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Admin,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub industry: String,
    pub size: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an organization.
#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub industry: String,
    pub size: String,
}

impl NewOrganization {
    /// Organization created at sign-up from just a company name.
    pub fn from_company(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            industry: "Other".to_string(),
            size: "Small".to_string(),
        }
    }
}

/// Stored identity: email, bcrypt hash, organization and role.
///
/// The hash never leaves the process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub organization_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a credential. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub organization_id: Uuid,
    pub role: Role,
}

/// Sign-up input: a new organization and its owner, created together.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub organization: NewOrganization,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

// ============================================================================
// Assets and findings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Server,
    Workstation,
    Mobile,
    Network,
    Cloud,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub operating_system: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAsset {
    pub name: String,
    pub asset_type: AssetType,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub operating_system: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VulnerabilityStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    #[serde(rename = "False Positive")]
    FalsePositive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vulnerability {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub cvss_score: Option<f32>,
    pub cve_id: Option<String>,
    pub status: VulnerabilityStatus,
    pub remediation_steps: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewVulnerability {
    pub asset_id: Uuid,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub cvss_score: Option<f32>,
    pub cve_id: Option<String>,
    pub remediation_steps: Option<String>,
}

// ============================================================================
// Threats and scans
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    LoginAttempt,
    DataAccess,
    ConfigurationChange,
    MalwareDetection,
    NetworkAnomaly,
    PolicyViolation,
    Other,
}

/// Threat events only use the low three severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatStatus {
    Active,
    Investigating,
    Resolved,
    #[serde(rename = "False Positive")]
    FalsePositive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threat {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub event_type: ThreatType,
    pub severity: ThreatSeverity,
    pub source: String,
    pub source_ip: Option<String>,
    pub description: String,
    pub raw_data: Option<serde_json::Value>,
    pub status: ThreatStatus,
    pub timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewThreat {
    pub asset_id: Option<Uuid>,
    pub event_type: ThreatType,
    pub severity: ThreatSeverity,
    pub source: String,
    pub source_ip: Option<String>,
    pub description: String,
    pub raw_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Vulnerability,
    Compliance,
    Network,
    Configuration,
    #[default]
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    Scheduled,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityScan {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub scan_type: ScanType,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

// ============================================================================
// Compliance
// ============================================================================

/// Progress through a compliance requirement or a training module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRequirement {
    pub id: Uuid,
    pub framework_id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceFramework {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub requirements: Vec<ComplianceRequirement>,
}

/// One organization's status on one requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationCompliance {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub requirement_id: Uuid,
    pub status: ProgressStatus,
    pub evidence: Option<String>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status joined with its requirement and framework.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceEntry {
    #[serde(flatten)]
    pub status: OrganizationCompliance,
    pub requirement: ComplianceRequirement,
    pub framework_name: String,
}

// ============================================================================
// Training
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingModule {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub content: String,
    pub duration_minutes: u32,
    pub level: TrainingLevel,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub module_id: Uuid,
    pub status: ProgressStatus,
    /// Percent complete, 0-100
    pub progress: u8,
    pub score: Option<u8>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Progress joined with its module.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingEntry {
    #[serde(flatten)]
    pub progress: TrainingProgress,
    pub module: TrainingModule,
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

/// Aggregate counts for one organization.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub assets: usize,
    pub open_vulnerabilities: SeverityCounts,
    pub active_threats: usize,
    pub scans_in_progress: usize,
    pub compliance_completed: usize,
    pub compliance_total: usize,
    pub training_completed: usize,
    pub training_total: usize,
}
