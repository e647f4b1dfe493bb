//! Scans, threats, vulnerabilities and the dashboard.

use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Session;
use crate::error::{ActionResult, Created, Result, StoreResultExt};
use crate::models::{
    DashboardSummary, NewThreat, NewVulnerability, ScanType, SecurityScan, Severity, Threat,
    ThreatSeverity, ThreatStatus, ThreatType, Vulnerability,
};
use crate::observability::SecurityEvent;
use crate::store::MemoryStore;
use crate::validation::{
    validate_length, validate_optional_length, validate_range, validate_required, Validate,
    ValidatedJson, ValidatedPath, ValidationError,
};

use super::assets::non_blank;

// ============================================================================
// Scans
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RunScanRequest {
    #[serde(default)]
    scan_type: ScanType,
}

impl Validate for RunScanRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        Ok(())
    }
}

/// Records the scan as in progress. Nothing completes it automatically.
///
/// A request without a body runs a full scan.
pub(super) async fn run_scan(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    body: Option<ValidatedJson<RunScanRequest>>,
) -> Created<SecurityScan> {
    let scan_type = body
        .map(|ValidatedJson(body)| body.scan_type)
        .unwrap_or_default();
    let scan = store.start_scan(session.organization_id, scan_type);
    crate::security_event!(
        SecurityEvent::ScanStarted,
        user_id = %session.id,
        scan_id = %scan.id,
        scan_type = ?scan.scan_type,
        "Security scan started"
    );
    Created(scan)
}

pub(super) async fn list_scans(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
) -> ActionResult<Vec<SecurityScan>> {
    ActionResult::ok(store.list_scans(session.organization_id))
}

// ============================================================================
// Threats
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ReportThreatRequest {
    asset_id: Option<Uuid>,
    event_type: ThreatType,
    severity: ThreatSeverity,
    source: String,
    source_ip: Option<String>,
    description: String,
    raw_data: Option<serde_json::Value>,
}

impl Validate for ReportThreatRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_required(&self.source, "source")?;
        validate_length(&self.source, 1, 200, "source")?;
        validate_optional_length(self.source_ip.as_deref(), 45, "sourceIp")?;
        validate_required(&self.description, "description")?;
        validate_length(&self.description, 1, 5000, "description")?;
        Ok(())
    }
}

pub(super) async fn report_threat(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    ValidatedJson(body): ValidatedJson<ReportThreatRequest>,
) -> Result<Created<Threat>> {
    let threat = store
        .record_threat(
            session.organization_id,
            NewThreat {
                asset_id: body.asset_id,
                event_type: body.event_type,
                severity: body.severity,
                source: body.source.trim().to_string(),
                source_ip: non_blank(body.source_ip),
                description: body.description.trim().to_string(),
                raw_data: body.raw_data,
            },
        )
        .failed_to("report security event")?;

    crate::security_event!(
        SecurityEvent::ThreatReported,
        user_id = %session.id,
        threat_id = %threat.id,
        threat_severity = ?threat.severity,
        "Security event reported"
    );

    Ok(Created(threat))
}

pub(super) async fn list_threats(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
) -> ActionResult<Vec<Threat>> {
    ActionResult::ok(store.list_threats(session.organization_id))
}

#[derive(Debug, Deserialize)]
pub(super) struct ThreatStatusRequest {
    status: ThreatStatus,
}

impl Validate for ThreatStatusRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        Ok(())
    }
}

pub(super) async fn update_threat_status(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    ValidatedPath(threat_id): ValidatedPath<Uuid>,
    ValidatedJson(body): ValidatedJson<ThreatStatusRequest>,
) -> Result<ActionResult<Threat>> {
    let threat = store
        .update_threat_status(session.organization_id, threat_id, body.status)
        .failed_to("update threat status")?;

    crate::security_event!(
        SecurityEvent::ThreatStatusChanged,
        user_id = %session.id,
        threat_id = %threat.id,
        status = ?threat.status,
        "Threat status updated"
    );

    Ok(ActionResult::ok(threat))
}

// ============================================================================
// Vulnerabilities
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RecordVulnerabilityRequest {
    asset_id: Uuid,
    name: String,
    description: String,
    severity: Severity,
    cvss_score: Option<f32>,
    cve_id: Option<String>,
    remediation_steps: Option<String>,
}

impl Validate for RecordVulnerabilityRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_required(&self.name, "name")?;
        validate_length(&self.name, 1, 200, "name")?;
        validate_length(&self.description, 0, 5000, "description")?;
        if let Some(score) = self.cvss_score {
            validate_range(score, 0.0, 10.0, "cvssScore")?;
        }
        validate_optional_length(self.cve_id.as_deref(), 32, "cveId")?;
        validate_optional_length(self.remediation_steps.as_deref(), 5000, "remediationSteps")?;
        Ok(())
    }
}

pub(super) async fn record_vulnerability(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    ValidatedJson(body): ValidatedJson<RecordVulnerabilityRequest>,
) -> Result<Created<Vulnerability>> {
    let vulnerability = store
        .add_vulnerability(
            session.organization_id,
            NewVulnerability {
                asset_id: body.asset_id,
                name: body.name.trim().to_string(),
                description: body.description.trim().to_string(),
                severity: body.severity,
                cvss_score: body.cvss_score,
                cve_id: non_blank(body.cve_id),
                remediation_steps: non_blank(body.remediation_steps),
            },
        )
        .failed_to("record vulnerability")?;
    Ok(Created(vulnerability))
}

pub(super) async fn list_vulnerabilities(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
) -> ActionResult<Vec<Vulnerability>> {
    ActionResult::ok(store.list_vulnerabilities(session.organization_id))
}

// ============================================================================
// Dashboard
// ============================================================================

pub(super) async fn dashboard(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
) -> ActionResult<DashboardSummary> {
    ActionResult::ok(store.dashboard(session.organization_id, session.id))
}
