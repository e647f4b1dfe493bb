//! Compliance handlers.

use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Session;
use crate::error::{ActionResult, Result, StoreResultExt};
use crate::models::{ComplianceEntry, ComplianceFramework, OrganizationCompliance, ProgressStatus};
use crate::observability::SecurityEvent;
use crate::store::MemoryStore;
use crate::validation::{validate_optional_length, Validate, ValidatedJson, ValidationError};

pub(super) async fn frameworks(
    State(store): State<Arc<MemoryStore>>,
) -> ActionResult<Vec<ComplianceFramework>> {
    ActionResult::ok(store.frameworks())
}

pub(super) async fn status(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
) -> ActionResult<Vec<ComplianceEntry>> {
    ActionResult::ok(store.organization_compliance(session.organization_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateStatusRequest {
    requirement_id: Uuid,
    status: ProgressStatus,
    notes: Option<String>,
}

impl Validate for UpdateStatusRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_optional_length(self.notes.as_deref(), 5000, "notes")
    }
}

pub(super) async fn update_status(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    ValidatedJson(body): ValidatedJson<UpdateStatusRequest>,
) -> Result<ActionResult<OrganizationCompliance>> {
    let record = store
        .upsert_compliance(
            session.organization_id,
            body.requirement_id,
            body.status,
            body.notes,
        )
        .failed_to("update compliance status")?;

    crate::security_event!(
        SecurityEvent::ComplianceUpdated,
        user_id = %session.id,
        requirement_id = %record.requirement_id,
        status = ?record.status,
        "Compliance status updated"
    );

    Ok(ActionResult::ok(record))
}

/// Where a generated report can be fetched, plus the headline numbers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ComplianceReport {
    report_url: String,
    generated_at: DateTime<Utc>,
    total_requirements: usize,
    completed: usize,
    in_progress: usize,
    not_started: usize,
}

pub(super) async fn report(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
) -> ActionResult<ComplianceReport> {
    let total_requirements = store
        .frameworks()
        .iter()
        .map(|f| f.requirements.len())
        .sum::<usize>();

    let entries = store.organization_compliance(session.organization_id);
    let count = |status: ProgressStatus| {
        entries
            .iter()
            .filter(|e| e.status.status == status)
            .count()
    };
    let completed = count(ProgressStatus::Completed);
    let in_progress = count(ProgressStatus::InProgress);

    ActionResult::ok(ComplianceReport {
        report_url: format!("/api/reports/compliance/{}", session.organization_id),
        generated_at: Utc::now(),
        total_requirements,
        completed,
        in_progress,
        // requirements never touched count as not started
        not_started: total_requirements.saturating_sub(completed + in_progress),
    })
}
