//! Training handlers.

use std::sync::Arc;

use axum::extract::State;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Session;
use crate::error::{ActionResult, AppError, Created, Result, StoreResultExt};
use crate::models::{Role, TrainingEntry, TrainingModule, TrainingProgress};
use crate::observability::SecurityEvent;
use crate::store::MemoryStore;
use crate::validation::{
    validate_collection_size, validate_range, Validate, ValidatedJson, ValidatedQuery,
    ValidationError,
};

/// Upper bound on users per assignment request.
const MAX_ASSIGNEES: usize = 500;

pub(super) async fn modules(
    State(store): State<Arc<MemoryStore>>,
) -> ActionResult<Vec<TrainingModule>> {
    ActionResult::ok(store.training_modules())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProgressQuery {
    user_id: Option<Uuid>,
}

/// The caller's own progress, or a colleague's from the same organization.
pub(super) async fn progress(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    ValidatedQuery(query): ValidatedQuery<ProgressQuery>,
) -> Result<ActionResult<Vec<TrainingEntry>>> {
    let user_id = query.user_id.unwrap_or(session.id);
    if user_id != session.id && store.organization_of(user_id) != Some(session.organization_id) {
        return Err(AppError::not_found("User not found"));
    }
    Ok(ActionResult::ok(store.training_progress(user_id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StartRequest {
    module_id: Uuid,
}

impl Validate for StartRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        Ok(())
    }
}

pub(super) async fn start(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    ValidatedJson(body): ValidatedJson<StartRequest>,
) -> Result<ActionResult<TrainingProgress>> {
    let record = store
        .start_training(session.id, body.module_id)
        .failed_to("start training module")?;
    Ok(ActionResult::ok(record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateProgressRequest {
    module_id: Uuid,
    progress: u8,
    #[serde(default)]
    completed: bool,
}

impl Validate for UpdateProgressRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_range(self.progress, 0, 100, "progress")
    }
}

pub(super) async fn update_progress(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    ValidatedJson(body): ValidatedJson<UpdateProgressRequest>,
) -> Result<ActionResult<TrainingProgress>> {
    let record = store
        .update_training(session.id, body.module_id, body.progress, body.completed)
        .failed_to("update training progress")?;
    Ok(ActionResult::ok(record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AssignRequest {
    module_id: Uuid,
    user_ids: Vec<Uuid>,
}

impl Validate for AssignRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_collection_size(&self.user_ids, 1, MAX_ASSIGNEES, "userIds")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Assignment {
    module_id: Uuid,
    /// Records created; users who already had one are skipped
    assigned: usize,
}

/// Owners and admins assign modules to users of their own organization.
pub(super) async fn assign(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    ValidatedJson(mut body): ValidatedJson<AssignRequest>,
) -> Result<Created<Assignment>> {
    if session.role == Role::Member {
        return Err(AppError::forbidden());
    }

    body.user_ids.sort_unstable();
    body.user_ids.dedup();
    if body
        .user_ids
        .iter()
        .any(|id| store.organization_of(*id) != Some(session.organization_id))
    {
        return Err(AppError::not_found("User not found").with_field("userIds"));
    }

    let assigned = store
        .assign_training(body.module_id, &body.user_ids)
        .failed_to("assign training")?;

    crate::security_event!(
        SecurityEvent::TrainingAssigned,
        user_id = %session.id,
        module_id = %body.module_id,
        assigned = assigned,
        "Training assigned"
    );

    Ok(Created(Assignment {
        module_id: body.module_id,
        assigned,
    }))
}
