//! Asset inventory handlers.

use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Session;
use crate::error::{ActionResult, Created, Result, StoreResultExt};
use crate::models::{Asset, AssetType, NewAsset};
use crate::observability::SecurityEvent;
use crate::store::MemoryStore;
use crate::validation::{
    validate_length, validate_optional_length, validate_required, Validate, ValidatedJson,
    ValidatedPath, ValidationError,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AddAssetRequest {
    name: String,
    #[serde(rename = "type")]
    asset_type: AssetType,
    ip_address: Option<String>,
    mac_address: Option<String>,
    operating_system: Option<String>,
}

impl Validate for AddAssetRequest {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_required(&self.name, "name")?;
        validate_length(&self.name, 1, 200, "name")?;
        validate_optional_length(self.ip_address.as_deref(), 45, "ipAddress")?;
        validate_optional_length(self.mac_address.as_deref(), 17, "macAddress")?;
        validate_optional_length(self.operating_system.as_deref(), 100, "operatingSystem")?;
        Ok(())
    }
}

/// Blank optional fields are treated as absent.
pub(super) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(super) async fn add(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    ValidatedJson(body): ValidatedJson<AddAssetRequest>,
) -> Created<Asset> {
    let asset = store.add_asset(
        session.organization_id,
        NewAsset {
            name: body.name.trim().to_string(),
            asset_type: body.asset_type,
            ip_address: non_blank(body.ip_address),
            mac_address: non_blank(body.mac_address),
            operating_system: non_blank(body.operating_system),
        },
    );
    tracing::info!(asset_id = %asset.id, organization_id = %asset.organization_id, "Asset added");
    Created(asset)
}

pub(super) async fn list(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
) -> ActionResult<Vec<Asset>> {
    ActionResult::ok(store.list_assets(session.organization_id))
}

pub(super) async fn remove(
    session: Session,
    State(store): State<Arc<MemoryStore>>,
    ValidatedPath(asset_id): ValidatedPath<Uuid>,
) -> Result<ActionResult<Asset>> {
    let asset = store
        .delete_asset(session.organization_id, asset_id)
        .failed_to("delete asset")?;

    crate::security_event!(
        SecurityEvent::AssetDeleted,
        user_id = %session.id,
        asset_id = %asset.id,
        "Asset deleted"
    );

    Ok(ActionResult::ok(asset))
}
