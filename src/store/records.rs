//! Organization-scoped business records.
//!
//! Every method takes the caller's organization id. A record owned by a
//! different organization is reported as [`StoreError::NotFound`], the same
//! as one that does not exist.

use chrono::Utc;
use uuid::Uuid;

use super::{MemoryStore, StoreError, StoreResult};
use crate::models::{
    Asset, ComplianceEntry, ComplianceFramework, DashboardSummary, NewAsset, NewThreat,
    NewVulnerability, OrganizationCompliance, ProgressStatus, ScanStatus, ScanType,
    SecurityScan, Threat, ThreatStatus, TrainingEntry, TrainingModule, TrainingProgress,
    Vulnerability, VulnerabilityStatus,
};

impl MemoryStore {
    // ========================================================================
    // Assets
    // ========================================================================

    pub fn add_asset(&self, organization_id: Uuid, new: NewAsset) -> Asset {
        let now = Utc::now();
        let asset = Asset {
            id: Uuid::new_v4(),
            organization_id,
            name: new.name,
            asset_type: new.asset_type,
            ip_address: new.ip_address,
            mac_address: new.mac_address,
            operating_system: new.operating_system,
            last_seen: now,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().assets.push(asset.clone());
        asset
    }

    /// Organization assets, newest first.
    pub fn list_assets(&self, organization_id: Uuid) -> Vec<Asset> {
        self.tables
            .read()
            .assets
            .iter()
            .rev()
            .filter(|a| a.organization_id == organization_id)
            .cloned()
            .collect()
    }

    /// Delete an asset and the vulnerabilities recorded against it.
    pub fn delete_asset(&self, organization_id: Uuid, asset_id: Uuid) -> StoreResult<Asset> {
        let mut tables = self.tables.write();
        let index = tables
            .assets
            .iter()
            .position(|a| a.id == asset_id && a.organization_id == organization_id)
            .ok_or(StoreError::NotFound("Asset"))?;

        let asset = tables.assets.remove(index);
        tables.vulnerabilities.retain(|v| v.asset_id != asset_id);
        Ok(asset)
    }

    // ========================================================================
    // Vulnerabilities
    // ========================================================================

    /// Record a finding against one of the organization's assets.
    pub fn add_vulnerability(
        &self,
        organization_id: Uuid,
        new: NewVulnerability,
    ) -> StoreResult<Vulnerability> {
        let mut tables = self.tables.write();
        let owns_asset = tables
            .assets
            .iter()
            .any(|a| a.id == new.asset_id && a.organization_id == organization_id);
        if !owns_asset {
            return Err(StoreError::NotFound("Asset"));
        }

        let vulnerability = Vulnerability {
            id: Uuid::new_v4(),
            asset_id: new.asset_id,
            organization_id,
            name: new.name,
            description: new.description,
            severity: new.severity,
            cvss_score: new.cvss_score,
            cve_id: new.cve_id,
            status: VulnerabilityStatus::Open,
            remediation_steps: new.remediation_steps,
            discovered_at: Utc::now(),
            resolved_at: None,
        };
        tables.vulnerabilities.push(vulnerability.clone());
        Ok(vulnerability)
    }

    pub fn list_vulnerabilities(&self, organization_id: Uuid) -> Vec<Vulnerability> {
        self.tables
            .read()
            .vulnerabilities
            .iter()
            .rev()
            .filter(|v| v.organization_id == organization_id)
            .cloned()
            .collect()
    }

    // ========================================================================
    // Threats
    // ========================================================================

    /// Record a security event. New threats start `Active`.
    pub fn record_threat(&self, organization_id: Uuid, new: NewThreat) -> StoreResult<Threat> {
        let mut tables = self.tables.write();
        if let Some(asset_id) = new.asset_id {
            let owns_asset = tables
                .assets
                .iter()
                .any(|a| a.id == asset_id && a.organization_id == organization_id);
            if !owns_asset {
                return Err(StoreError::NotFound("Asset"));
            }
        }

        let now = Utc::now();
        let threat = Threat {
            id: Uuid::new_v4(),
            organization_id,
            asset_id: new.asset_id,
            event_type: new.event_type,
            severity: new.severity,
            source: new.source,
            source_ip: new.source_ip,
            description: new.description,
            raw_data: new.raw_data,
            status: ThreatStatus::Active,
            timestamp: now,
            updated_at: now,
        };
        tables.threats.push(threat.clone());
        Ok(threat)
    }

    pub fn list_threats(&self, organization_id: Uuid) -> Vec<Threat> {
        self.tables
            .read()
            .threats
            .iter()
            .rev()
            .filter(|t| t.organization_id == organization_id)
            .cloned()
            .collect()
    }

    pub fn update_threat_status(
        &self,
        organization_id: Uuid,
        threat_id: Uuid,
        status: ThreatStatus,
    ) -> StoreResult<Threat> {
        let mut tables = self.tables.write();
        let threat = tables
            .threats
            .iter_mut()
            .find(|t| t.id == threat_id && t.organization_id == organization_id)
            .ok_or(StoreError::NotFound("Threat"))?;

        threat.status = status;
        threat.updated_at = Utc::now();
        Ok(threat.clone())
    }

    // ========================================================================
    // Scans
    // ========================================================================

    /// Record a scan request. Nothing completes it automatically.
    pub fn start_scan(&self, organization_id: Uuid, scan_type: ScanType) -> SecurityScan {
        let scan = SecurityScan {
            id: Uuid::new_v4(),
            organization_id,
            scan_type,
            status: ScanStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            summary: None,
        };
        self.tables.write().scans.push(scan.clone());
        scan
    }

    pub fn list_scans(&self, organization_id: Uuid) -> Vec<SecurityScan> {
        self.tables
            .read()
            .scans
            .iter()
            .rev()
            .filter(|s| s.organization_id == organization_id)
            .cloned()
            .collect()
    }

    // ========================================================================
    // Compliance
    // ========================================================================

    pub fn frameworks(&self) -> Vec<ComplianceFramework> {
        self.tables.read().frameworks.clone()
    }

    /// Create or update the organization's status on a requirement.
    ///
    /// `completed_at` is set exactly when the status is `Completed`. Notes are
    /// replaced by the submitted value, so omitting them clears them.
    pub fn upsert_compliance(
        &self,
        organization_id: Uuid,
        requirement_id: Uuid,
        status: ProgressStatus,
        notes: Option<String>,
    ) -> StoreResult<OrganizationCompliance> {
        let mut tables = self.tables.write();
        let known = tables
            .frameworks
            .iter()
            .flat_map(|f| f.requirements.iter())
            .any(|r| r.id == requirement_id);
        if !known {
            return Err(StoreError::NotFound("Requirement"));
        }

        let now = Utc::now();
        let completed_at = (status == ProgressStatus::Completed).then_some(now);
        let record = tables
            .compliance
            .entry((organization_id, requirement_id))
            .and_modify(|r| {
                r.status = status;
                r.completed_at = completed_at;
                r.notes = notes.clone();
                r.updated_at = now;
            })
            .or_insert_with(|| OrganizationCompliance {
                id: Uuid::new_v4(),
                organization_id,
                requirement_id,
                status,
                evidence: None,
                notes: notes.clone(),
                completed_at,
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    /// Organization statuses joined with requirement and framework name.
    pub fn organization_compliance(&self, organization_id: Uuid) -> Vec<ComplianceEntry> {
        let tables = self.tables.read();
        tables
            .frameworks
            .iter()
            .flat_map(|f| f.requirements.iter().map(move |r| (f, r)))
            .filter_map(|(framework, requirement)| {
                tables
                    .compliance
                    .get(&(organization_id, requirement.id))
                    .map(|status| ComplianceEntry {
                        status: status.clone(),
                        requirement: requirement.clone(),
                        framework_name: framework.name.clone(),
                    })
            })
            .collect()
    }

    // ========================================================================
    // Training
    // ========================================================================

    /// Modules, newest first.
    pub fn training_modules(&self) -> Vec<TrainingModule> {
        let mut modules = self.tables.read().modules.clone();
        modules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        modules
    }

    fn module_exists(&self, module_id: Uuid) -> bool {
        self.tables.read().modules.iter().any(|m| m.id == module_id)
    }

    /// Start a module: creates progress at 0% or moves an existing record to In Progress.
    pub fn start_training(&self, user_id: Uuid, module_id: Uuid) -> StoreResult<TrainingProgress> {
        if !self.module_exists(module_id) {
            return Err(StoreError::NotFound("Training module"));
        }

        let now = Utc::now();
        let mut tables = self.tables.write();
        let record = tables
            .training
            .entry((user_id, module_id))
            .and_modify(|p| {
                p.status = ProgressStatus::InProgress;
                p.updated_at = now;
            })
            .or_insert_with(|| TrainingProgress {
                id: Uuid::new_v4(),
                user_id,
                module_id,
                status: ProgressStatus::InProgress,
                progress: 0,
                score: None,
                completed_at: None,
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    /// Update progress on a started or assigned module.
    pub fn update_training(
        &self,
        user_id: Uuid,
        module_id: Uuid,
        progress: u8,
        completed: bool,
    ) -> StoreResult<TrainingProgress> {
        let now = Utc::now();
        let mut tables = self.tables.write();
        let record = tables
            .training
            .get_mut(&(user_id, module_id))
            .ok_or(StoreError::NotFound("Training progress"))?;

        record.progress = progress.min(100);
        if completed {
            record.status = ProgressStatus::Completed;
            record.completed_at = Some(now);
        } else {
            record.status = ProgressStatus::InProgress;
            record.completed_at = None;
        }
        record.updated_at = now;
        Ok(record.clone())
    }

    /// A user's progress joined with module details.
    pub fn training_progress(&self, user_id: Uuid) -> Vec<TrainingEntry> {
        let tables = self.tables.read();
        let mut entries: Vec<TrainingEntry> = tables
            .training
            .values()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| {
                tables
                    .modules
                    .iter()
                    .find(|m| m.id == p.module_id)
                    .map(|m| TrainingEntry {
                        progress: p.clone(),
                        module: m.clone(),
                    })
            })
            .collect();
        entries.sort_by(|a, b| b.module.created_at.cmp(&a.module.created_at));
        entries
    }

    /// Create `Not Started` records for users without one. Returns how many were created.
    pub fn assign_training(&self, module_id: Uuid, user_ids: &[Uuid]) -> StoreResult<usize> {
        if !self.module_exists(module_id) {
            return Err(StoreError::NotFound("Training module"));
        }

        let now = Utc::now();
        let mut tables = self.tables.write();
        let mut created = 0;
        for &user_id in user_ids {
            if tables.training.contains_key(&(user_id, module_id)) {
                continue;
            }
            tables.training.insert(
                (user_id, module_id),
                TrainingProgress {
                    id: Uuid::new_v4(),
                    user_id,
                    module_id,
                    status: ProgressStatus::NotStarted,
                    progress: 0,
                    score: None,
                    completed_at: None,
                    created_at: now,
                    updated_at: now,
                },
            );
            created += 1;
        }
        Ok(created)
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    pub fn dashboard(&self, organization_id: Uuid, user_id: Uuid) -> DashboardSummary {
        let tables = self.tables.read();
        let mut summary = DashboardSummary {
            assets: tables
                .assets
                .iter()
                .filter(|a| a.organization_id == organization_id)
                .count(),
            ..DashboardSummary::default()
        };

        for v in tables.vulnerabilities.iter().filter(|v| {
            v.organization_id == organization_id
                && matches!(
                    v.status,
                    VulnerabilityStatus::Open | VulnerabilityStatus::InProgress
                )
        }) {
            summary.open_vulnerabilities.add(v.severity);
        }

        summary.active_threats = tables
            .threats
            .iter()
            .filter(|t| {
                t.organization_id == organization_id
                    && matches!(t.status, ThreatStatus::Active | ThreatStatus::Investigating)
            })
            .count();

        summary.scans_in_progress = tables
            .scans
            .iter()
            .filter(|s| s.organization_id == organization_id && s.status == ScanStatus::InProgress)
            .count();

        summary.compliance_total = tables.frameworks.iter().map(|f| f.requirements.len()).sum();
        summary.compliance_completed = tables
            .compliance
            .values()
            .filter(|c| c.organization_id == organization_id && c.status == ProgressStatus::Completed)
            .count();

        summary.training_total = tables.modules.len();
        summary.training_completed = tables
            .training
            .values()
            .filter(|p| p.user_id == user_id && p.status == ProgressStatus::Completed)
            .count();

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetType, Severity, ThreatSeverity, ThreatType};

    fn asset(name: &str) -> NewAsset {
        NewAsset {
            name: name.into(),
            asset_type: AssetType::Server,
            ip_address: Some("10.0.0.5".into()),
            mac_address: None,
            operating_system: Some("Ubuntu 22.04".into()),
        }
    }

    fn threat(asset_id: Option<Uuid>) -> NewThreat {
        NewThreat {
            asset_id,
            event_type: ThreatType::LoginAttempt,
            severity: ThreatSeverity::High,
            source: "firewall".into(),
            source_ip: Some("203.0.113.9".into()),
            description: "Repeated failed logins".into(),
            raw_data: None,
        }
    }

    fn vulnerability(asset_id: Uuid, severity: Severity) -> NewVulnerability {
        NewVulnerability {
            asset_id,
            name: "OpenSSH outdated".into(),
            description: "Server runs an unsupported OpenSSH release".into(),
            severity,
            cvss_score: Some(7.5),
            cve_id: None,
            remediation_steps: None,
        }
    }

    #[test]
    fn test_assets_are_scoped_and_newest_first() {
        let store = MemoryStore::new();
        let (org_a, org_b) = (Uuid::new_v4(), Uuid::new_v4());

        store.add_asset(org_a, asset("first"));
        store.add_asset(org_a, asset("second"));
        store.add_asset(org_b, asset("other"));

        let listed = store.list_assets(org_a);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "second");
        assert_eq!(listed[1].name, "first");
        assert_eq!(store.list_assets(org_b).len(), 1);
    }

    #[test]
    fn test_delete_asset_other_org_is_not_found() {
        let store = MemoryStore::new();
        let (org_a, org_b) = (Uuid::new_v4(), Uuid::new_v4());
        let created = store.add_asset(org_a, asset("db"));

        let err = store.delete_asset(org_b, created.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Asset")));
        assert_eq!(store.list_assets(org_a).len(), 1);

        store.delete_asset(org_a, created.id).unwrap();
        assert!(store.list_assets(org_a).is_empty());
    }

    #[test]
    fn test_delete_asset_removes_its_vulnerabilities() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        let a = store.add_asset(org, asset("a"));
        let b = store.add_asset(org, asset("b"));
        store.add_vulnerability(org, vulnerability(a.id, Severity::High)).unwrap();
        store.add_vulnerability(org, vulnerability(b.id, Severity::Low)).unwrap();

        store.delete_asset(org, a.id).unwrap();
        let remaining = store.list_vulnerabilities(org);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].asset_id, b.id);
    }

    #[test]
    fn test_vulnerability_requires_own_asset() {
        let store = MemoryStore::new();
        let (org_a, org_b) = (Uuid::new_v4(), Uuid::new_v4());
        let a = store.add_asset(org_a, asset("a"));
        assert!(store
            .add_vulnerability(org_b, vulnerability(a.id, Severity::Critical))
            .is_err());
    }

    #[test]
    fn test_threat_status_update_is_scoped() {
        let store = MemoryStore::new();
        let (org_a, org_b) = (Uuid::new_v4(), Uuid::new_v4());
        let t = store.record_threat(org_a, threat(None)).unwrap();
        assert_eq!(t.status, ThreatStatus::Active);

        assert!(store
            .update_threat_status(org_b, t.id, ThreatStatus::Resolved)
            .is_err());

        let updated = store
            .update_threat_status(org_a, t.id, ThreatStatus::Investigating)
            .unwrap();
        assert_eq!(updated.status, ThreatStatus::Investigating);
    }

    #[test]
    fn test_threat_rejects_foreign_asset() {
        let store = MemoryStore::new();
        let foreign = store.add_asset(Uuid::new_v4(), asset("x"));
        let err = store
            .record_threat(Uuid::new_v4(), threat(Some(foreign.id)))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Asset")));
    }

    #[test]
    fn test_scan_starts_in_progress() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        let scan = store.start_scan(org, ScanType::default());
        assert_eq!(scan.scan_type, ScanType::Full);
        assert_eq!(scan.status, ScanStatus::InProgress);
        assert!(scan.completed_at.is_none());
        assert_eq!(store.list_scans(org).len(), 1);
    }

    #[test]
    fn test_compliance_upsert_sets_completed_at() {
        let store = MemoryStore::with_reference_data();
        let org = Uuid::new_v4();
        let requirement = store.frameworks()[0].requirements[0].id;

        let first = store
            .upsert_compliance(org, requirement, ProgressStatus::InProgress, None)
            .unwrap();
        assert!(first.completed_at.is_none());

        let done = store
            .upsert_compliance(org, requirement, ProgressStatus::Completed, Some("signed".into()))
            .unwrap();
        assert_eq!(done.id, first.id);
        assert!(done.completed_at.is_some());
        assert_eq!(done.notes.as_deref(), Some("signed"));

        let reopened = store
            .upsert_compliance(org, requirement, ProgressStatus::InProgress, None)
            .unwrap();
        assert!(reopened.completed_at.is_none());
        // notes are whatever the latest update sent
        assert_eq!(reopened.notes, None);

        let entries = store.organization_compliance(org);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].framework_name, "GDPR");
        assert!(store.organization_compliance(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_compliance_unknown_requirement() {
        let store = MemoryStore::with_reference_data();
        let err = store
            .upsert_compliance(Uuid::new_v4(), Uuid::new_v4(), ProgressStatus::Completed, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Requirement")));
    }

    #[test]
    fn test_training_lifecycle() {
        let store = MemoryStore::with_reference_data();
        let user = Uuid::new_v4();
        let module = store.training_modules()[0].id;

        let err = store.update_training(user, module, 50, false).unwrap_err();
        assert_eq!(err.to_string(), "Training progress not found");

        let started = store.start_training(user, module).unwrap();
        assert_eq!(started.status, ProgressStatus::InProgress);
        assert_eq!(started.progress, 0);

        let halfway = store.update_training(user, module, 50, false).unwrap();
        assert_eq!(halfway.progress, 50);
        assert!(halfway.completed_at.is_none());

        let done = store.update_training(user, module, 100, true).unwrap();
        assert_eq!(done.status, ProgressStatus::Completed);
        assert!(done.completed_at.is_some());

        let entries = store.training_progress(user);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].module.id, module);
    }

    #[test]
    fn test_assign_training_skips_existing() {
        let store = MemoryStore::with_reference_data();
        let module = store.training_modules()[1].id;
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        store.start_training(u1, module).unwrap();

        let created = store.assign_training(module, &[u1, u2]).unwrap();
        assert_eq!(created, 1);
        assert_eq!(
            store.training_progress(u2)[0].progress.status,
            ProgressStatus::NotStarted
        );
        assert_eq!(
            store.training_progress(u1)[0].progress.status,
            ProgressStatus::InProgress
        );
        assert!(store.assign_training(Uuid::new_v4(), &[u1]).is_err());
    }

    #[test]
    fn test_dashboard_counts() {
        let store = MemoryStore::with_reference_data();
        let org = Uuid::new_v4();
        let user = Uuid::new_v4();
        let a = store.add_asset(org, asset("a"));
        store.add_vulnerability(org, vulnerability(a.id, Severity::Critical)).unwrap();
        store.record_threat(org, threat(Some(a.id))).unwrap();
        store.start_scan(org, ScanType::Network);
        let requirement = store.frameworks()[2].requirements[1].id;
        store
            .upsert_compliance(org, requirement, ProgressStatus::Completed, None)
            .unwrap();

        let summary = store.dashboard(org, user);
        assert_eq!(summary.assets, 1);
        assert_eq!(summary.open_vulnerabilities.critical, 1);
        assert_eq!(summary.active_threats, 1);
        assert_eq!(summary.scans_in_progress, 1);
        assert_eq!(summary.compliance_completed, 1);
        assert_eq!(summary.compliance_total, 14);
        assert_eq!(summary.training_total, 6);
        assert_eq!(summary.training_completed, 0);

        let empty = store.dashboard(Uuid::new_v4(), user);
        assert_eq!(empty.assets, 0);
        assert_eq!(empty.open_vulnerabilities.total(), 0);
    }
}
