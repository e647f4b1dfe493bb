//! Record storage
//!
//! The auth manager talks to storage only through [`CredentialStore`], so a
//! database-backed implementation can replace [`MemoryStore`] without
//! touching session logic. Business records live in the same `MemoryStore`
//! behind one `parking_lot::RwLock`; no lock is ever held across an `.await`.

mod records;
mod seed;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Asset, ComplianceFramework, Credential, NewAccount, NewCredential, NewOrganization,
    Organization, OrganizationCompliance, Role, SecurityScan, Threat, TrainingModule,
    TrainingProgress, Vulnerability,
};

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record missing, or owned by another organization
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness violation
    #[error("{0}")]
    Conflict(String),

    /// The backing store itself failed
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam used by the auth manager.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Credential>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Credential>>;

    async fn create_organization(&self, new: NewOrganization) -> StoreResult<Organization>;

    /// Fails with [`StoreError::Conflict`] if the email is taken.
    async fn create_credential(&self, new: NewCredential) -> StoreResult<Credential>;

    /// Organization plus owner credential in one step. On a taken email
    /// nothing is written.
    async fn create_account(&self, new: NewAccount) -> StoreResult<(Organization, Credential)>;
}

/// Emails compare trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Default)]
struct Tables {
    organizations: HashMap<Uuid, Organization>,
    credentials: HashMap<Uuid, Credential>,
    /// normalized email -> credential id
    emails: HashMap<String, Uuid>,
    // insertion-ordered; listings walk them newest first
    assets: Vec<Asset>,
    vulnerabilities: Vec<Vulnerability>,
    threats: Vec<Threat>,
    scans: Vec<SecurityScan>,
    frameworks: Vec<ComplianceFramework>,
    /// (organization, requirement) -> status
    compliance: HashMap<(Uuid, Uuid), OrganizationCompliance>,
    modules: Vec<TrainingModule>,
    /// (user, module) -> progress
    training: HashMap<(Uuid, Uuid), TrainingProgress>,
}

impl Tables {
    fn insert_organization(&mut self, new: NewOrganization) -> Organization {
        let now = Utc::now();
        let organization = Organization {
            id: Uuid::new_v4(),
            name: new.name,
            industry: new.industry,
            size: new.size,
            created_at: now,
            updated_at: now,
        };
        self.organizations
            .insert(organization.id, organization.clone());
        organization
    }

    fn email_taken(&self, email: &str) -> StoreResult<()> {
        if self.emails.contains_key(email) {
            return Err(StoreError::Conflict("Email already in use".to_string()));
        }
        Ok(())
    }

    /// Caller has normalized `new.email` and checked it is free.
    fn insert_credential(&mut self, new: NewCredential) -> Credential {
        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            organization_id: new.organization_id,
            role: new.role,
            created_at: now,
            updated_at: now,
        };
        self.emails.insert(credential.email.clone(), credential.id);
        self.credentials.insert(credential.id, credential.clone());
        credential
    }
}

/// In-process store for credentials and business records.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// An empty store without reference data.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with the built-in compliance frameworks and training modules.
    pub fn with_reference_data() -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write();
            tables.frameworks = seed::frameworks();
            tables.modules = seed::training_modules();
        }
        store
    }

    /// Wrap in an `Arc` for sharing between the auth manager and handlers.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Organization a user belongs to, if the user exists.
    pub fn organization_of(&self, user_id: Uuid) -> Option<Uuid> {
        self.tables
            .read()
            .credentials
            .get(&user_id)
            .map(|c| c.organization_id)
    }

    pub fn organization(&self, id: Uuid) -> Option<Organization> {
        self.tables.read().organizations.get(&id).cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Credential>> {
        let tables = self.tables.read();
        Ok(tables
            .emails
            .get(&normalize_email(email))
            .and_then(|id| tables.credentials.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Credential>> {
        Ok(self.tables.read().credentials.get(&id).cloned())
    }

    async fn create_organization(&self, new: NewOrganization) -> StoreResult<Organization> {
        Ok(self.tables.write().insert_organization(new))
    }

    async fn create_credential(&self, mut new: NewCredential) -> StoreResult<Credential> {
        new.email = normalize_email(&new.email);
        let mut tables = self.tables.write();

        tables.email_taken(&new.email)?;
        if !tables.organizations.contains_key(&new.organization_id) {
            return Err(StoreError::NotFound("Organization"));
        }

        Ok(tables.insert_credential(new))
    }

    async fn create_account(&self, new: NewAccount) -> StoreResult<(Organization, Credential)> {
        let email = normalize_email(&new.email);
        let mut tables = self.tables.write();

        tables.email_taken(&email)?;
        let organization = tables.insert_organization(new.organization);
        let credential = tables.insert_credential(NewCredential {
            name: new.name,
            email,
            password_hash: new.password_hash,
            organization_id: organization.id,
            role: Role::Owner,
        });
        Ok((organization, credential))
    }
}
