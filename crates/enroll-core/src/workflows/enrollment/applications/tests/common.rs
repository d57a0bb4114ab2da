use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::enrollment::applications::admin::AdminReview;
use crate::workflows::enrollment::applications::domain::{
    ApplicantFields, ApplicationId, ApplicationRecord, DocumentDescriptor,
};
use crate::workflows::enrollment::applications::drafts::DraftWorkflow;
use crate::workflows::enrollment::applications::repository::{
    ApplicationRepository, RepositoryError,
};
use crate::workflows::enrollment::catalog::{
    CatalogError, CatalogStore, Offering, OfferingId, OfferingKind,
};
use crate::workflows::enrollment::identity::{
    AuthError, Caller, CallerRole, IdentityProvider, UserId,
};

pub(super) fn applicant() -> UserId {
    UserId("u-applicant".to_string())
}

pub(super) fn course_id() -> OfferingId {
    OfferingId("course-rust-101".to_string())
}

pub(super) fn scholarship_id() -> OfferingId {
    OfferingId("sch-stem-merit".to_string())
}

pub(super) fn full_fields() -> ApplicantFields {
    ApplicantFields {
        full_name: Some("Asha Verma".to_string()),
        email: Some("asha@example.edu".to_string()),
        phone: Some("+1-515-555-0100".to_string()),
        education: Some("BSc Physics, 2024".to_string()),
        essay: Some("Why I want to study systems programming.".to_string()),
        documents: vec![DocumentDescriptor {
            name: "Transcript".to_string(),
            storage_key: "docs/u-applicant/transcript.pdf".to_string(),
        }],
    }
}

pub(super) fn partial_fields() -> ApplicantFields {
    ApplicantFields {
        full_name: Some("Asha Verma".to_string()),
        ..ApplicantFields::default()
    }
}

/// In-memory repository enforcing both unique constraints the trait demands.
#[derive(Default)]
pub(super) struct MemoryRepository {
    inner: Mutex<MemoryRepositoryInner>,
}

#[derive(Default)]
struct MemoryRepositoryInner {
    records: HashMap<ApplicationId, ApplicationRecord>,
    by_key: HashMap<(String, String, OfferingKind), ApplicationId>,
}

fn offering_key(record: &ApplicationRecord) -> (String, String, OfferingKind) {
    (
        record.user.0.clone(),
        record.offering_id.0.clone(),
        record.offering_kind,
    )
}

impl ApplicationRepository for MemoryRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut inner = self.inner.lock().expect("repository mutex poisoned");
        let key = offering_key(&record);
        if inner.records.contains_key(&record.id) || inner.by_key.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        inner.by_key.insert(key, record.id.clone());
        inner.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().expect("repository mutex poisoned");
        if !inner.records.contains_key(&record.id) {
            return Err(RepositoryError::NotFound);
        }
        inner.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("repository mutex poisoned");
        Ok(inner.records.get(id).cloned())
    }

    fn find_for_offering(
        &self,
        user: &UserId,
        offering: &OfferingId,
        kind: OfferingKind,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("repository mutex poisoned");
        let key = (user.0.clone(), offering.0.clone(), kind);
        Ok(inner
            .by_key
            .get(&key)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    fn list_for_user(&self, user: &UserId) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("repository mutex poisoned");
        Ok(inner
            .records
            .values()
            .filter(|record| &record.user == user)
            .cloned()
            .collect())
    }

    fn list_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("repository mutex poisoned");
        Ok(inner.records.values().cloned().collect())
    }

    fn remove(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().expect("repository mutex poisoned");
        let record = inner.records.remove(id).ok_or(RepositoryError::NotFound)?;
        inner.by_key.remove(&offering_key(&record));
        Ok(())
    }
}

/// Repository that refuses every call, for exercising the 503 branches.
pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }

    fn update(&self, _record: ApplicationRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }

    fn find_for_offering(
        &self,
        _user: &UserId,
        _offering: &OfferingId,
        _kind: OfferingKind,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }

    fn list_for_user(&self, _user: &UserId) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }

    fn list_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }

    fn remove(&self, _id: &ApplicationId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }
}

/// Wraps [`MemoryRepository`] and hides an existing record from the first
/// `find_for_offering` call, reproducing the window where two writers both
/// observe "none exists" before one insert wins.
pub(super) struct RacingRepository {
    pub(super) inner: MemoryRepository,
    hide_first_find: std::sync::atomic::AtomicBool,
}

impl RacingRepository {
    pub(super) fn new(inner: MemoryRepository) -> Self {
        Self {
            inner,
            hide_first_find: std::sync::atomic::AtomicBool::new(true),
        }
    }
}

impl ApplicationRepository for RacingRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        self.inner.update(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn find_for_offering(
        &self,
        user: &UserId,
        offering: &OfferingId,
        kind: OfferingKind,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        if self
            .hide_first_find
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Ok(None);
        }
        self.inner.find_for_offering(user, offering, kind)
    }

    fn list_for_user(&self, user: &UserId) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.list_for_user(user)
    }

    fn list_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.list_all()
    }

    fn remove(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        self.inner.remove(id)
    }
}

/// Catalog preloaded with one course and one scholarship.
pub(super) struct FixedCatalog;

impl CatalogStore for FixedCatalog {
    fn offering(
        &self,
        id: &OfferingId,
        kind: OfferingKind,
    ) -> Result<Option<Offering>, CatalogError> {
        let known = match (id.0.as_str(), kind) {
            ("course-rust-101", OfferingKind::Course) => Some(5000),
            ("sch-stem-merit", OfferingKind::Scholarship) => Some(7500),
            _ => None,
        };
        Ok(known.map(|fee_amount| Offering {
            id: id.clone(),
            kind,
            fee_amount,
            fee_currency: "USD".to_string(),
        }))
    }
}

/// Token scheme for tests: `user-<id>` authenticates as that applicant and
/// `admin-token` carries the admin role.
pub(super) struct TestIdentity;

impl IdentityProvider for TestIdentity {
    fn authenticate(&self, token: &str) -> Result<Caller, AuthError> {
        if token == "admin-token" {
            return Ok(Caller {
                user: UserId("u-admin".to_string()),
                role: CallerRole::Admin,
            });
        }
        token
            .strip_prefix("user-")
            .map(|id| Caller {
                user: UserId(format!("u-{id}")),
                role: CallerRole::Applicant,
            })
            .ok_or(AuthError::Unauthenticated)
    }
}

pub(super) fn build_workflow() -> (
    Arc<DraftWorkflow<MemoryRepository, FixedCatalog>>,
    Arc<MemoryRepository>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let workflow = Arc::new(DraftWorkflow::new(repository.clone(), Arc::new(FixedCatalog)));
    (workflow, repository)
}

pub(super) fn build_review(repository: Arc<MemoryRepository>) -> AdminReview<MemoryRepository> {
    AdminReview::new(repository)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
