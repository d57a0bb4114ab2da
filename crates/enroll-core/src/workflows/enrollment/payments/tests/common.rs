use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::enrollment::applications::domain::{
    ApplicantFields, ApplicationId, ApplicationRecord, ApplicationStatus, PaymentId,
};
use crate::workflows::enrollment::applications::repository::{
    ApplicationRepository, RepositoryError,
};
use crate::workflows::enrollment::catalog::{
    CatalogError, CatalogStore, Offering, OfferingId, OfferingKind,
};
use crate::workflows::enrollment::identity::{
    AuthError, Caller, CallerRole, IdentityProvider, UserId,
};
use crate::workflows::enrollment::payments::domain::{IntentRef, PaymentRecord};
use crate::workflows::enrollment::payments::gateway::{
    GatewayError, IntentSnapshot, IntentStatus, PaymentGateway,
};
use crate::workflows::enrollment::payments::reconcile::ReconciliationEngine;
use crate::workflows::enrollment::payments::repository::{
    PaymentRepository, ReconciledPair, ReconciliationStore,
};

pub(super) fn payer() -> UserId {
    UserId("u-payer".to_string())
}

pub(super) fn scholarship_id() -> OfferingId {
    OfferingId("sch-stem-merit".to_string())
}

pub(super) fn course_id() -> OfferingId {
    OfferingId("course-rust-101".to_string())
}

pub(super) fn confirm_fields() -> ApplicantFields {
    ApplicantFields {
        full_name: Some("Asha Verma".to_string()),
        email: Some("asha@example.edu".to_string()),
        essay: Some("Scholarship essay.".to_string()),
        ..ApplicantFields::default()
    }
}

/// Single-mutex store covering both repositories plus the atomic commit.
#[derive(Default)]
pub(super) struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    applications: HashMap<ApplicationId, ApplicationRecord>,
    application_keys: HashMap<(String, String, OfferingKind), ApplicationId>,
    payments: HashMap<PaymentId, PaymentRecord>,
    payment_intents: HashMap<String, PaymentId>,
}

fn offering_key(record: &ApplicationRecord) -> (String, String, OfferingKind) {
    (
        record.user.0.clone(),
        record.offering_id.0.clone(),
        record.offering_kind,
    )
}

impl MemoryStore {
    pub(super) fn payment_count(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").payments.len()
    }

    pub(super) fn application_count(&self) -> usize {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .applications
            .len()
    }
}

impl ApplicationRepository for MemoryStore {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let key = offering_key(&record);
        if inner.applications.contains_key(&record.id) || inner.application_keys.contains_key(&key)
        {
            return Err(RepositoryError::Conflict);
        }
        inner.application_keys.insert(key, record.id.clone());
        inner.applications.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if !inner.applications.contains_key(&record.id) {
            return Err(RepositoryError::NotFound);
        }
        inner.applications.insert(record.id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.applications.get(id).cloned())
    }

    fn find_for_offering(
        &self,
        user: &UserId,
        offering: &OfferingId,
        kind: OfferingKind,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let key = (user.0.clone(), offering.0.clone(), kind);
        Ok(inner
            .application_keys
            .get(&key)
            .and_then(|id| inner.applications.get(id))
            .cloned())
    }

    fn list_for_user(&self, user: &UserId) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .applications
            .values()
            .filter(|record| &record.user == user)
            .cloned()
            .collect())
    }

    fn list_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.applications.values().cloned().collect())
    }

    fn remove(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let record = inner
            .applications
            .remove(id)
            .ok_or(RepositoryError::NotFound)?;
        inner.application_keys.remove(&offering_key(&record));
        Ok(())
    }
}

impl PaymentRepository for MemoryStore {
    fn fetch(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.payments.get(id).cloned())
    }

    fn find_by_intent(
        &self,
        reference: &IntentRef,
    ) -> Result<Option<PaymentRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .payment_intents
            .get(&reference.0)
            .and_then(|id| inner.payments.get(id))
            .cloned())
    }

    fn list_all(&self) -> Result<Vec<PaymentRecord>, RepositoryError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.payments.values().cloned().collect())
    }
}

impl ReconciliationStore for MemoryStore {
    fn commit(
        &self,
        mut application: ApplicationRecord,
        mut payment: PaymentRecord,
    ) -> Result<ReconciledPair, RepositoryError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");

        // A racing confirmation already settled this intent.
        if let Some(existing_id) = inner.payment_intents.get(&payment.gateway_intent.0) {
            let payment = inner
                .payments
                .get(existing_id)
                .cloned()
                .ok_or(RepositoryError::NotFound)?;
            let application = inner
                .applications
                .get(&payment.application)
                .cloned()
                .ok_or(RepositoryError::NotFound)?;
            return Ok(ReconciledPair {
                application,
                payment,
            });
        }

        // Upsert by key: adopt the identity of a concurrently created
        // record, but refuse one that already settled under another intent.
        let key = offering_key(&application);
        if let Some(existing_id) = inner.application_keys.get(&key).cloned() {
            let existing = inner
                .applications
                .get(&existing_id)
                .ok_or(RepositoryError::NotFound)?;
            if existing.payment.is_some()
                || !matches!(
                    existing.status,
                    ApplicationStatus::Draft | ApplicationStatus::Pending
                )
            {
                return Err(RepositoryError::Conflict);
            }
            if existing_id != application.id {
                application.id = existing_id;
                payment.application = application.id.clone();
            }
        } else {
            inner
                .application_keys
                .insert(key, application.id.clone());
        }
        application.payment = Some(payment.id.clone());
        inner
            .applications
            .insert(application.id.clone(), application.clone());
        inner
            .payment_intents
            .insert(payment.gateway_intent.0.clone(), payment.id.clone());
        inner.payments.insert(payment.id.clone(), payment.clone());

        Ok(ReconciledPair {
            application,
            payment,
        })
    }
}

/// Store that can hide the stored application from one lookup, so a
/// confirmation races past the existence check and lands on the commit.
#[derive(Default)]
pub(super) struct RacingStore {
    inner: MemoryStore,
    pub(super) hide_next_find: AtomicBool,
}

impl RacingStore {
    pub(super) fn payment_count(&self) -> usize {
        self.inner.payment_count()
    }

    pub(super) fn application_count(&self) -> usize {
        self.inner.application_count()
    }
}

impl ApplicationRepository for RacingStore {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        ApplicationRepository::update(&self.inner, record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        ApplicationRepository::fetch(&self.inner, id)
    }

    fn find_for_offering(
        &self,
        user: &UserId,
        offering: &OfferingId,
        kind: OfferingKind,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        if self.hide_next_find.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_for_offering(user, offering, kind)
    }

    fn list_for_user(&self, user: &UserId) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.list_for_user(user)
    }

    fn list_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        ApplicationRepository::list_all(&self.inner)
    }

    fn remove(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        self.inner.remove(id)
    }
}

impl PaymentRepository for RacingStore {
    fn fetch(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, RepositoryError> {
        PaymentRepository::fetch(&self.inner, id)
    }

    fn find_by_intent(
        &self,
        reference: &IntentRef,
    ) -> Result<Option<PaymentRecord>, RepositoryError> {
        self.inner.find_by_intent(reference)
    }

    fn list_all(&self) -> Result<Vec<PaymentRecord>, RepositoryError> {
        PaymentRepository::list_all(&self.inner)
    }
}

impl ReconciliationStore for RacingStore {
    fn commit(
        &self,
        application: ApplicationRecord,
        payment: PaymentRecord,
    ) -> Result<ReconciledPair, RepositoryError> {
        self.inner.commit(application, payment)
    }
}

/// Gateway fake. Opened intents start pending; tests flip them with
/// [`MockGateway::succeed`].
#[derive(Default)]
pub(super) struct MockGateway {
    intents: Mutex<HashMap<String, IntentSnapshot>>,
    sequence: AtomicU64,
    pub(super) offline: std::sync::atomic::AtomicBool,
}

impl MockGateway {
    pub(super) fn succeed(&self, reference: &IntentRef) {
        let mut intents = self.intents.lock().expect("gateway mutex poisoned");
        if let Some(intent) = intents.get_mut(&reference.0) {
            intent.status = IntentStatus::Succeeded;
        }
    }

    pub(super) fn tamper_metadata(&self, reference: &IntentRef, key: &str, value: Option<&str>) {
        let mut intents = self.intents.lock().expect("gateway mutex poisoned");
        if let Some(intent) = intents.get_mut(&reference.0) {
            match value {
                Some(value) => {
                    intent.metadata.insert(key.to_string(), value.to_string());
                }
                None => {
                    intent.metadata.remove(key);
                }
            }
        }
    }
}

impl PaymentGateway for MockGateway {
    fn open_intent(
        &self,
        amount: u32,
        currency: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<IntentRef, GatewayError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("gateway offline".to_string()));
        }
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let reference = IntentRef(format!("pi_{id:08}"));
        let snapshot = IntentSnapshot {
            reference: reference.clone(),
            status: IntentStatus::Pending,
            amount,
            currency: currency.to_string(),
            metadata,
        };
        self.intents
            .lock()
            .expect("gateway mutex poisoned")
            .insert(reference.0.clone(), snapshot);
        Ok(reference)
    }

    fn fetch_intent(&self, reference: &IntentRef) -> Result<Option<IntentSnapshot>, GatewayError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("gateway offline".to_string()));
        }
        let intents = self.intents.lock().expect("gateway mutex poisoned");
        Ok(intents.get(&reference.0).cloned())
    }
}

/// Catalog with a paid course, a paid scholarship, and a free offering for
/// the invalid-fee branch.
pub(super) struct FixedCatalog;

impl CatalogStore for FixedCatalog {
    fn offering(
        &self,
        id: &OfferingId,
        kind: OfferingKind,
    ) -> Result<Option<Offering>, CatalogError> {
        let fee = match (id.0.as_str(), kind) {
            ("course-rust-101", OfferingKind::Course) => Some(5000),
            ("sch-stem-merit", OfferingKind::Scholarship) => Some(7500),
            ("sch-zero-fee", OfferingKind::Scholarship) => Some(0),
            _ => None,
        };
        Ok(fee.map(|fee_amount| Offering {
            id: id.clone(),
            kind,
            fee_amount,
            fee_currency: "USD".to_string(),
        }))
    }
}

pub(super) struct TestIdentity;

impl IdentityProvider for TestIdentity {
    fn authenticate(&self, token: &str) -> Result<Caller, AuthError> {
        token
            .strip_prefix("user-")
            .map(|id| Caller {
                user: UserId(format!("u-{id}")),
                role: CallerRole::Applicant,
            })
            .ok_or(AuthError::Unauthenticated)
    }
}

pub(super) type TestEngine = ReconciliationEngine<MemoryStore, MockGateway, FixedCatalog>;

pub(super) fn build_engine() -> (Arc<TestEngine>, Arc<MemoryStore>, Arc<MockGateway>) {
    let store = Arc::new(MemoryStore::default());
    let gateway = Arc::new(MockGateway::default());
    let engine = Arc::new(ReconciliationEngine::new(
        store.clone(),
        gateway.clone(),
        Arc::new(FixedCatalog),
    ));
    (engine, store, gateway)
}

pub(super) fn build_racing_engine() -> (
    Arc<ReconciliationEngine<RacingStore, MockGateway, FixedCatalog>>,
    Arc<RacingStore>,
    Arc<MockGateway>,
) {
    let store = Arc::new(RacingStore::default());
    let gateway = Arc::new(MockGateway::default());
    let engine = Arc::new(ReconciliationEngine::new(
        store.clone(),
        gateway.clone(),
        Arc::new(FixedCatalog),
    ));
    (engine, store, gateway)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
