use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use enroll_core::workflows::enrollment::applications::{
    ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationStatus, PaymentId,
    RepositoryError,
};
use enroll_core::workflows::enrollment::catalog::{
    CatalogError, CatalogStore, Offering, OfferingId, OfferingKind,
};
use enroll_core::workflows::enrollment::identity::{
    AuthError, Caller, CallerRole, IdentityProvider, UserId,
};
use enroll_core::workflows::enrollment::payments::{
    GatewayError, IntentRef, IntentSnapshot, IntentStatus, PaymentGateway, PaymentRecord,
    PaymentRepository, ReconciledPair, ReconciliationStore,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Single-mutex store backing both repositories. Holding every index under
/// one lock is what makes `commit` an atomic unit and the unique keys
/// race-proof.
#[derive(Default)]
pub(crate) struct InMemoryEnrollmentStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
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

impl ApplicationRepository for InMemoryEnrollmentStore {
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

impl PaymentRepository for InMemoryEnrollmentStore {
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

impl ReconciliationStore for InMemoryEnrollmentStore {
    fn commit(
        &self,
        mut application: ApplicationRecord,
        mut payment: PaymentRecord,
    ) -> Result<ReconciledPair, RepositoryError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");

        // A racing confirmation already settled this intent: hand back the
        // winning pair instead of erroring the retry.
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

        // Upsert keyed by (user, offering, kind); adopt the identity of a
        // concurrently created record rather than inserting a second one.
        // Checked under the lock: a stored record that already settled
        // belongs to a different intent and must not take a second charge.
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
            inner.application_keys.insert(key, application.id.clone());
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

/// Catalog seeded with demo offerings. Production deployments point the
/// engine at the institution's catalog service instead.
pub(crate) struct StaticCatalog {
    offerings: Vec<Offering>,
}

impl Default for StaticCatalog {
    fn default() -> Self {
        let entry = |id: &str, kind: OfferingKind, fee_amount: u32| Offering {
            id: OfferingId(id.to_string()),
            kind,
            fee_amount,
            fee_currency: "USD".to_string(),
        };
        Self {
            offerings: vec![
                entry("course-rust-101", OfferingKind::Course, 5000),
                entry("course-distributed-systems", OfferingKind::Course, 12000),
                entry("sch-stem-merit", OfferingKind::Scholarship, 7500),
            ],
        }
    }
}

impl CatalogStore for StaticCatalog {
    fn offering(
        &self,
        id: &OfferingId,
        kind: OfferingKind,
    ) -> Result<Option<Offering>, CatalogError> {
        Ok(self
            .offerings
            .iter()
            .find(|offering| &offering.id == id && offering.kind == kind)
            .cloned())
    }
}

/// In-memory stand-in for the payment processor. Opened intents start
/// `pending`; the demo (or a test) marks them succeeded, which is the state
/// a webhook or client-side confirmation would leave them in upstream.
#[derive(Default)]
pub(crate) struct InMemoryGateway {
    intents: Mutex<HashMap<String, IntentSnapshot>>,
    sequence: AtomicU64,
}

impl InMemoryGateway {
    pub(crate) fn mark_succeeded(&self, reference: &IntentRef) {
        let mut intents = self.intents.lock().expect("gateway mutex poisoned");
        if let Some(intent) = intents.get_mut(&reference.0) {
            intent.status = IntentStatus::Succeeded;
        }
    }
}

impl PaymentGateway for InMemoryGateway {
    fn open_intent(
        &self,
        amount: u32,
        currency: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<IntentRef, GatewayError> {
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
        let intents = self.intents.lock().expect("gateway mutex poisoned");
        Ok(intents.get(&reference.0).cloned())
    }
}

/// Demo identity provider: `user-<id>` bearer tokens authenticate as that
/// applicant, and the configured admin token (if any) carries the admin
/// role. Real deployments resolve tokens against the identity service.
pub(crate) struct TokenIdentity {
    admin_token: Option<String>,
}

impl TokenIdentity {
    pub(crate) fn new(admin_token: Option<String>) -> Self {
        Self { admin_token }
    }
}

impl IdentityProvider for TokenIdentity {
    fn authenticate(&self, token: &str) -> Result<Caller, AuthError> {
        if let Some(admin) = &self.admin_token {
            if token == admin {
                return Ok(Caller {
                    user: UserId("u-admin".to_string()),
                    role: CallerRole::Admin,
                });
            }
        }
        token
            .strip_prefix("user-")
            .filter(|id| !id.is_empty())
            .map(|id| Caller {
                user: UserId(format!("u-{id}")),
                role: CallerRole::Applicant,
            })
            .ok_or(AuthError::Unauthenticated)
    }
}
