use super::domain::{IntentRef, PaymentRecord};
use crate::workflows::enrollment::applications::domain::{ApplicationRecord, PaymentId};
use crate::workflows::enrollment::applications::repository::{
    ApplicationRepository, RepositoryError,
};

/// Storage abstraction for payment records. Implementations must enforce
/// uniqueness of the gateway intent reference; that constraint is what
/// makes duplicate confirmations collapse onto one payment.
pub trait PaymentRepository: Send + Sync {
    fn fetch(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, RepositoryError>;
    fn find_by_intent(
        &self,
        reference: &IntentRef,
    ) -> Result<Option<PaymentRecord>, RepositoryError>;
    fn list_all(&self) -> Result<Vec<PaymentRecord>, RepositoryError>;
}

/// Combined store the reconciliation engine writes through.
///
/// `commit` persists the application upsert and the payment insert as one
/// atomic unit: either both land or neither is visible. When another
/// writer already committed a payment for the same intent reference, the
/// implementation must return that winning pair untouched instead of
/// erroring, which keeps confirmation idempotent under racing retries. The
/// application side is an upsert keyed by (user, offering, kind): if a
/// concurrent create already owns that key, the commit adopts the stored
/// record's identity rather than inserting a second application. If the
/// stored record has already settled (it links a payment, or its status
/// has left the applicant-owned states), the commit must fail with
/// `Conflict` while still holding the lock, so a second succeeded intent
/// for the same offering can never attach a second payment.
pub trait ReconciliationStore: ApplicationRepository + PaymentRepository {
    fn commit(
        &self,
        application: ApplicationRecord,
        payment: PaymentRecord,
    ) -> Result<ReconciledPair, RepositoryError>;
}

/// The application/payment pair a commit settled on.
#[derive(Debug, Clone)]
pub struct ReconciledPair {
    pub application: ApplicationRecord,
    pub payment: PaymentRecord,
}
