use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{IntentMetadata, IntentRef, PaymentRecord, PaymentStatus};
use super::gateway::{GatewayError, IntentStatus, PaymentGateway};
use super::repository::{ReconciledPair, ReconciliationStore};
use crate::workflows::enrollment::applications::domain::{
    ApplicantFields, ApplicationId, ApplicationRecord, ApplicationStatus, PaymentId, PaymentState,
};
use crate::workflows::enrollment::applications::drafts::next_application_id;
use crate::workflows::enrollment::applications::repository::RepositoryError;
use crate::workflows::enrollment::catalog::{CatalogError, CatalogStore, OfferingId, OfferingKind};
use crate::workflows::enrollment::identity::UserId;

static PAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_payment_id() -> PaymentId {
    let id = PAYMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PaymentId(format!("pay-{id:06}"))
}

/// Converts gateway-confirmed charges into durable application and payment
/// state exactly once. The gateway is consulted as the authority on amount,
/// currency, and charge identity; the client is trusted for nothing beyond
/// its own form fields.
pub struct ReconciliationEngine<S, G, C> {
    store: Arc<S>,
    gateway: Arc<G>,
    catalog: Arc<C>,
}

/// An opened charge, ready for the client to complete at the processor.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeIntent {
    pub gateway_intent: IntentRef,
    pub amount: u32,
    pub currency: String,
}

/// Outcome of a confirmed payment, stable across retries of the same intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReceipt {
    pub application_id: ApplicationId,
    pub payment_id: PaymentId,
}

impl<S, G, C> ReconciliationEngine<S, G, C>
where
    S: ReconciliationStore + 'static,
    G: PaymentGateway + 'static,
    C: CatalogStore + 'static,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, catalog: Arc<C>) -> Self {
        Self {
            store,
            gateway,
            catalog,
        }
    }

    /// Open a charge intent for an offering's fee.
    ///
    /// The caller's identity and the offering are stamped onto the intent as
    /// metadata so confirmation is self-describing. Abandoned intents expire
    /// upstream and are never reconciled.
    pub fn initiate_charge(
        &self,
        user: &UserId,
        offering_id: &OfferingId,
        kind: OfferingKind,
    ) -> Result<ChargeIntent, ReconciliationError> {
        let offering = self
            .catalog
            .offering(offering_id, kind)?
            .ok_or(ReconciliationError::OfferingNotFound)?;

        if offering.fee_amount == 0 {
            return Err(ReconciliationError::InvalidFee);
        }

        let metadata = IntentMetadata {
            user: user.clone(),
            offering_id: offering_id.clone(),
            offering_kind: kind,
        };
        let reference = self
            .gateway
            .open_intent(offering.fee_amount, &offering.fee_currency, metadata.encode())
            .map_err(ReconciliationError::from_gateway)?;

        info!(
            intent = %reference.0,
            offering = %offering_id.0,
            amount = offering.fee_amount,
            "charge intent opened"
        );

        Ok(ChargeIntent {
            gateway_intent: reference,
            amount: offering.fee_amount,
            currency: offering.fee_currency,
        })
    }

    /// Settle a charge the gateway reports as succeeded into one application
    /// and one payment record. Safe to call any number of times for the same
    /// intent reference; every call returns the same receipt.
    pub fn confirm_payment(
        &self,
        user: &UserId,
        reference: &IntentRef,
        fields: ApplicantFields,
    ) -> Result<ReconciliationReceipt, ReconciliationError> {
        // The gateway's record is the only trusted account of the charge.
        let intent = self
            .gateway
            .fetch_intent(reference)
            .map_err(ReconciliationError::from_gateway)?
            .ok_or_else(|| {
                warn!(intent = %reference.0, "confirmation for unknown intent reference");
                ReconciliationError::CorruptIntent("unknown intent reference".to_string())
            })?;

        if intent.status != IntentStatus::Succeeded {
            return Err(ReconciliationError::PaymentNotReady);
        }

        let metadata = IntentMetadata::decode(&intent.metadata).map_err(|detail| {
            warn!(intent = %reference.0, %detail, "intent metadata missing or malformed");
            ReconciliationError::CorruptIntent(detail)
        })?;
        if &metadata.user != user {
            warn!(intent = %reference.0, "intent was opened for a different user");
            return Err(ReconciliationError::CorruptIntent(
                "intent was opened for a different user".to_string(),
            ));
        }

        // Fast idempotency path: this intent already settled.
        if let Some(existing) = self.store.find_by_intent(reference)? {
            return Ok(ReconciliationReceipt {
                application_id: existing.application,
                payment_id: existing.id,
            });
        }

        let application = self.application_for(&metadata, fields)?;

        let payment = PaymentRecord {
            id: next_payment_id(),
            user: metadata.user.clone(),
            application: application.id.clone(),
            offering_id: metadata.offering_id.clone(),
            offering_kind: metadata.offering_kind,
            amount: intent.amount,
            currency: intent.currency.clone(),
            gateway_intent: reference.clone(),
            status: PaymentStatus::Completed,
            paid_at: Utc::now(),
        };

        let ReconciledPair {
            application,
            payment,
        } = match self.store.commit(application, payment) {
            Ok(pair) => pair,
            // A different intent settled this offering between the existence
            // check above and the commit taking the lock.
            Err(RepositoryError::Conflict) => return Err(ReconciliationError::AlreadyApplied),
            Err(other) => return Err(other.into()),
        };

        info!(
            application = %application.id.0,
            payment = %payment.id.0,
            intent = %reference.0,
            "payment reconciled"
        );

        Ok(ReconciliationReceipt {
            application_id: application.id,
            payment_id: payment.id,
        })
    }

    /// Reuse the caller's draft/pending application for the offering named
    /// by the intent metadata, or create one fresh (pay-first flow). Either
    /// way the result carries `submitted`/`paid` with the payment linked by
    /// the commit.
    fn application_for(
        &self,
        metadata: &IntentMetadata,
        fields: ApplicantFields,
    ) -> Result<ApplicationRecord, ReconciliationError> {
        let existing = self.store.find_for_offering(
            &metadata.user,
            &metadata.offering_id,
            metadata.offering_kind,
        )?;

        match existing {
            Some(mut record)
                if matches!(
                    record.status,
                    ApplicationStatus::Draft | ApplicationStatus::Pending
                ) =>
            {
                record.fields.merge(fields);
                record.status = ApplicationStatus::Submitted;
                record.payment_state = PaymentState::Paid;
                record.updated_at = Utc::now();
                Ok(record)
            }
            // A second captured charge for an offering that already settled
            // is surfaced, never merged; refunds are handled out of band.
            Some(_) => Err(ReconciliationError::AlreadyApplied),
            None => {
                let mut record = ApplicationRecord::new(
                    next_application_id(),
                    metadata.user.clone(),
                    metadata.offering_id.clone(),
                    metadata.offering_kind,
                    ApplicationStatus::Submitted,
                    fields,
                    Utc::now(),
                );
                record.payment_state = PaymentState::Paid;
                Ok(record)
            }
        }
    }
}

/// Error raised by the reconciliation engine.
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error("offering not found")]
    OfferingNotFound,
    #[error("offering fee must be strictly positive")]
    InvalidFee,
    #[error("the gateway has not confirmed this payment")]
    PaymentNotReady,
    #[error("intent rejected: {0}")]
    CorruptIntent(String),
    #[error("a settled application already exists for this offering")]
    AlreadyApplied,
    #[error("upstream unavailable: {0}")]
    Upstream(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ReconciliationError {
    fn from_gateway(error: GatewayError) -> Self {
        match error {
            GatewayError::Unavailable(detail) => ReconciliationError::Upstream(detail),
        }
    }
}
