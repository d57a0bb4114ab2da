//! Charge intents, the payment gateway seam, and the reconciliation engine.

pub mod domain;
pub mod gateway;
pub mod reconcile;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use domain::{IntentMetadata, IntentRef, PaymentRecord, PaymentStatus};
pub use gateway::{GatewayError, IntentSnapshot, IntentStatus, PaymentGateway};
pub use reconcile::{
    ChargeIntent, ReconciliationEngine, ReconciliationError, ReconciliationReceipt,
};
pub use repository::{PaymentRepository, ReconciledPair, ReconciliationStore};
pub use router::{payment_router, PaymentRouterState};
