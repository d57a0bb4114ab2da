use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::IntentRef;

/// Status of a charge intent as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Succeeded,
    Failed,
}

/// The gateway's authoritative view of an intent. Amount, currency, and
/// metadata come from here during confirmation, never from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSnapshot {
    pub reference: IntentRef,
    pub status: IntentStatus,
    pub amount: u32,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

/// Outbound seam to the external payment processor.
///
/// The gateway is an untrusted oracle: a client-asserted success is never
/// enough, the engine re-fetches the intent before reconciling.
pub trait PaymentGateway: Send + Sync {
    fn open_intent(
        &self,
        amount: u32,
        currency: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<IntentRef, GatewayError>;

    fn fetch_intent(&self, reference: &IntentRef) -> Result<Option<IntentSnapshot>, GatewayError>;
}

/// Gateway transport failure.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}
