use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::enrollment::applications::domain::{ApplicationId, PaymentId};
use crate::workflows::enrollment::catalog::{OfferingId, OfferingKind};
use crate::workflows::enrollment::identity::UserId;

/// Opaque reference to a single charge attempt at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentRef(pub String);

/// Terminal record of one captured charge, written exactly once. Refund
/// handling lives outside this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Durable payment record, one per successful charge, linked to exactly one
/// application. The gateway intent reference is unique across all payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub user: UserId,
    pub application: ApplicationId,
    pub offering_id: OfferingId,
    pub offering_kind: OfferingKind,
    pub amount: u32,
    pub currency: String,
    pub gateway_intent: IntentRef,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

const META_USER: &str = "user";
const META_OFFERING_ID: &str = "offering_id";
const META_OFFERING_KIND: &str = "offering_kind";

/// Identity of a charge as stamped onto the gateway intent at open time.
///
/// Confirmation reads this back from the gateway's own record, never from
/// the request body, so a client cannot redirect a captured charge to a
/// different offering or a different user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMetadata {
    pub user: UserId,
    pub offering_id: OfferingId,
    pub offering_kind: OfferingKind,
}

impl IntentMetadata {
    pub fn encode(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(META_USER.to_string(), self.user.0.clone());
        map.insert(META_OFFERING_ID.to_string(), self.offering_id.0.clone());
        map.insert(
            META_OFFERING_KIND.to_string(),
            self.offering_kind.label().to_string(),
        );
        map
    }

    /// Decode, reporting which key was missing or malformed.
    pub fn decode(map: &BTreeMap<String, String>) -> Result<Self, String> {
        let require = |key: &str| {
            map.get(key)
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or_else(|| format!("metadata key '{key}' missing"))
        };

        let kind_raw = require(META_OFFERING_KIND)?;
        let offering_kind = OfferingKind::parse(&kind_raw)
            .ok_or_else(|| format!("metadata key '{META_OFFERING_KIND}' malformed: {kind_raw}"))?;

        Ok(Self {
            user: UserId(require(META_USER)?),
            offering_id: OfferingId(require(META_OFFERING_ID)?),
            offering_kind,
        })
    }
}
