use serde::{Deserialize, Serialize};

/// Identifier wrapper for catalog offerings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferingId(pub String);

/// The two application targets sharing one lifecycle vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingKind {
    Course,
    Scholarship,
}

impl OfferingKind {
    pub const fn label(self) -> &'static str {
        match self {
            OfferingKind::Course => "course",
            OfferingKind::Scholarship => "scholarship",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "course" => Some(OfferingKind::Course),
            "scholarship" => Some(OfferingKind::Scholarship),
            _ => None,
        }
    }
}

/// Catalog snapshot of an offering, read-only to this engine. The fee is the
/// authoritative charge amount in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub id: OfferingId,
    pub kind: OfferingKind,
    pub fee_amount: u32,
    pub fee_currency: String,
}

/// Read-only lookup against the course/scholarship catalog.
pub trait CatalogStore: Send + Sync {
    fn offering(
        &self,
        id: &OfferingId,
        kind: OfferingKind,
    ) -> Result<Option<Offering>, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}
