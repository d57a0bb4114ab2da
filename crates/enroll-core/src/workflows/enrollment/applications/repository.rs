use super::domain::{ApplicationId, ApplicationRecord};
use crate::workflows::enrollment::catalog::{OfferingId, OfferingKind};
use crate::workflows::enrollment::identity::UserId;

/// Storage abstraction for application records.
///
/// Implementations must enforce two unique constraints: the application id,
/// and the (user, offering, kind) key. The second is what serializes the
/// "does one already exist" check against concurrent creates: `insert`
/// fails with `Conflict` and the caller retries as an update.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn find_for_offering(
        &self,
        user: &UserId,
        offering: &OfferingId,
        kind: OfferingKind,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn list_for_user(&self, user: &UserId) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn list_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    /// Hard delete. Only the draft workflow calls this, and only for drafts.
    fn remove(&self, id: &ApplicationId) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
