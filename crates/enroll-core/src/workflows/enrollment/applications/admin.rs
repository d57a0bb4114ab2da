use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSummary,
};
use super::repository::{ApplicationRepository, RepositoryError};

/// Privileged review surface: status decisions and note-taking on any
/// application that has left the applicant-owned part of the lifecycle.
pub struct AdminReview<R> {
    repository: Arc<R>,
}

/// Optional narrowing of the admin listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminListFilter {
    pub status: Option<ApplicationStatus>,
}

impl<R> AdminReview<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Apply a status decision and/or notes to one application.
    ///
    /// Admins move freely among the review states, but may never push an
    /// application back to `draft` or `pending`, and drafts themselves are
    /// invisible at this layer.
    pub fn update_status(
        &self,
        application_id: &ApplicationId,
        new_status: Option<ApplicationStatus>,
        admin_notes: Option<String>,
    ) -> Result<ApplicationRecord, AdminReviewError> {
        let mut record = self
            .repository
            .fetch(application_id)?
            .filter(|record| record.status != ApplicationStatus::Draft)
            .ok_or(AdminReviewError::NotFound)?;

        if let Some(status) = new_status {
            if !status.admin_assignable() {
                return Err(AdminReviewError::InvalidTransition {
                    from: record.status.label(),
                    to: status.label(),
                });
            }
            record.status = status;
        }
        if let Some(notes) = admin_notes {
            record.admin_notes = Some(notes);
        }
        record.updated_at = Utc::now();

        self.repository.update(record.clone())?;
        info!(
            application = %record.id.0,
            status = record.status.label(),
            "admin review applied"
        );
        Ok(record)
    }

    /// Merged listing across both offering kinds, drafts excluded, newest
    /// first, each row tagged by kind.
    pub fn list_applications(
        &self,
        filter: AdminListFilter,
    ) -> Result<Vec<ApplicationSummary>, AdminReviewError> {
        let mut records: Vec<ApplicationRecord> = self
            .repository
            .list_all()?
            .into_iter()
            .filter(|record| record.status != ApplicationStatus::Draft)
            .filter(|record| match filter.status {
                Some(status) => record.status == status,
                None => true,
            })
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.iter().map(ApplicationRecord::summary).collect())
    }
}

/// Error raised by the admin review surface.
#[derive(Debug, thiserror::Error)]
pub enum AdminReviewError {
    #[error("application not found")]
    NotFound,
    #[error("cannot set status from {from} back to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
