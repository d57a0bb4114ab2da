use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    ApplicantFields, ApplicationId, ApplicationRecord, ApplicationStatus,
};
use super::repository::{ApplicationRepository, RepositoryError};
use crate::workflows::enrollment::catalog::{CatalogError, CatalogStore, OfferingId, OfferingKind};
use crate::workflows::enrollment::identity::UserId;

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

/// Owns the applicant-facing lifecycle up to submission: draft upsert,
/// explicit submit, draft deletion, and the per-user listing.
pub struct DraftWorkflow<R, C> {
    repository: Arc<R>,
    catalog: Arc<C>,
}

/// A user's applications partitioned by whether they are still editable.
#[derive(Debug)]
pub struct ApplicationPartition {
    pub submitted: Vec<ApplicationRecord>,
    pub drafts: Vec<ApplicationRecord>,
}

impl<R, C> DraftWorkflow<R, C>
where
    R: ApplicationRepository + 'static,
    C: CatalogStore + 'static,
{
    pub fn new(repository: Arc<R>, catalog: Arc<C>) -> Self {
        Self {
            repository,
            catalog,
        }
    }

    /// Create or update the caller's application for an offering.
    ///
    /// Exactly one application may exist per (user, offering, kind). A lost
    /// insert race surfaces as a repository conflict and is retried once as
    /// an update against the winning record.
    pub fn save_draft(
        &self,
        user: &UserId,
        offering_id: &OfferingId,
        kind: OfferingKind,
        fields: ApplicantFields,
        submit: bool,
    ) -> Result<ApplicationRecord, DraftWorkflowError> {
        self.catalog
            .offering(offering_id, kind)?
            .ok_or(DraftWorkflowError::OfferingNotFound)?;

        match self.repository.find_for_offering(user, offering_id, kind)? {
            Some(existing) => self.update_existing(existing, fields, submit),
            None => {
                if submit && !fields.submission_ready() {
                    return Err(DraftWorkflowError::MissingSubmissionFields);
                }

                let status = if submit {
                    ApplicationStatus::Pending
                } else {
                    ApplicationStatus::Draft
                };
                let record = ApplicationRecord::new(
                    next_application_id(),
                    user.clone(),
                    offering_id.clone(),
                    kind,
                    status,
                    fields.clone(),
                    Utc::now(),
                );

                match self.repository.insert(record) {
                    Ok(stored) => {
                        info!(
                            application = %stored.id.0,
                            offering = %offering_id.0,
                            status = stored.status.label(),
                            "application saved"
                        );
                        Ok(stored)
                    }
                    // Lost the create race: the winner owns the key now.
                    Err(RepositoryError::Conflict) => {
                        let winner = self
                            .repository
                            .find_for_offering(user, offering_id, kind)?
                            .ok_or(RepositoryError::Unavailable(
                                "conflicting application vanished".to_string(),
                            ))?;
                        self.update_existing(winner, fields, submit)
                    }
                    Err(other) => Err(other.into()),
                }
            }
        }
    }

    fn update_existing(
        &self,
        mut existing: ApplicationRecord,
        fields: ApplicantFields,
        submit: bool,
    ) -> Result<ApplicationRecord, DraftWorkflowError> {
        if existing.status != ApplicationStatus::Draft {
            return Err(DraftWorkflowError::AlreadyApplied);
        }

        existing.fields.merge(fields);
        if submit {
            if !existing.fields.submission_ready() {
                return Err(DraftWorkflowError::MissingSubmissionFields);
            }
            existing.status = ApplicationStatus::Pending;
        }
        existing.updated_at = Utc::now();

        self.repository.update(existing.clone())?;
        Ok(existing)
    }

    /// Promote a draft to `pending`.
    pub fn submit_draft(
        &self,
        user: &UserId,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, DraftWorkflowError> {
        let mut record = self.owned(user, application_id)?;

        if record.status != ApplicationStatus::Draft {
            return Err(DraftWorkflowError::NotADraft {
                status: record.status.label(),
            });
        }

        record.status = ApplicationStatus::Pending;
        record.updated_at = Utc::now();
        self.repository.update(record.clone())?;

        info!(application = %record.id.0, "draft submitted");
        Ok(record)
    }

    /// Hard-delete a draft. Applications that have left `draft` are durable.
    pub fn delete_draft(
        &self,
        user: &UserId,
        application_id: &ApplicationId,
    ) -> Result<(), DraftWorkflowError> {
        let record = self.owned(user, application_id)?;

        if record.status != ApplicationStatus::Draft {
            return Err(DraftWorkflowError::NotADraft {
                status: record.status.label(),
            });
        }

        self.repository.remove(&record.id)?;
        info!(application = %record.id.0, "draft deleted");
        Ok(())
    }

    /// All of the caller's applications, split into submitted and drafts,
    /// newest first within each partition.
    pub fn list_applications(
        &self,
        user: &UserId,
    ) -> Result<ApplicationPartition, DraftWorkflowError> {
        let mut records = self.repository.list_for_user(user)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let (drafts, submitted) = records
            .into_iter()
            .partition(|record| record.status == ApplicationStatus::Draft);

        Ok(ApplicationPartition { submitted, drafts })
    }

    /// Fetch by id, hiding other users' applications behind `NotFound`.
    fn owned(
        &self,
        user: &UserId,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, DraftWorkflowError> {
        let record = self
            .repository
            .fetch(application_id)?
            .filter(|record| &record.user == user)
            .ok_or(DraftWorkflowError::NotFound)?;
        Ok(record)
    }
}

/// Error raised by the draft workflow.
#[derive(Debug, thiserror::Error)]
pub enum DraftWorkflowError {
    #[error("offering not found")]
    OfferingNotFound,
    #[error("application not found")]
    NotFound,
    #[error("an application already exists for this offering")]
    AlreadyApplied,
    #[error("submission requires applicant name and contact email")]
    MissingSubmissionFields,
    #[error("only draft applications may be changed here (status is {status})")]
    NotADraft { status: &'static str },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
