//! Application records, the draft workflow, and the admin review surface.

pub mod admin;
pub mod domain;
pub mod drafts;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use admin::{AdminListFilter, AdminReview, AdminReviewError};
pub use domain::{
    ApplicantFields, ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSummary,
    ApplicationView, DocumentDescriptor, PaymentId, PaymentState,
};
pub use drafts::{ApplicationPartition, DraftWorkflow, DraftWorkflowError};
pub use repository::{ApplicationRepository, RepositoryError};
pub use router::{admin_router, application_router, AdminRouterState, DraftRouterState};
