use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::enrollment::catalog::{OfferingId, OfferingKind};
use crate::workflows::enrollment::identity::UserId;

/// Identifier wrapper for enrollment applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for payment records, carried on paid applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub String);

/// Lifecycle status of an application. Transitions only move forward along
/// `draft → pending → submitted → paid → under_review → approved | rejected`;
/// nothing ever re-enters `draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Pending,
    Submitted,
    Paid,
    UnderReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Paid => "paid",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    const fn rank(self) -> u8 {
        match self {
            ApplicationStatus::Draft => 0,
            ApplicationStatus::Pending => 1,
            ApplicationStatus::Submitted => 2,
            ApplicationStatus::Paid => 3,
            ApplicationStatus::UnderReview => 4,
            ApplicationStatus::Approved | ApplicationStatus::Rejected => 5,
        }
    }

    /// Ordinary (non-admin) transitions never move backwards.
    pub fn can_advance_to(self, next: ApplicationStatus) -> bool {
        next.rank() > self.rank()
    }

    /// Admin review moves freely among the review states but may never push
    /// an application back into the applicant-owned part of the lifecycle.
    pub const fn admin_assignable(self) -> bool {
        !matches!(self, ApplicationStatus::Draft | ApplicationStatus::Pending)
    }
}

/// Settlement state of the application fee, kept alongside `status` so the
/// listing surfaces can render payment progress without joining payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Unpaid,
    Paid,
    Failed,
    Refunded,
}

impl PaymentState {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentState::Unpaid => "unpaid",
            PaymentState::Paid => "paid",
            PaymentState::Failed => "failed",
            PaymentState::Refunded => "refunded",
        }
    }
}

/// Applicant-supplied content. Opaque to the engine beyond presence checks;
/// validation of the actual content happens upstream of this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essay: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<DocumentDescriptor>,
}

impl ApplicantFields {
    /// Additive partial merge: incoming `Some` values overwrite, `None`
    /// keeps what was saved before, and a non-empty document list replaces
    /// the stored one. A later save never silently drops earlier fields.
    pub fn merge(&mut self, incoming: ApplicantFields) {
        let ApplicantFields {
            full_name,
            email,
            phone,
            education,
            essay,
            documents,
        } = incoming;

        if full_name.is_some() {
            self.full_name = full_name;
        }
        if email.is_some() {
            self.email = email;
        }
        if phone.is_some() {
            self.phone = phone;
        }
        if education.is_some() {
            self.education = education;
        }
        if essay.is_some() {
            self.essay = essay;
        }
        if !documents.is_empty() {
            self.documents = documents;
        }
    }

    /// Minimum content a submission must carry: a name and a contact email.
    pub fn submission_ready(&self) -> bool {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false)
        };
        present(&self.full_name) && present(&self.email)
    }
}

/// Metadata for an uploaded supporting document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub name: String,
    pub storage_key: String,
}

/// Durable application record, one per (user, offering, kind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub user: UserId,
    pub offering_id: OfferingId,
    pub offering_kind: OfferingKind,
    pub status: ApplicationStatus,
    pub payment_state: PaymentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentId>,
    pub fields: ApplicantFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn new(
        id: ApplicationId,
        user: UserId,
        offering_id: OfferingId,
        offering_kind: OfferingKind,
        status: ApplicationStatus,
        fields: ApplicantFields,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user,
            offering_id,
            offering_kind,
            status,
            payment_state: PaymentState::Unpaid,
            payment: None,
            fields,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status_view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id.clone(),
            offering_id: self.offering_id.clone(),
            offering_kind: self.offering_kind.label(),
            status: self.status.label(),
            payment_state: self.payment_state.label(),
            fields: self.fields.clone(),
            admin_notes: self.admin_notes.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn summary(&self) -> ApplicationSummary {
        ApplicationSummary {
            application_id: self.id.clone(),
            user: self.user.clone(),
            offering_id: self.offering_id.clone(),
            offering_kind: self.offering_kind.label(),
            status: self.status.label(),
            payment_state: self.payment_state.label(),
            created_at: self.created_at,
        }
    }
}

/// Sanitized per-applicant representation returned from HTTP endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub offering_id: OfferingId,
    pub offering_kind: &'static str,
    pub status: &'static str,
    pub payment_state: &'static str,
    pub fields: ApplicantFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized row for the merged admin listing, tagged by offering kind.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSummary {
    pub application_id: ApplicationId,
    pub user: UserId,
    pub offering_id: OfferingId,
    pub offering_kind: &'static str,
    pub status: &'static str,
    pub payment_state: &'static str,
    pub created_at: DateTime<Utc>,
}
