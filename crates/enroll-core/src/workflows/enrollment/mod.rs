//! Enrollment application lifecycle and payment reconciliation.
//!
//! Applications move forward-only through
//! `draft → pending → submitted → paid → under_review → approved | rejected`.
//! The draft workflow owns everything up to submission, the reconciliation
//! engine owns the transition into `submitted`/`paid` once the gateway has
//! confirmed a charge, and the admin surface owns terminal decisions.

pub mod applications;
pub mod catalog;
pub mod identity;
pub mod payments;

pub use catalog::{CatalogError, CatalogStore, Offering, OfferingId, OfferingKind};
pub use identity::{AuthError, Caller, CallerRole, IdentityProvider, UserId};
