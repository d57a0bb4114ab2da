//! Application lifecycle and payment reconciliation engine for enrollment
//! services.
//!
//! The `workflows::enrollment` module owns the core: the draft workflow that
//! creates and submits applications, the reconciliation engine that converts
//! gateway-confirmed charges into durable application and payment records
//! exactly once, and the admin review surface. Catalog lookups, gateway calls,
//! and caller authentication are traits implemented by the hosting service.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
