use std::sync::Arc;

use clap::Args;

use crate::infra::{InMemoryEnrollmentStore, InMemoryGateway, StaticCatalog};
use enroll_core::error::AppError;
use enroll_core::workflows::enrollment::applications::domain::ApplicantFields;
use enroll_core::workflows::enrollment::applications::{
    AdminListFilter, AdminReview, ApplicationStatus, DraftWorkflow,
};
use enroll_core::workflows::enrollment::catalog::{OfferingId, OfferingKind};
use enroll_core::workflows::enrollment::identity::UserId;
use enroll_core::workflows::enrollment::payments::ReconciliationEngine;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Applicant identifier to run the walkthrough as
    #[arg(long, default_value = "demo")]
    pub(crate) applicant: String,
    /// Skip the duplicate-confirmation replay at the end
    #[arg(long)]
    pub(crate) skip_replay: bool,
}

/// End-to-end walkthrough: draft, submit, charge, confirm, replay the
/// confirmation, then apply an admin decision.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryEnrollmentStore::default());
    let gateway = Arc::new(InMemoryGateway::default());
    let catalog = Arc::new(StaticCatalog::default());

    let drafts = DraftWorkflow::new(store.clone(), catalog.clone());
    let engine = ReconciliationEngine::new(store.clone(), gateway.clone(), catalog);
    let review = AdminReview::new(store);

    let user = UserId(format!("u-{}", args.applicant));
    let course = OfferingId("course-rust-101".to_string());
    let scholarship = OfferingId("sch-stem-merit".to_string());

    println!("Enrollment lifecycle demo (user {})", user.0);

    println!("\n1. Draft and submit a course application");
    let fields = ApplicantFields {
        full_name: Some("Demo Applicant".to_string()),
        email: Some("demo@example.edu".to_string()),
        education: Some("BSc, 2025".to_string()),
        ..ApplicantFields::default()
    };
    let draft = match drafts.save_draft(&user, &course, OfferingKind::Course, fields.clone(), false)
    {
        Ok(record) => record,
        Err(err) => {
            println!("  Draft rejected: {err}");
            return Ok(());
        }
    };
    println!("  Saved {} -> status {}", draft.id.0, draft.status.label());

    let submitted = match drafts.submit_draft(&user, &draft.id) {
        Ok(record) => record,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "  Submitted {} -> status {}",
        submitted.id.0,
        submitted.status.label()
    );

    println!("\n2. Pay-first flow for a scholarship");
    let intent = match engine.initiate_charge(&user, &scholarship, OfferingKind::Scholarship) {
        Ok(intent) => intent,
        Err(err) => {
            println!("  Charge rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "  Opened intent {} for {} {} (minor units)",
        intent.gateway_intent.0, intent.amount, intent.currency
    );

    // Stand in for the processor capturing the charge.
    gateway.mark_succeeded(&intent.gateway_intent);
    println!("  Gateway reports the intent as succeeded");

    let receipt = match engine.confirm_payment(&user, &intent.gateway_intent, fields) {
        Ok(receipt) => receipt,
        Err(err) => {
            println!("  Confirmation rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "  Reconciled application {} with payment {}",
        receipt.application_id.0, receipt.payment_id.0
    );

    if !args.skip_replay {
        println!("\n3. Replay the confirmation (client retry)");
        match engine.confirm_payment(&user, &intent.gateway_intent, ApplicantFields::default()) {
            Ok(replayed) => println!(
                "  Same receipt returned: application {} / payment {} ({})",
                replayed.application_id.0,
                replayed.payment_id.0,
                if replayed == receipt {
                    "idempotent"
                } else {
                    "MISMATCH"
                }
            ),
            Err(err) => println!("  Replay rejected: {err}"),
        }
    }

    println!("\n4. Admin review");
    match review.update_status(
        &receipt.application_id,
        Some(ApplicationStatus::Approved),
        Some("Fee verified against the gateway record.".to_string()),
    ) {
        Ok(record) => {
            println!(
                "  {} -> status {} (notes: {})",
                record.id.0,
                record.status.label(),
                record.admin_notes.as_deref().unwrap_or("-")
            );
            match serde_json::to_string_pretty(&record.status_view()) {
                Ok(json) => println!("  Applicant status payload:\n{json}"),
                Err(err) => println!("  Applicant status payload unavailable: {err}"),
            }
        }
        Err(err) => println!("  Review rejected: {err}"),
    }

    match review.list_applications(AdminListFilter::default()) {
        Ok(rows) => {
            println!("  Admin listing ({} rows):", rows.len());
            for row in rows {
                println!(
                    "    - {} [{}] {} / payment {}",
                    row.application_id.0, row.offering_kind, row.status, row.payment_state
                );
            }
        }
        Err(err) => println!("  Listing unavailable: {err}"),
    }

    Ok(())
}
