//! Walks one proposal through its lifecycle against an on-disk sled database.
//!
//! `PROPOSALS__STORAGE__PATH` and `PROPOSALS__LOGGING__JSON` override the
//! defaults, as does a `proposals.toml` in the working directory.

use proposal_lifecycle::{
    ProposalStatus,
    config::AppConfig,
    service::{CreateProposalInput, ProposalService, SendProposalInput, UpdateStatusInput},
    telemetry,
};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    telemetry::init_tracing(&config.logging)?;

    let db = config.storage.open()?;
    // start from an empty database on every run
    for name in db.tree_names() {
        if &*name != b"__sled__default" {
            db.drop_tree(&name)?;
        }
    }
    let service = ProposalService::open(db)?;

    let customer = service.register_customer("Égís Engenharia", Some("EGIS"))?;
    let created = service.create_proposal(CreateProposalInput {
        customer_id: customer.id.clone(),
        year: 2026,
        invitation_code: None,
        project_name: "Hospital Regional".into(),
        scope_description: "Modelagem BIM de arquitetura".into(),
        due_date: None,
        estimated_value_cents: Some(12_500_000),
        created_by: "demo".into(),
    })?;
    let proposal = created.proposal;

    service.update_status(UpdateStatusInput {
        proposal_id: proposal.id.clone(),
        status: ProposalStatus::EmElaboracao,
        outcome_reason: None,
        final_value_cents: None,
        changed_by: "demo".into(),
    })?;
    service.send_proposal(SendProposalInput {
        proposal_id: proposal.id.clone(),
        file_name: format!("{}_R0.docx", proposal.code),
        sent_by: "demo".into(),
    })?;

    let started = service.start_revision_cycle(&proposal.id, "demo")?;
    let restored = service.cancel_revision_cycle(&proposal.id, "demo")?;
    println!(
        "{} opened cycle {} and is back to {}",
        restored.code, started.cycle_id, restored.status
    );

    for entry in service.activity(&proposal.id)? {
        println!("{:?}", entry.action);
    }

    service.store().flush()?;
    Ok(())
}
