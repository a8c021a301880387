//! Service layer API for proposal workflow operations
use crate::activity::{
    ActivityAction, ActivityEntry, RevisionSnapshot, StatusSource, find_pending_revision_cycle,
};
use crate::code::ProposalCode;
use crate::error::{ProposalError, Result, ValidationError};
use crate::proposal::{BaseFields, Customer, Proposal, ProposalRevision, StatusChange, TimeStamp};
use crate::repository::{ProposalFilters, ProposalStore, StatusCommit};
use crate::slug::build_customer_slug;
use crate::status::ProposalStatus;
use crate::store::SledStore;
use crate::utils;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

const DOCUMENT_EXTENSIONS: [&str; 3] = [".doc", ".docx", ".pdf"];

#[derive(Debug, Clone)]
pub struct CreateProposalInput {
    pub customer_id: String,
    pub year: i32,
    pub invitation_code: Option<String>,
    pub project_name: String,
    pub scope_description: String,
    pub due_date: Option<TimeStamp<Utc>>,
    pub estimated_value_cents: Option<u64>,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct CreateProposalOutput {
    pub proposal: Proposal,
    pub initial_revision: ProposalRevision,
}

#[derive(Debug, Clone)]
pub struct UpdateStatusInput {
    pub proposal_id: String,
    pub status: ProposalStatus,
    pub outcome_reason: Option<String>,
    pub final_value_cents: Option<u64>,
    pub changed_by: String,
}

#[derive(Debug, Clone)]
pub struct SendProposalInput {
    pub proposal_id: String,
    pub file_name: String,
    pub sent_by: String,
}

#[derive(Debug, Clone)]
pub struct CloseRevisionInput {
    pub proposal_id: String,
    pub reason: String,
    pub scope_changes: Option<String>,
    pub discount_cents: Option<u64>,
    pub notes: Option<String>,
    pub closed_by: String,
}

#[derive(Debug, Clone)]
pub struct RevisionCycleStarted {
    pub proposal: Proposal,
    pub cycle_id: String,
    pub revision: ProposalRevision,
}

#[derive(Debug, Clone)]
pub struct RevisionCycleClosed {
    pub proposal: Proposal,
    pub revision: ProposalRevision,
}

pub struct ProposalService<S> {
    store: S,
}

impl ProposalService<SledStore> {
    pub fn open(instance: Arc<sled::Db>) -> Result<Self> {
        Ok(Self::new(SledStore::new(instance)?))
    }
}

impl<S: ProposalStore> ProposalService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        self.store
            .get_proposal(proposal_id)?
            .ok_or_else(|| ProposalError::not_found("proposal", proposal_id))
    }

    fn log(&self, entity_id: &str, created_by: &str, action: ActivityAction) -> Result<()> {
        self.store
            .append(&activity_entry(entity_id, created_by, action))?;
        Ok(())
    }

    /// Commits the status change, its `StatusChanged` entry and whatever else
    /// `commit` carries in one write, guarded by the status `proposal` was
    /// loaded with.
    fn move_status(
        &self,
        proposal: &Proposal,
        mut commit: StatusCommit,
        source: StatusSource,
        changed_by: &str,
    ) -> Result<Proposal> {
        if commit.change.status != proposal.status {
            let changed = ActivityAction::StatusChanged {
                from: proposal.status,
                to: commit.change.status,
                source,
            };
            commit
                .entries
                .insert(0, activity_entry(&proposal.id, changed_by, changed));
        }
        let updated = self.store.commit_status(&commit)?;

        if updated.status != proposal.status {
            info!(
                proposal = %proposal.code,
                from = %proposal.status,
                to = %updated.status,
                ?source,
                "proposal status changed"
            );
        }
        Ok(updated)
    }

    /// `slug` defaults to the customer name.
    pub fn register_customer(&self, name: &str, slug: Option<&str>) -> Result<Customer> {
        if name.trim().is_empty() {
            return Err(ValidationError::Blank("customer name").into());
        }
        let customer = Customer {
            id: new_id("customer_")?,
            name: name.trim().to_string(),
            slug: build_customer_slug(slug.unwrap_or(name))?,
        };
        self.store.insert_customer(&customer)?;
        info!(id = %customer.id, slug = %customer.slug, "registered customer");
        Ok(customer)
    }

    pub fn create_proposal(&self, input: CreateProposalInput) -> Result<CreateProposalOutput> {
        let customer = self
            .store
            .get_customer(&input.customer_id)?
            .ok_or_else(|| ProposalError::not_found("customer", &input.customer_id))?;

        let project_name = required(&input.project_name, "project name")?;
        let scope_description = required(&input.scope_description, "scope description")?;

        // reject a bad year or slug before a sequence number is spent on it
        ProposalCode::new(&customer.slug, input.year, 1)?;

        let sequence = self
            .store
            .allocate_next_sequence(&customer.id, input.year)?;
        let signed = i64::try_from(sequence)
            .map_err(|_| ProposalError::Encoding(format!("sequence {sequence} overflows")))?;
        let code = ProposalCode::new(&customer.slug, input.year, signed)?;

        let now = TimeStamp::new();
        let proposal = Proposal {
            id: new_id("proposal_")?,
            customer_id: customer.id.clone(),
            code: code.to_string(),
            seq_number: sequence,
            year: input.year,
            invitation_code: optional(input.invitation_code),
            project_name,
            scope_description,
            status: ProposalStatus::INITIAL,
            due_date: input.due_date,
            estimated_value_cents: input.estimated_value_cents,
            final_value_cents: None,
            outcome_reason: None,
            created_by: input.created_by.clone(),
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        self.store.insert_proposal(&proposal)?;

        let initial_revision = ProposalRevision {
            id: new_id("revision_")?,
            proposal_id: proposal.id.clone(),
            revision_number: 0,
            reason: None,
            scope_changes: None,
            discount_cents: None,
            value_before_cents: None,
            value_after_cents: proposal.estimated_value_cents,
            notes: None,
            created_by: input.created_by.clone(),
            created_at: now,
        };
        self.store.insert_revision(&initial_revision)?;

        self.log(
            &proposal.id,
            &input.created_by,
            ActivityAction::ProposalCreated {
                code: proposal.code.clone(),
            },
        )?;
        info!(id = %proposal.id, code = %proposal.code, "created proposal");

        Ok(CreateProposalOutput {
            proposal,
            initial_revision,
        })
    }

    /// Manual status change. Requesting the current status only updates the
    /// outcome fields.
    pub fn update_status(&self, input: UpdateStatusInput) -> Result<Proposal> {
        let current = self.load_proposal(&input.proposal_id)?;

        if current.status == ProposalStatus::EmRevisao {
            return Err(ValidationError::RevisionInProgress.into());
        }
        if input.status == ProposalStatus::EmRevisao {
            return Err(ValidationError::ManualRevisionStatus.into());
        }
        if input.status != current.status {
            current
                .status
                .validate_transition(input.status)
                .inspect_err(|err| warn!(proposal = %current.code, %err, "rejected status change"))?;
        }

        let outcome_reason = optional(input.outcome_reason);
        if matches!(input.status, ProposalStatus::Perdida | ProposalStatus::Cancelada)
            && outcome_reason.is_none()
        {
            return Err(ValidationError::MissingOutcomeReason(input.status).into());
        }

        let change = StatusChange {
            status: input.status,
            outcome_reason,
            final_value_cents: input.final_value_cents,
        };
        let commit = StatusCommit::new(&current.id, current.status, change);
        self.move_status(&current, commit, StatusSource::Manual, &input.changed_by)
    }

    /// Moves a proposal to `enviada` along with its document.
    pub fn send_proposal(&self, input: SendProposalInput) -> Result<Proposal> {
        let current = self.load_proposal(&input.proposal_id)?;

        if current.status == ProposalStatus::EmRevisao {
            return Err(ValidationError::RevisionInProgress.into());
        }
        current.status.validate_transition(ProposalStatus::Enviada)?;

        let latest = self
            .store
            .list_revisions(&current.id)?
            .into_iter()
            .next()
            .ok_or(ValidationError::MissingBaseRevision)?;
        validate_document_name(&current.code, latest.revision_number, &input.file_name)?;

        let sent = self.move_status(
            &current,
            StatusCommit::new(
                &current.id,
                current.status,
                StatusChange::to(ProposalStatus::Enviada),
            ),
            StatusSource::Send,
            &input.sent_by,
        )?;
        info!(proposal = %sent.code, file = %input.file_name, "proposal sent");
        Ok(sent)
    }

    pub fn start_revision_cycle(
        &self,
        proposal_id: &str,
        started_by: &str,
    ) -> Result<RevisionCycleStarted> {
        let current = self.load_proposal(proposal_id)?;
        current.status.validate_transition(ProposalStatus::EmRevisao)?;

        let log = self.store.entries_for(&current.id)?;
        if find_pending_revision_cycle(&log).is_some() {
            return Err(ValidationError::RevisionCyclePending.into());
        }
        if self.store.list_revisions(&current.id)?.is_empty() {
            return Err(ValidationError::MissingBaseRevision.into());
        }

        let revision = ProposalRevision {
            id: new_id("revision_")?,
            proposal_id: current.id.clone(),
            revision_number: self.store.next_revision_number(&current.id)?,
            reason: None,
            scope_changes: None,
            discount_cents: None,
            value_before_cents: None,
            value_after_cents: current.estimated_value_cents,
            notes: None,
            created_by: started_by.to_string(),
            created_at: TimeStamp::new(),
        };
        let cycle_id = new_id("cycle_")?;
        let opened = ActivityAction::RevisionCycleOpened {
            cycle_id: cycle_id.clone(),
            revision_id: revision.id.clone(),
            revision_number: revision.revision_number,
            snapshot: RevisionSnapshot {
                scope_description: current.scope_description.clone(),
                due_date: current.due_date.clone(),
                estimated_value_cents: current.estimated_value_cents,
            },
        };

        let mut commit = StatusCommit::new(
            &current.id,
            current.status,
            StatusChange::to(ProposalStatus::EmRevisao),
        );
        commit.put_revision = Some(revision.clone());
        commit
            .entries
            .push(activity_entry(&current.id, started_by, opened));
        let proposal = self.move_status(
            &current,
            commit,
            StatusSource::RevisionCycleStart,
            started_by,
        )?;
        info!(proposal = %current.code, %cycle_id, revision = revision.revision_number, "revision cycle opened");

        Ok(RevisionCycleStarted {
            proposal,
            cycle_id,
            revision,
        })
    }

    /// Completes the pending revision and sends the proposal again.
    pub fn close_revision_cycle(&self, input: CloseRevisionInput) -> Result<RevisionCycleClosed> {
        let reason = required(&input.reason, "revision reason")?;

        let current = self.load_proposal(&input.proposal_id)?;
        if current.status != ProposalStatus::EmRevisao {
            return Err(ValidationError::NotUnderRevision(current.status).into());
        }
        let pending = find_pending_revision_cycle(&self.store.entries_for(&current.id)?)
            .ok_or(ValidationError::NoPendingRevisionCycle)?;
        let opened = self
            .store
            .get_revision(&current.id, &pending.revision_id)?
            .ok_or(ValidationError::NoPendingRevisionCycle)?;

        // the pending revision is completed in place under its own number
        // rather than followed by a new one, so a cycle yields one revision
        let revision = ProposalRevision {
            reason: Some(reason.clone()),
            scope_changes: optional(input.scope_changes),
            discount_cents: input.discount_cents,
            value_before_cents: pending.snapshot.estimated_value_cents,
            value_after_cents: current.estimated_value_cents,
            notes: optional(input.notes),
            ..opened
        };
        let closed = ActivityAction::RevisionCycleClosed {
            cycle_id: pending.cycle_id.clone(),
            revision_id: revision.id.clone(),
            revision_number: revision.revision_number,
            reason,
        };

        let mut commit = StatusCommit::new(
            &current.id,
            current.status,
            StatusChange::to(ProposalStatus::Enviada),
        );
        commit.put_revision = Some(revision.clone());
        commit
            .entries
            .push(activity_entry(&current.id, &input.closed_by, closed));
        let proposal = self.move_status(
            &current,
            commit,
            StatusSource::RevisionCycleClose,
            &input.closed_by,
        )?;
        info!(proposal = %current.code, cycle_id = %pending.cycle_id, "revision cycle closed");

        Ok(RevisionCycleClosed { proposal, revision })
    }

    /// Drops the pending revision and restores the fields captured when the
    /// cycle opened.
    pub fn cancel_revision_cycle(&self, proposal_id: &str, canceled_by: &str) -> Result<Proposal> {
        let current = self.load_proposal(proposal_id)?;
        if current.status != ProposalStatus::EmRevisao {
            return Err(ValidationError::NotUnderRevision(current.status).into());
        }
        let pending = find_pending_revision_cycle(&self.store.entries_for(&current.id)?)
            .ok_or(ValidationError::NoPendingRevisionCycle)?;
        if self
            .store
            .get_revision(&current.id, &pending.revision_id)?
            .is_none()
        {
            return Err(ValidationError::NoPendingRevisionCycle.into());
        }

        let canceled = ActivityAction::RevisionCycleCanceled {
            cycle_id: pending.cycle_id.clone(),
            revision_id: pending.revision_id.clone(),
            revision_number: pending.revision_number,
        };

        let mut commit = StatusCommit::new(
            &current.id,
            current.status,
            StatusChange::to(ProposalStatus::Enviada),
        );
        commit.remove_revision = Some(pending.revision_number);
        commit.restore = Some(pending.snapshot.clone());
        commit
            .entries
            .push(activity_entry(&current.id, canceled_by, canceled));
        let proposal = self.move_status(
            &current,
            commit,
            StatusSource::RevisionCycleCancel,
            canceled_by,
        )?;
        info!(proposal = %current.code, cycle_id = %pending.cycle_id, "revision cycle canceled");

        Ok(proposal)
    }

    /// Final proposals are rejected by the store against the record it writes.
    pub fn update_base_fields(&self, proposal_id: &str, fields: BaseFields) -> Result<Proposal> {
        let fields = BaseFields {
            project_name: required(&fields.project_name, "project name")?,
            scope_description: required(&fields.scope_description, "scope description")?,
            invitation_code: optional(fields.invitation_code),
            ..fields
        };
        self.store.update_base_fields(proposal_id, &fields)
    }

    pub fn get_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        self.load_proposal(proposal_id)
    }

    pub fn list_proposals(&self, filters: &ProposalFilters) -> Result<Vec<Proposal>> {
        self.store.find_proposals(filters)
    }

    pub fn list_revisions(&self, proposal_id: &str) -> Result<Vec<ProposalRevision>> {
        self.store.list_revisions(proposal_id)
    }

    pub fn activity(&self, proposal_id: &str) -> Result<Vec<ActivityEntry>> {
        self.store.entries_for(proposal_id)
    }
}

/// The document must be a DOC, DOCX or PDF whose name carries the proposal
/// code and the `r{revision}` token, case insensitively.
pub fn validate_document_name(
    proposal_code: &str,
    revision_number: u32,
    file_name: &str,
) -> Result<(), ValidationError> {
    let name = file_name.trim().to_lowercase();
    if !DOCUMENT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        return Err(ValidationError::DocumentExtension(file_name.to_string()));
    }
    if !name.contains(&proposal_code.to_lowercase())
        || !name.contains(&format!("r{revision_number}"))
    {
        return Err(ValidationError::DocumentName { revision_number });
    }
    Ok(())
}

fn activity_entry(entity_id: &str, created_by: &str, action: ActivityAction) -> ActivityEntry {
    ActivityEntry::new(
        entity_id.to_string(),
        created_by.to_string(),
        TimeStamp::new(),
        action,
    )
}

fn new_id(hrp: &str) -> Result<String> {
    utils::new_uuid_to_bech32(hrp).map_err(|err| ProposalError::Identifier(err.to_string()))
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Blank(field));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_names_need_code_and_revision() {
        let code = "BV-EGIS-2026-BIM-001";
        assert!(validate_document_name(code, 0, "BV-EGIS-2026-BIM-001_R0.docx").is_ok());
        assert!(validate_document_name(code, 2, "bv-egis-2026-bim-001-r2.PDF").is_ok());
        assert_eq!(
            validate_document_name(code, 1, "BV-EGIS-2026-BIM-001_R0.pdf"),
            Err(ValidationError::DocumentName { revision_number: 1 })
        );
        assert_eq!(
            validate_document_name(code, 0, "proposta_R0.pdf"),
            Err(ValidationError::DocumentName { revision_number: 0 })
        );
        assert!(matches!(
            validate_document_name(code, 0, "BV-EGIS-2026-BIM-001_R0.xlsx"),
            Err(ValidationError::DocumentExtension(_))
        ));
    }

    #[test]
    fn blank_text_is_normalised_away() {
        assert_eq!(optional(Some("   ".into())), None);
        assert_eq!(optional(Some(" motivo ".into())), Some("motivo".into()));
        assert_eq!(required("  ", "reason"), Err(ValidationError::Blank("reason")));
    }
}
