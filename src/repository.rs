//! Persistence ports consumed by [`crate::service::ProposalService`]
use crate::activity::{ActivityEntry, RevisionSnapshot};
use crate::error::Result;
use crate::proposal::{BaseFields, Customer, Proposal, ProposalRevision, StatusChange};
use crate::status::ProposalStatus;

pub trait CustomerRepository {
    fn insert_customer(&self, customer: &Customer) -> Result<()>;
    fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalFilters {
    /// Case insensitive match against the code or project name.
    pub search: Option<String>,
    pub status: Option<ProposalStatus>,
}

impl ProposalFilters {
    pub fn matches(&self, proposal: &Proposal) -> bool {
        if let Some(status) = self.status {
            if proposal.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                proposal.code.to_lowercase().contains(&term)
                    || proposal.project_name.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

pub trait ProposalRepository {
    /// Atomically allocates the next sequence for (customer, year), starting at 1.
    fn allocate_next_sequence(&self, customer_id: &str, year: i32) -> Result<u64>;
    /// Fails with `DuplicateCode` if the code is already taken.
    fn insert_proposal(&self, proposal: &Proposal) -> Result<()>;
    fn get_proposal(&self, proposal_id: &str) -> Result<Option<Proposal>>;
    fn find_proposals(&self, filters: &ProposalFilters) -> Result<Vec<Proposal>>;
    /// Fails with `FinalStatus` if the stored proposal is final at write time.
    fn update_base_fields(&self, proposal_id: &str, fields: &BaseFields) -> Result<Proposal>;
}

pub trait RevisionRepository {
    fn next_revision_number(&self, proposal_id: &str) -> Result<u32>;
    fn insert_revision(&self, revision: &ProposalRevision) -> Result<()>;
    /// Ordered by revision number, highest first.
    fn list_revisions(&self, proposal_id: &str) -> Result<Vec<ProposalRevision>>;
    fn get_revision(
        &self,
        proposal_id: &str,
        revision_id: &str,
    ) -> Result<Option<ProposalRevision>>;
}

pub trait ActivityLogRepository {
    /// Returns the content hash of the appended entry.
    fn append(&self, entry: &ActivityEntry) -> Result<String>;
    /// Ordered oldest first.
    fn entries_for(&self, entity_id: &str) -> Result<Vec<ActivityEntry>>;
}

/// A status change together with the records that must land with it.
#[derive(Debug, Clone)]
pub struct StatusCommit {
    pub proposal_id: String,
    pub expected: ProposalStatus,
    pub change: StatusChange,
    /// Scope, due date and estimate to put back on the proposal.
    pub restore: Option<RevisionSnapshot>,
    /// Inserted, or overwritten when its number already exists.
    pub put_revision: Option<ProposalRevision>,
    /// Revision number to delete; must exist.
    pub remove_revision: Option<u32>,
    pub entries: Vec<ActivityEntry>,
}

impl StatusCommit {
    pub fn new(proposal_id: &str, expected: ProposalStatus, change: StatusChange) -> Self {
        Self {
            proposal_id: proposal_id.to_string(),
            expected,
            change,
            restore: None,
            put_revision: None,
            remove_revision: None,
            entries: Vec::new(),
        }
    }
}

pub trait WorkflowRepository {
    /// Writes the whole commit while the stored status is still `expected`.
    /// Nothing is written on failure; a moved status gives `StaleStatus`.
    fn commit_status(&self, commit: &StatusCommit) -> Result<Proposal>;
}

/// Everything the service needs from storage.
pub trait ProposalStore:
    CustomerRepository
    + ProposalRepository
    + RevisionRepository
    + ActivityLogRepository
    + WorkflowRepository
{
}

impl<T> ProposalStore for T where
    T: CustomerRepository
        + ProposalRepository
        + RevisionRepository
        + ActivityLogRepository
        + WorkflowRepository
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::TimeStamp;

    fn proposal(code: &str, project_name: &str, status: ProposalStatus) -> Proposal {
        Proposal {
            id: "proposal_1".into(),
            customer_id: "customer_1".into(),
            code: code.into(),
            seq_number: 1,
            year: 2026,
            invitation_code: None,
            project_name: project_name.into(),
            scope_description: "Escopo".into(),
            status,
            due_date: None,
            estimated_value_cents: None,
            final_value_cents: None,
            outcome_reason: None,
            created_by: "user_1".into(),
            created_at: TimeStamp::new(),
            updated_at: TimeStamp::new(),
        }
    }

    #[test]
    fn filters_match_status_and_search() {
        let p = proposal("BV-EGIS-2026-BIM-001", "Hospital Regional", ProposalStatus::Enviada);

        assert!(ProposalFilters::default().matches(&p));
        assert!(
            ProposalFilters {
                search: Some("egis".into()),
                status: Some(ProposalStatus::Enviada),
            }
            .matches(&p)
        );
        assert!(
            ProposalFilters {
                search: Some("  hospital ".into()),
                status: None,
            }
            .matches(&p)
        );
        assert!(
            !ProposalFilters {
                search: None,
                status: Some(ProposalStatus::Ganha),
            }
            .matches(&p)
        );
        assert!(
            !ProposalFilters {
                search: Some("acme".into()),
                status: None,
            }
            .matches(&p)
        );
    }
}
