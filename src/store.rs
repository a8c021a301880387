//! sled backed implementation of the persistence ports
//!
//! Records are CBOR encoded. Keys:
//! - `customers`: customer id
//! - `proposals`: proposal id, with `proposal_codes` mapping code -> id
//! - `sequences`: `{customer_id}/{year}` -> big endian u64 counter
//! - `revisions`: `{proposal_id}/{revision_number:010}`
//! - `activity`: `{entity_id}/{generated id:020}`
use crate::activity::ActivityEntry;
use crate::error::{ProposalError, Result, ValidationError};
use crate::proposal::{BaseFields, Customer, Proposal, ProposalRevision, TimeStamp};
use crate::repository::{
    ActivityLogRepository, CustomerRepository, ProposalFilters, ProposalRepository,
    RevisionRepository, StatusCommit, WorkflowRepository,
};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::{Db, Transactional, Tree};
use std::sync::Arc;
use tracing::debug;

pub struct SledStore {
    instance: Arc<Db>,
    customers: Tree,
    proposals: Tree,
    codes: Tree,
    sequences: Tree,
    revisions: Tree,
    activity: Tree,
}

impl SledStore {
    pub fn new(instance: Arc<Db>) -> Result<Self> {
        Ok(Self {
            customers: instance.open_tree("customers")?,
            proposals: instance.open_tree("proposals")?,
            codes: instance.open_tree("proposal_codes")?,
            sequences: instance.open_tree("sequences")?,
            revisions: instance.open_tree("revisions")?,
            activity: instance.open_tree("activity")?,
            instance,
        })
    }

    /// In-memory database, removed on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::new(Arc::new(db))
    }

    pub fn flush(&self) -> Result<()> {
        self.instance.flush()?;
        Ok(())
    }

    fn find_revision_key(
        &self,
        proposal_id: &str,
        revision_id: &str,
    ) -> Result<Option<(sled::IVec, ProposalRevision)>> {
        for item in self.revisions.scan_prefix(revision_prefix(proposal_id)) {
            let (key, value) = item?;
            let revision: ProposalRevision = minicbor::decode(&value)?;
            if revision.id == revision_id {
                return Ok(Some((key, revision)));
            }
        }
        Ok(None)
    }
}

fn revision_prefix(proposal_id: &str) -> String {
    format!("{proposal_id}/")
}

fn revision_key(proposal_id: &str, revision_number: u32) -> String {
    format!("{proposal_id}/{revision_number:010}")
}

fn decode_counter(bytes: &[u8]) -> Option<u64> {
    <[u8; 8]>::try_from(bytes).ok().map(u64::from_be_bytes)
}

impl CustomerRepository for SledStore {
    fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.customers
            .insert(customer.id.as_bytes(), minicbor::to_vec(customer)?)?;
        Ok(())
    }

    fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>> {
        match self.customers.get(customer_id.as_bytes())? {
            Some(raw) => Ok(Some(minicbor::decode(&raw)?)),
            None => Ok(None),
        }
    }
}

impl ProposalRepository for SledStore {
    fn allocate_next_sequence(&self, customer_id: &str, year: i32) -> Result<u64> {
        let key = format!("{customer_id}/{year}");
        let next = self.sequences.update_and_fetch(key.as_bytes(), |old| {
            let current = old.and_then(decode_counter).unwrap_or(0);
            Some((current + 1).to_be_bytes().to_vec())
        })?;

        let sequence = next
            .as_deref()
            .and_then(decode_counter)
            .ok_or_else(|| ProposalError::Encoding(format!("sequence counter {key}")))?;
        debug!(%key, sequence, "allocated proposal sequence");
        Ok(sequence)
    }

    fn insert_proposal(&self, proposal: &Proposal) -> Result<()> {
        let cbor = minicbor::to_vec(proposal)?;

        let result = (&self.codes, &self.proposals).transaction(
            |(codes, proposals)| -> ConflictableTransactionResult<(), ()> {
                if codes.get(proposal.code.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(()));
                }
                codes.insert(proposal.code.as_bytes(), proposal.id.as_bytes())?;
                proposals.insert(proposal.id.as_bytes(), cbor.as_slice())?;
                Ok(())
            },
        );

        match result {
            Ok(()) => {
                debug!(id = %proposal.id, code = %proposal.code, "stored proposal");
                Ok(())
            }
            Err(TransactionError::Abort(())) => {
                Err(ProposalError::DuplicateCode(proposal.code.clone()))
            }
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn get_proposal(&self, proposal_id: &str) -> Result<Option<Proposal>> {
        match self.proposals.get(proposal_id.as_bytes())? {
            Some(raw) => Ok(Some(minicbor::decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn find_proposals(&self, filters: &ProposalFilters) -> Result<Vec<Proposal>> {
        let mut found = Vec::new();
        for item in self.proposals.iter() {
            let (_, raw) = item?;
            let proposal: Proposal = minicbor::decode(&raw)?;
            if filters.matches(&proposal) {
                found.push(proposal);
            }
        }
        // newest first
        found.sort_by_key(|p| std::cmp::Reverse(p.created_at.to_datetime_utc()));
        Ok(found)
    }

    fn update_base_fields(&self, proposal_id: &str, fields: &BaseFields) -> Result<Proposal> {
        loop {
            let Some(raw) = self.proposals.get(proposal_id.as_bytes())? else {
                return Err(ProposalError::not_found("proposal", proposal_id));
            };
            let mut proposal: Proposal = minicbor::decode(&raw)?;
            if proposal.is_final() {
                return Err(ValidationError::FinalStatus(proposal.status).into());
            }
            proposal.project_name = fields.project_name.clone();
            proposal.invitation_code = fields.invitation_code.clone();
            proposal.scope_description = fields.scope_description.clone();
            proposal.due_date = fields.due_date.clone();
            proposal.estimated_value_cents = fields.estimated_value_cents;
            proposal.updated_at = TimeStamp::new();

            let cbor = minicbor::to_vec(&proposal)?;
            match self
                .proposals
                .compare_and_swap(proposal_id.as_bytes(), Some(&raw), Some(cbor))?
            {
                Ok(()) => return Ok(proposal),
                // re-read so a concurrent move to a final status is seen
                Err(_) => debug!(proposal_id, "base field write raced, retrying"),
            }
        }
    }
}

impl RevisionRepository for SledStore {
    fn next_revision_number(&self, proposal_id: &str) -> Result<u32> {
        match self.revisions.scan_prefix(revision_prefix(proposal_id)).next_back() {
            Some(item) => {
                let (_, raw) = item?;
                let latest: ProposalRevision = minicbor::decode(&raw)?;
                Ok(latest.revision_number + 1)
            }
            None => Ok(0),
        }
    }

    fn insert_revision(&self, revision: &ProposalRevision) -> Result<()> {
        let key = revision_key(&revision.proposal_id, revision.revision_number);
        self.revisions
            .insert(key.as_bytes(), minicbor::to_vec(revision)?)?;
        debug!(%key, id = %revision.id, "stored revision");
        Ok(())
    }

    fn list_revisions(&self, proposal_id: &str) -> Result<Vec<ProposalRevision>> {
        self.revisions
            .scan_prefix(revision_prefix(proposal_id))
            .rev()
            .map(|item| -> Result<ProposalRevision> {
                let (_, raw) = item?;
                Ok(minicbor::decode(&raw)?)
            })
            .collect()
    }

    fn get_revision(
        &self,
        proposal_id: &str,
        revision_id: &str,
    ) -> Result<Option<ProposalRevision>> {
        Ok(self
            .find_revision_key(proposal_id, revision_id)?
            .map(|(_, revision)| revision))
    }
}

impl ActivityLogRepository for SledStore {
    fn append(&self, entry: &ActivityEntry) -> Result<String> {
        let (hash, cbor) = entry.build()?;
        let key = format!("{}/{:020}", entry.entity_id, self.instance.generate_id()?);
        self.activity.insert(key.as_bytes(), cbor)?;
        debug!(%key, %hash, "appended activity entry");
        Ok(hash)
    }

    fn entries_for(&self, entity_id: &str) -> Result<Vec<ActivityEntry>> {
        self.activity
            .scan_prefix(format!("{entity_id}/"))
            .map(|item| -> Result<ActivityEntry> {
                let (_, raw) = item?;
                Ok(minicbor::decode(&raw)?)
            })
            .collect()
    }
}

impl WorkflowRepository for SledStore {
    fn commit_status(&self, commit: &StatusCommit) -> Result<Proposal> {
        let entries = commit
            .entries
            .iter()
            .map(|entry| -> Result<(String, Vec<u8>)> {
                let (_, cbor) = entry.build()?;
                Ok((format!("{}/", entry.entity_id), cbor))
            })
            .collect::<Result<Vec<_>>>()?;
        let put_revision = commit
            .put_revision
            .as_ref()
            .map(|revision| -> Result<(String, Vec<u8>)> {
                let key = revision_key(&revision.proposal_id, revision.revision_number);
                Ok((key, minicbor::to_vec(revision)?))
            })
            .transpose()?;
        let abort = |err: ProposalError| ConflictableTransactionError::Abort(err);

        let result = (&self.proposals, &self.revisions, &self.activity).transaction(
            |(proposals, revisions, activity)| -> ConflictableTransactionResult<Proposal, ProposalError> {
                let Some(raw) = proposals.get(commit.proposal_id.as_bytes())? else {
                    return Err(abort(ProposalError::not_found("proposal", &commit.proposal_id)));
                };
                let mut proposal: Proposal =
                    minicbor::decode(&raw).map_err(|err| abort(err.into()))?;
                if proposal.status != commit.expected {
                    return Err(abort(ProposalError::StaleStatus {
                        id: commit.proposal_id.clone(),
                        expected: commit.expected,
                    }));
                }

                proposal.status = commit.change.status;
                if commit.change.outcome_reason.is_some() {
                    proposal.outcome_reason = commit.change.outcome_reason.clone();
                }
                if commit.change.final_value_cents.is_some() {
                    proposal.final_value_cents = commit.change.final_value_cents;
                }
                if let Some(snapshot) = &commit.restore {
                    proposal.scope_description = snapshot.scope_description.clone();
                    proposal.due_date = snapshot.due_date.clone();
                    proposal.estimated_value_cents = snapshot.estimated_value_cents;
                }
                proposal.updated_at = TimeStamp::new();
                let cbor = minicbor::to_vec(&proposal).map_err(|err| abort(err.into()))?;
                proposals.insert(commit.proposal_id.as_bytes(), cbor)?;

                if let Some(number) = commit.remove_revision {
                    let key = revision_key(&commit.proposal_id, number);
                    if revisions.remove(key.as_bytes())?.is_none() {
                        return Err(abort(ProposalError::not_found("revision", key)));
                    }
                }
                if let Some((key, cbor)) = &put_revision {
                    revisions.insert(key.as_bytes(), cbor.as_slice())?;
                }
                for (prefix, cbor) in &entries {
                    let key = format!("{prefix}{:020}", activity
                        .generate_id()
                        .map_err(ConflictableTransactionError::Storage)?);
                    activity.insert(key.as_bytes(), cbor.as_slice())?;
                }
                Ok(proposal)
            },
        );

        match result {
            Ok(proposal) => {
                debug!(
                    id = %proposal.id,
                    status = %proposal.status,
                    entries = entries.len(),
                    "committed status change"
                );
                Ok(proposal)
            }
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }
}
