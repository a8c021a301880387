//! Append-only activity log of a proposal
//!
//! Revision cycles are not stored as records of their own: a cycle is open
//! while the log holds a `RevisionCycleOpened` entry whose id has no matching
//! close or cancel entry.
use crate::proposal::TimeStamp;
use crate::status::ProposalStatus;
use chrono::Utc;
use std::collections::HashSet;

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct ActivityEntry {
    #[n(0)]
    pub entity_id: String, // the proposal this entry belongs to
    #[n(1)]
    pub created_by: String,
    #[n(2)]
    pub created_at: TimeStamp<Utc>,
    #[n(3)]
    pub action: ActivityAction,
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum ActivityAction {
    #[n(0)]
    ProposalCreated {
        #[n(0)]
        code: String,
    },
    #[n(1)]
    StatusChanged {
        #[n(0)]
        from: ProposalStatus,
        #[n(1)]
        to: ProposalStatus,
        #[n(2)]
        source: StatusSource,
    },
    #[n(2)]
    RevisionCycleOpened {
        #[n(0)]
        cycle_id: String,
        #[n(1)]
        revision_id: String,
        #[n(2)]
        revision_number: u32,
        #[n(3)]
        snapshot: RevisionSnapshot,
    },
    #[n(3)]
    RevisionCycleClosed {
        #[n(0)]
        cycle_id: String,
        #[n(1)]
        revision_id: String,
        #[n(2)]
        revision_number: u32,
        #[n(3)]
        reason: String,
    },
    #[n(4)]
    RevisionCycleCanceled {
        #[n(0)]
        cycle_id: String,
        #[n(1)]
        revision_id: String,
        #[n(2)]
        revision_number: u32,
    },
}

/// What triggered a status change.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone, Copy)]
pub enum StatusSource {
    #[n(0)]
    Manual,
    #[n(1)]
    Send,
    #[n(2)]
    RevisionCycleStart,
    #[n(3)]
    RevisionCycleClose,
    #[n(4)]
    RevisionCycleCancel,
}

/// Proposal fields as they were when a revision cycle opened, restored on cancel.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct RevisionSnapshot {
    #[n(0)]
    pub scope_description: String,
    #[n(1)]
    pub due_date: Option<TimeStamp<Utc>>,
    #[n(2)]
    pub estimated_value_cents: Option<u64>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PendingRevisionCycle {
    pub cycle_id: String,
    pub revision_id: String,
    pub revision_number: u32,
    pub opened_at: TimeStamp<Utc>,
    pub snapshot: RevisionSnapshot,
}

impl ActivityEntry {
    pub fn new(
        entity_id: String,
        created_by: String,
        created_at: TimeStamp<Utc>,
        action: ActivityAction,
    ) -> Self {
        Self {
            entity_id,
            created_by,
            created_at,
            action,
        }
    }
    /// Returns the hex sha256 of the entry's CBOR encoding, and the encoding.
    pub fn build(&self) -> Result<(String, Vec<u8>), minicbor::encode::Error<std::convert::Infallible>> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

pub fn find_pending_revision_cycle(entries: &[ActivityEntry]) -> Option<PendingRevisionCycle> {
    let finished: HashSet<&str> = entries
        .iter()
        .filter_map(|entry| match &entry.action {
            ActivityAction::RevisionCycleClosed { cycle_id, .. }
            | ActivityAction::RevisionCycleCanceled { cycle_id, .. } => Some(cycle_id.as_str()),
            _ => None,
        })
        .collect();

    entries.iter().find_map(|entry| match &entry.action {
        ActivityAction::RevisionCycleOpened {
            cycle_id,
            revision_id,
            revision_number,
            snapshot,
        } if !finished.contains(cycle_id.as_str()) => Some(PendingRevisionCycle {
            cycle_id: cycle_id.clone(),
            revision_id: revision_id.clone(),
            revision_number: *revision_number,
            opened_at: entry.created_at.clone(),
            snapshot: snapshot.clone(),
        }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: ActivityAction) -> ActivityEntry {
        ActivityEntry::new(
            "proposal_1".into(),
            "user_1".into(),
            TimeStamp::new(),
            action,
        )
    }

    fn opened(cycle_id: &str, revision_number: u32) -> ActivityEntry {
        entry(ActivityAction::RevisionCycleOpened {
            cycle_id: cycle_id.into(),
            revision_id: format!("revision_{revision_number}"),
            revision_number,
            snapshot: RevisionSnapshot {
                scope_description: "Escopo".into(),
                due_date: None,
                estimated_value_cents: Some(100_00),
            },
        })
    }

    #[test]
    fn no_cycle_in_empty_log() {
        assert_eq!(find_pending_revision_cycle(&[]), None);
    }

    #[test]
    fn open_cycle_is_pending() {
        let log = vec![
            entry(ActivityAction::ProposalCreated {
                code: "BV-EGIS-2026-BIM-001".into(),
            }),
            opened("cycle-a", 1),
        ];

        let pending = find_pending_revision_cycle(&log).unwrap();
        assert_eq!(pending.cycle_id, "cycle-a");
        assert_eq!(pending.revision_number, 1);
        assert_eq!(pending.snapshot.estimated_value_cents, Some(100_00));
    }

    #[test]
    fn closed_and_canceled_cycles_are_not_pending() {
        let log = vec![
            opened("cycle-a", 1),
            entry(ActivityAction::RevisionCycleClosed {
                cycle_id: "cycle-a".into(),
                revision_id: "revision_2".into(),
                revision_number: 2,
                reason: "desconto".into(),
            }),
            opened("cycle-b", 3),
            entry(ActivityAction::RevisionCycleCanceled {
                cycle_id: "cycle-b".into(),
                revision_id: "revision_3".into(),
                revision_number: 3,
            }),
        ];
        assert_eq!(find_pending_revision_cycle(&log), None);

        let mut log = log;
        log.push(opened("cycle-c", 3));
        assert_eq!(find_pending_revision_cycle(&log).unwrap().cycle_id, "cycle-c");
    }

    #[test]
    fn entry_hash_is_content_addressed() {
        let a = opened("cycle-a", 1);
        let (hash, cbor) = a.build().unwrap();

        assert_eq!(hash, sha256::digest(&cbor));
        let decoded: ActivityEntry = minicbor::decode(&cbor).unwrap();
        assert_eq!(decoded, a);
        assert_eq!(decoded.build().unwrap().0, hash);
    }
}
