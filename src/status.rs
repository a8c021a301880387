//! Proposal status state machine
//!
//! ```text
//! recebida ──▶ em_elaboracao ──▶ enviada ◀──▶ em_revisao
//!    │              │             │  │  │       │  │  │
//!    ▼              ▼             ▼  ▼  ▼       ▼  ▼  ▼
//! cancelada     cancelada      ganha perdida cancelada (terminal)
//! ```
//!
//! Only single-step legality is decided here. Persisting the change, and
//! guarding it against concurrent writers, is the caller's job.
use crate::error::ValidationError;
use std::str::FromStr;

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum ProposalStatus {
    #[n(0)]
    Recebida,
    #[n(1)]
    EmElaboracao,
    #[n(2)]
    Enviada,
    #[n(3)]
    EmRevisao,
    #[n(4)]
    Ganha,
    #[n(5)]
    Perdida,
    #[n(6)]
    Cancelada,
}

use ProposalStatus::*;

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 7] = [
        Recebida,
        EmElaboracao,
        Enviada,
        EmRevisao,
        Ganha,
        Perdida,
        Cancelada,
    ];

    /// Every proposal starts here.
    pub const INITIAL: ProposalStatus = Recebida;

    pub const fn as_str(&self) -> &'static str {
        match self {
            Recebida => "recebida",
            EmElaboracao => "em_elaboracao",
            Enviada => "enviada",
            EmRevisao => "em_revisao",
            Ganha => "ganha",
            Perdida => "perdida",
            Cancelada => "cancelada",
        }
    }

    pub const fn allowed_successors(&self) -> &'static [ProposalStatus] {
        match self {
            Recebida => &[EmElaboracao, Cancelada],
            EmElaboracao => &[Enviada, Cancelada],
            Enviada => &[EmRevisao, Ganha, Perdida, Cancelada],
            EmRevisao => &[Enviada, Ganha, Perdida, Cancelada],
            Ganha | Perdida | Cancelada => &[],
        }
    }

    pub const fn is_final(&self) -> bool {
        matches!(self, Ganha | Perdida | Cancelada)
    }

    /// Self transitions are illegal, none appear in the table.
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        self.allowed_successors().contains(&next)
    }

    pub fn validate_transition(&self, next: ProposalStatus) -> Result<(), ValidationError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(ValidationError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProposalStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))
    }
}

pub fn is_final_status(status: ProposalStatus) -> bool {
    status.is_final()
}

pub fn is_valid_proposal_status_transition(
    current: ProposalStatus,
    next: ProposalStatus,
) -> bool {
    current.can_transition_to(next)
}
