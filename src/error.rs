//! Error types for proposal validation and persistence
use crate::status::ProposalStatus;

/// Input contract violations. Deterministic, never retryable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("proposal year {0} is outside [2000, 2100]")]
    InvalidYear(i32),
    #[error("proposal sequence must be positive, got {0}")]
    InvalidSequence(i64),
    #[error("{kind} slug is empty after normalisation")]
    EmptySlug { kind: SlugKind },
    #[error("'{0}' is not a canonical proposal code")]
    InvalidCode(String),
    #[error("unknown proposal status '{0}'")]
    UnknownStatus(String),
    #[error("invalid status transition ({from} -> {to})")]
    InvalidTransition {
        from: ProposalStatus,
        to: ProposalStatus,
    },
    #[error("proposal is under revision, close or cancel the revision cycle instead")]
    RevisionInProgress,
    #[error("em_revisao can only be entered by starting a revision cycle")]
    ManualRevisionStatus,
    #[error("an outcome reason is required to mark a proposal as {0}")]
    MissingOutcomeReason(ProposalStatus),
    #[error("proposal is {0}, which is final")]
    FinalStatus(ProposalStatus),
    #[error("proposal is {0}, not under revision")]
    NotUnderRevision(ProposalStatus),
    #[error("a revision cycle is already pending")]
    RevisionCyclePending,
    #[error("no pending revision cycle")]
    NoPendingRevisionCycle,
    #[error("proposal has no base revision")]
    MissingBaseRevision,
    #[error("{0} must not be blank")]
    Blank(&'static str),
    #[error("document '{0}' must be a DOC, DOCX or PDF file")]
    DocumentExtension(String),
    #[error("document name must contain the proposal code and revision R{revision_number}")]
    DocumentName { revision_number: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugKind {
    Customer,
    Company,
}

impl std::fmt::Display for SlugKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlugKind::Customer => write!(f, "customer"),
            SlugKind::Company => write!(f, "company"),
        }
    }
}

impl ValidationError {
    pub const CODE: &'static str = "VALIDATION_ERROR";

    /// Stable machine code, identical for every variant.
    pub fn code(&self) -> &'static str {
        Self::CODE
    }

    /// The pt-BR text shown to end users of the product.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidYear(_) => "Ano da proposta inválido".into(),
            Self::InvalidSequence(_) => "Sequencial da proposta inválido".into(),
            Self::EmptySlug {
                kind: SlugKind::Customer,
            } => "Slug do cliente inválido".into(),
            Self::EmptySlug {
                kind: SlugKind::Company,
            } => "Slug da empresa inválido".into(),
            Self::InvalidCode(_) => "Código da proposta inválido".into(),
            Self::UnknownStatus(_) => "Status da proposta inválido".into(),
            Self::InvalidTransition { from, to } => {
                format!("Transição inválida de status ({from} -> {to})")
            }
            Self::RevisionInProgress => {
                "Enquanto a proposta estiver em revisão, use fechar ou cancelar revisão".into()
            }
            Self::ManualRevisionStatus => {
                "Status em revisão só pode ser iniciado pelo botão Criar nova revisão".into()
            }
            Self::MissingOutcomeReason(_) => {
                "Motivo é obrigatório para propostas perdidas ou canceladas".into()
            }
            Self::FinalStatus(_) => "Proposta finalizada não pode ser alterada".into(),
            Self::NotUnderRevision(_) => "A proposta não está em revisão".into(),
            Self::RevisionCyclePending => "Já existe um ciclo de revisão pendente".into(),
            Self::NoPendingRevisionCycle => "Não há ciclo de revisão pendente".into(),
            Self::MissingBaseRevision => {
                "Proposta sem revisão base para iniciar novo ciclo".into()
            }
            Self::Blank(field) => format!("Campo obrigatório: {field}"),
            Self::DocumentExtension(_) => {
                "Documento da proposta deve ter extensão DOC, DOCX ou PDF".into()
            }
            Self::DocumentName { revision_number } => format!(
                "Nome do arquivo deve conter o código da proposta e a revisão R{revision_number}"
            ),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProposalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("proposal code {0} is already taken")]
    DuplicateCode(String),
    #[error("proposal {id} is no longer {expected}")]
    StaleStatus { id: String, expected: ProposalStatus },
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encoding(String),
    #[error("failed to decode record: {0}")]
    Decoding(#[from] minicbor::decode::Error),
    #[error("failed to generate identifier: {0}")]
    Identifier(String),
}

impl ProposalError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.code(),
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DuplicateCode(_) => "DUPLICATE_CODE",
            Self::StaleStatus { .. } => "CONFLICT",
            Self::Storage(_) | Self::Encoding(_) | Self::Decoding(_) => "STORAGE_ERROR",
            Self::Identifier(_) => "INTERNAL_ERROR",
        }
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for ProposalError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        Self::Encoding(value.to_string())
    }
}

pub type Result<T, E = ProposalError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_share_one_code() {
        assert_eq!(ValidationError::InvalidYear(1999).code(), "VALIDATION_ERROR");
        assert_eq!(
            ProposalError::from(ValidationError::InvalidSequence(0)).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(ProposalError::not_found("proposal", "x").code(), "NOT_FOUND");
    }

    #[test]
    fn user_messages_follow_product_wording() {
        assert_eq!(
            ValidationError::InvalidYear(1999).user_message(),
            "Ano da proposta inválido"
        );
        let err = ValidationError::InvalidTransition {
            from: ProposalStatus::Ganha,
            to: ProposalStatus::Enviada,
        };
        assert_eq!(
            err.user_message(),
            "Transição inválida de status (ganha -> enviada)"
        );
    }
}
