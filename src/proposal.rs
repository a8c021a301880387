//! Customer, proposal and revision records
use crate::status::ProposalStatus;
use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    /// `None` when the fields do not name a valid UTC instant.
    pub fn new_with(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self::from)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub slug: String, // lower-case display slug, see [`crate::slug`]
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub customer_id: String,
    #[n(2)]
    pub code: String,
    #[n(3)]
    pub seq_number: u64,
    #[n(4)]
    pub year: i32,
    #[n(5)]
    pub invitation_code: Option<String>,
    #[n(6)]
    pub project_name: String,
    #[n(7)]
    pub scope_description: String,
    #[n(8)]
    pub status: ProposalStatus,
    #[n(9)]
    pub due_date: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub estimated_value_cents: Option<u64>, // BRL centavos
    #[n(11)]
    pub final_value_cents: Option<u64>,
    #[n(12)]
    pub outcome_reason: Option<String>,
    #[n(13)]
    pub created_by: String,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
    #[n(15)]
    pub updated_at: TimeStamp<Utc>,
}

impl Proposal {
    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ProposalRevision {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub proposal_id: String,
    #[n(2)]
    pub revision_number: u32, // 0 is the base revision created with the proposal
    #[n(3)]
    pub reason: Option<String>,
    #[n(4)]
    pub scope_changes: Option<String>,
    #[n(5)]
    pub discount_cents: Option<u64>,
    #[n(6)]
    pub value_before_cents: Option<u64>,
    #[n(7)]
    pub value_after_cents: Option<u64>,
    #[n(8)]
    pub notes: Option<String>,
    #[n(9)]
    pub created_by: String,
    #[n(10)]
    pub created_at: TimeStamp<Utc>,
}

/// Fields written on a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: ProposalStatus,
    pub outcome_reason: Option<String>,
    pub final_value_cents: Option<u64>,
}

impl StatusChange {
    pub fn to(status: ProposalStatus) -> Self {
        Self {
            status,
            outcome_reason: None,
            final_value_cents: None,
        }
    }
}

/// Editable descriptive fields of a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseFields {
    pub project_name: String,
    pub invitation_code: Option<String>,
    pub scope_description: String,
    pub due_date: Option<TimeStamp<Utc>>,
    pub estimated_value_cents: Option<u64>,
}

impl BaseFields {
    pub fn of(proposal: &Proposal) -> Self {
        Self {
            project_name: proposal.project_name.clone(),
            invitation_code: proposal.invitation_code.clone(),
            scope_description: proposal.scope_description.clone(),
            due_date: proposal.due_date.clone(),
            estimated_value_cents: proposal.estimated_value_cents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn timestamp_from_fields() {
        let due = TimeStamp::new_with(2026, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(due.to_datetime_utc().to_rfc3339(), "2026-03-01T12:30:00+00:00");

        assert_eq!(TimeStamp::new_with(2026, 2, 30, 0, 0, 0), None);
        assert_eq!(TimeStamp::new_with(2026, 1, 1, 24, 0, 0), None);
    }

    #[test]
    fn proposal_encoding() {
        let proposal = Proposal {
            id: "proposal_1abc".into(),
            customer_id: "customer_1abc".into(),
            code: "BV-EGIS-2026-BIM-001".into(),
            seq_number: 1,
            year: 2026,
            invitation_code: None,
            project_name: "Hospital Regional".into(),
            scope_description: "Modelagem BIM".into(),
            status: ProposalStatus::EmRevisao,
            due_date: TimeStamp::new_with(2026, 3, 1, 0, 0, 0),
            estimated_value_cents: Some(12_500_000),
            final_value_cents: None,
            outcome_reason: None,
            created_by: "user_1abc".into(),
            created_at: TimeStamp::new(),
            updated_at: TimeStamp::new(),
        };

        let encoding = minicbor::to_vec(&proposal).unwrap();
        let decode: Proposal = minicbor::decode(&encoding).unwrap();

        assert_eq!(proposal, decode);
        assert!(!decode.is_final());
    }
}
