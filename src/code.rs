//! Proposal code assignment: `BV-<SLUG>-<YEAR>-BIM-<SEQ>`
use crate::error::ValidationError;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;
/// Minimum width of the zero padded sequence. Wider sequences are never truncated.
pub const SEQUENCE_WIDTH: usize = 3;

const PREFIX: &str = "BV";
const INFIX: &str = "BIM";

/// Combining Diacritical Marks block, left behind by NFD.
pub(crate) fn is_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Strips diacritics and everything outside `[A-Za-z0-9]`, then upper-cases.
pub fn normalize_for_code(raw: &str) -> String {
    raw.nfd()
        .filter(|c| !is_diacritic(*c))
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Renders the canonical code. The sequence must already be allocated.
pub fn build_proposal_code(
    customer_slug: &str,
    year: i32,
    sequence: i64,
) -> Result<String, ValidationError> {
    ProposalCode::new(customer_slug, year, sequence).map(|code| code.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProposalCode {
    slug: String,
    year: i32,
    sequence: u64,
}

impl ProposalCode {
    pub fn new(customer_slug: &str, year: i32, sequence: i64) -> Result<Self, ValidationError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(ValidationError::InvalidYear(year));
        }
        if sequence <= 0 {
            return Err(ValidationError::InvalidSequence(sequence));
        }

        let slug = normalize_for_code(customer_slug);
        if slug.is_empty() {
            return Err(ValidationError::EmptySlug {
                kind: crate::error::SlugKind::Customer,
            });
        }

        Ok(Self {
            slug,
            year,
            sequence: sequence as u64,
        })
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }
    pub fn year(&self) -> i32 {
        self.year
    }
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl std::fmt::Display for ProposalCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{PREFIX}-{}-{}-{INFIX}-{:0width$}",
            self.slug,
            self.year,
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

impl FromStr for ProposalCode {
    type Err = ValidationError;

    /// Accepts only the exact canonical rendering of a code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidCode(s.to_string());

        let parts: Vec<&str> = s.split('-').collect();
        let [prefix, slug, year, infix, sequence] = parts.as_slice() else {
            return Err(invalid());
        };
        if *prefix != PREFIX || *infix != INFIX {
            return Err(invalid());
        }
        if !year.bytes().all(|b| b.is_ascii_digit()) || !sequence.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let sequence: i64 = sequence.parse().map_err(|_| invalid())?;
        let code = ProposalCode::new(slug, year, sequence).map_err(|_| invalid())?;

        if code.to_string() != s {
            return Err(invalid());
        }
        Ok(code)
    }
}
