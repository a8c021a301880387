//! Display slugs for customers and companies, e.g. `egis-engenharia`
use crate::code::is_diacritic;
use crate::error::{SlugKind, ValidationError};
use unicode_normalization::UnicodeNormalization;

/// Lower-case, with each run of other characters collapsed into a single `-`.
pub fn normalize_slug(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in value.nfd().filter(|c| !is_diacritic(*c)) {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub fn build_customer_slug(value: &str) -> Result<String, ValidationError> {
    build_slug(value, SlugKind::Customer)
}

pub fn build_company_slug(value: &str) -> Result<String, ValidationError> {
    build_slug(value, SlugKind::Company)
}

fn build_slug(value: &str, kind: SlugKind) -> Result<String, ValidationError> {
    let slug = normalize_slug(value);
    if slug.is_empty() {
        return Err(ValidationError::EmptySlug { kind });
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_collapse_separators() {
        assert_eq!(normalize_slug("Égís Engenharia"), "egis-engenharia");
        assert_eq!(normalize_slug("  --Acme   S/A--  "), "acme-s-a");
        assert_eq!(normalize_slug("Construtora Ñandú 2024"), "construtora-nandu-2024");
    }

    #[test]
    fn empty_slugs_are_rejected_per_kind() {
        assert_eq!(
            build_customer_slug("!!!"),
            Err(ValidationError::EmptySlug {
                kind: SlugKind::Customer
            })
        );
        assert_eq!(
            build_company_slug(""),
            Err(ValidationError::EmptySlug {
                kind: SlugKind::Company
            })
        );
        assert_eq!(build_company_slug("Vale S.A.").unwrap(), "vale-s-a");
    }
}
