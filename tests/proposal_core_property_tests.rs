//! Property-based tests for code assignment and the status state machine
//!
//! The code assigner is a pure function of its inputs and the transition
//! table is fixed, so both are checked over generated inputs rather than
//! hand picked cases.

use proposal_lifecycle::{
    ProposalCode, ProposalStatus, ValidationError, build_proposal_code,
    is_valid_proposal_status_transition, normalize_for_code,
};
use proptest::prelude::*;
use std::collections::VecDeque;

// PROPERTY TEST STRATEGIES

/// Strategy to generate any status
fn status_strategy() -> impl Strategy<Value = ProposalStatus> {
    (0usize..ProposalStatus::ALL.len()).prop_map(|i| ProposalStatus::ALL[i])
}

/// Strategy to generate customer names with accents, spaces and punctuation
fn customer_name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9ÁÉÍÓÚáéíóúÇçÃãÕõÑñ &./-]{0,40}"
}

/// Strategy to generate years inside the accepted range
fn valid_year_strategy() -> impl Strategy<Value = i32> {
    2000i32..=2100
}

/// Strategy to generate positive sequences, including widths past three digits
fn sequence_strategy() -> impl Strategy<Value = i64> {
    1i64..=100_000
}

/// Shortest path length from `recebida` to a terminal status, following
/// legal single-step transitions.
fn steps_to_terminal(from: ProposalStatus) -> Option<usize> {
    let mut queue = VecDeque::from([(from, 0usize)]);
    let mut seen = vec![from];
    while let Some((status, depth)) = queue.pop_front() {
        if status.is_final() {
            return Some(depth);
        }
        for next in status.allowed_successors() {
            if !seen.contains(next) {
                seen.push(*next);
                queue.push_back((*next, depth + 1));
            }
        }
    }
    None
}

// PROPERTY TESTS
proptest! {
    /// Property: normalisation is idempotent
    #[test]
    fn prop_normalize_is_idempotent(raw in any::<String>()) {
        let once = normalize_for_code(&raw);
        prop_assert_eq!(normalize_for_code(&once), once);
    }

    /// Property: normalised output only ever holds upper-case ASCII letters and digits
    #[test]
    fn prop_normalized_is_code_safe(raw in customer_name_strategy()) {
        let normalized = normalize_for_code(&raw);
        prop_assert!(
            normalized.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
            "unexpected character in {:?}", normalized
        );
    }

    /// Property: the code is a deterministic function of its inputs and parses back
    #[test]
    fn prop_code_is_deterministic_and_parses_back(
        name in customer_name_strategy(),
        year in valid_year_strategy(),
        sequence in sequence_strategy(),
    ) {
        match build_proposal_code(&name, year, sequence) {
            Ok(code) => {
                prop_assert_eq!(&code, &build_proposal_code(&name, year, sequence).unwrap());
                let expected_prefix = format!("BV-{}-{}-BIM-", normalize_for_code(&name), year);
                prop_assert!(code.starts_with(&expected_prefix));

                let seq_part = &code[expected_prefix.len()..];
                prop_assert!(seq_part.len() >= 3);
                prop_assert_eq!(seq_part.parse::<i64>().unwrap(), sequence);

                let parsed: ProposalCode = code.parse().unwrap();
                prop_assert_eq!(parsed.year(), year);
                prop_assert_eq!(parsed.sequence(), sequence as u64);
            }
            Err(err) => {
                // only an empty slug can fail with valid numbers
                prop_assert!(normalize_for_code(&name).is_empty());
                prop_assert!(matches!(err, ValidationError::EmptySlug { .. }), "unexpected {:?}", err);
            }
        }
    }

    /// Property: years outside [2000, 2100] always fail
    #[test]
    fn prop_out_of_range_year_fails(
        year in prop_oneof![i32::MIN..2000, 2101..i32::MAX],
        sequence in sequence_strategy(),
    ) {
        prop_assert_eq!(
            build_proposal_code("EGIS", year, sequence),
            Err(ValidationError::InvalidYear(year))
        );
    }

    /// Property: non-positive sequences always fail
    #[test]
    fn prop_non_positive_sequence_fails(sequence in i64::MIN..=0, year in valid_year_strategy()) {
        prop_assert_eq!(
            build_proposal_code("EGIS", year, sequence),
            Err(ValidationError::InvalidSequence(sequence))
        );
    }

    /// Property: terminal statuses have no legal successor
    #[test]
    fn prop_terminal_statuses_are_locked(from in status_strategy(), to in status_strategy()) {
        if from.is_final() {
            prop_assert!(!is_valid_proposal_status_transition(from, to));
        }
    }

    /// Property: a random legal walk from recebida always stays inside the table
    /// and the remaining distance to a terminal status never exceeds 4
    #[test]
    fn prop_legal_walks_reach_terminal(choices in prop::collection::vec(any::<prop::sample::Index>(), 0..12)) {
        let mut status = ProposalStatus::INITIAL;
        for choice in choices {
            let successors = status.allowed_successors();
            if successors.is_empty() {
                break;
            }
            let next = successors[choice.index(successors.len())];
            prop_assert!(is_valid_proposal_status_transition(status, next));
            status = next;

            let remaining = steps_to_terminal(status);
            prop_assert!(matches!(remaining, Some(n) if n <= 4), "{} -> {:?}", status, remaining);
        }
    }
}

#[test]
fn every_reachable_status_is_within_four_steps_of_terminal() {
    for status in ProposalStatus::ALL {
        let steps = steps_to_terminal(status).unwrap();
        assert!(steps <= 4, "{status} needs {steps} steps");
    }
    assert_eq!(steps_to_terminal(ProposalStatus::Recebida), Some(1));
}
