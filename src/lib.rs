//! Commercial proposal lifecycle: code assignment, status transitions and
//! revision cycles over a sled store.
//!
//! The pure core lives in [`code`] and [`status`]; [`service`] composes it
//! with the persistence ports in [`repository`].

pub mod activity;
pub mod code;
pub mod config;
pub mod error;
pub mod proposal;
pub mod repository;
pub mod service;
pub mod slug;
pub mod status;
pub mod store;
pub mod telemetry;
pub mod utils;

pub use code::{ProposalCode, build_proposal_code, normalize_for_code};
pub use error::{ProposalError, ValidationError};
pub use status::{ProposalStatus, is_final_status, is_valid_proposal_status_transition};
