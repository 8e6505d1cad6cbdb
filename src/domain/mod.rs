//! Domain layer - Core business types.
//!
//! Pure types for the MeroShare bulk bot: account identities, portal
//! records, and the closed failure taxonomy. No I/O here; everything is
//! serializable and testable in isolation.

pub mod account;
pub mod issue;
pub mod outcome;

// Re-export core types for convenience
pub use account::AccountCredentials;
pub use issue::{
    ApplicableIssue, ApplicationForm, ApplicationReport, ApplicationSummary,
    BankDetail, BankRef, ShareHolding,
};
pub use outcome::{ApplyOutcome, FailureKind};
