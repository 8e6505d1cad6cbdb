//! Failure taxonomy and operation outcomes.
//!
//! Every per-account failure lands in one of four closed kinds, paired
//! with the human-readable status line that goes into the output row.
//! Statuses never propagate past the account boundary as errors.

use thiserror::Error;

/// Closed classification of everything that can go wrong for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// The participant code is not served by the portal. Terminal,
    /// never retried.
    #[error("unresolvable identity")]
    UnresolvableIdentity,
    /// Network / unexpected-shape / non-2xx on an idempotent read.
    /// Retried within bounds, then degrades to a reported status.
    #[error("transient failure")]
    Transient,
    /// Expected business condition (no matching issue, window closed,
    /// bank not found, ticker absent from history). Never retried.
    #[error("business rule")]
    BusinessRule,
    /// The subscription submission got a definitive non-201 answer.
    /// Terminal for the attempt; never silently repeated.
    #[error("submission rejected")]
    SubmissionRejected,
}

/// Result of one `apply()` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// HTTP 201 from the submission endpoint.
    Applied { kitta: u32, message: String },
    /// The ticker matched none of the applicable issues.
    NoMatchingIssue,
    /// The matched issue carries a blocking action (window closed,
    /// already applied, ...). No submission was attempted.
    NotOpen { action: String },
    /// The configured bank name is absent from the portal's bank list.
    BankNotFound,
    /// The session never authenticated.
    NotAuthenticated,
    /// A pre-submission read (issue list, bank list, bank detail) failed.
    Failed { message: String },
    /// The submission endpoint answered with something other than 201,
    /// or the single submission attempt failed in transit.
    Rejected { status: String },
}

impl ApplyOutcome {
    /// `None` means the application went through.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Applied { .. } => None,
            Self::NoMatchingIssue | Self::NotOpen { .. } | Self::BankNotFound => {
                Some(FailureKind::BusinessRule)
            }
            Self::NotAuthenticated | Self::Failed { .. } => Some(FailureKind::Transient),
            Self::Rejected { .. } => Some(FailureKind::SubmissionRejected),
        }
    }

    /// The status line recorded on the session and the output row.
    pub fn status_line(&self) -> String {
        match self {
            Self::Applied { kitta, .. } => format!("Successfully applied! {kitta} Kitta"),
            Self::NoMatchingIssue => "No matching applicable issues".to_string(),
            Self::NotOpen { action } => format!("Couldn't apply for issue! - {action}"),
            Self::BankNotFound => "Bank name not found.".to_string(),
            Self::NotAuthenticated => "Not logged in".to_string(),
            Self::Failed { message } => format!("Apply failed! {message}"),
            Self::Rejected { status } => format!("Apply failed! {status}"),
        }
    }
}
