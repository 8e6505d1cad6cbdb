//! Portal-facing records.
//!
//! Wire-shaped types for offerings, banks, holdings, and applications.
//! Field names follow the portal's camelCase JSON contract — the remote
//! shapes are a versioned external contract the client adapts to.

use serde::{Deserialize, Serialize};

/// One currently open (or recently open) share issue.
///
/// Immutable once fetched. A non-empty `action` means the issue is not
/// currently open for subscription (window closed, already applied, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicableIssue {
    /// Portal-internal share id used in the subscription form.
    pub company_share_id: u64,
    /// Ticker symbol ("scrip").
    pub scrip: String,
    #[serde(default)]
    pub company_name: Option<String>,
    /// Present when the issue cannot be applied for right now.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub share_group_name: Option<String>,
    #[serde(default)]
    pub share_type_name: Option<String>,
    #[serde(default)]
    pub reservation_type_name: Option<String>,
}

impl ApplicableIssue {
    /// The reason this issue is blocked, if any.
    ///
    /// An empty-string action counts as open, matching the portal's
    /// habit of sending `""` for appliable issues.
    pub fn blocking_action(&self) -> Option<&str> {
        self.action.as_deref().filter(|a| !a.is_empty())
    }
}

/// A bank as listed by the portal's bank index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankRef {
    pub id: u64,
    pub name: String,
}

/// Registered bank account details, resolved per apply call.
///
/// Never cached across calls; the portal is free to change them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetail {
    pub bank_id: u64,
    pub branch_id: u64,
    pub account_number: String,
    pub account_type_id: u64,
    pub customer_id: u64,
}

/// The subscription request body for the share-apply endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationForm {
    pub account_branch_id: u64,
    pub account_number: String,
    pub account_type_id: u64,
    pub applied_kitta: u32,
    pub bank_id: u64,
    pub boid: String,
    pub company_share_id: u64,
    pub crn_number: String,
    pub customer_id: u64,
    pub demat: String,
    #[serde(rename = "transactionPIN")]
    pub transaction_pin: String,
}

/// One holding row from the portal's share list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareHolding {
    /// Ticker symbol.
    pub script: String,
    #[serde(default)]
    pub current_balance: f64,
    #[serde(default)]
    pub free_balance: f64,
}

/// Summary row from the recent-applications search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub applicant_form_id: u64,
    pub scrip: String,
}

/// Detail record for a single past application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationReport {
    /// Human-readable status, e.g. "Alloted" or "Not Alloted".
    pub status_name: String,
}
