//! Account identity.
//!
//! One `AccountCredentials` per sheet row. Immutable once constructed;
//! the demat number and BOID are derived, never stored.

use serde::{Deserialize, Serialize};

/// Immutable per-account identity supplied by the account sheet.
///
/// `dpid` is the depository participant code as the portal knows it
/// (the sheet stores it offset by 13,000,000; the sheet adapter strips
/// the offset before constructing this).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCredentials {
    /// Display name, used only for logging and output rows.
    pub name: String,
    /// Depository participant code.
    pub dpid: String,
    /// Numeric login username.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Caller-side reference id, echoed into every output row.
    pub client_id: String,
    /// Counterparty reference number for subscription submission.
    pub crn: String,
    /// Transaction PIN for subscription submission.
    pub pin: String,
    /// Registered bank name, matched against the portal's bank list.
    pub bank: String,
}

impl AccountCredentials {
    /// The dematerialized account identifier: `"130" + dpid + username`.
    pub fn demat(&self) -> String {
        format!("130{}{}", self.dpid, self.username)
    }

    /// Beneficiary Owner ID: the last 8 digits of the demat number.
    pub fn boid(&self) -> String {
        let demat = self.demat();
        let start = demat.len().saturating_sub(8);
        demat[start..].to_string()
    }

    /// Whether the fields required for a login attempt are all present.
    pub fn has_login_fields(&self) -> bool {
        !self.dpid.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }
}
