//! Wire payloads and response envelopes for the portal endpoints.
//!
//! Search payloads reproduce the portal's filter-parameter shape
//! verbatim; the filter keys are part of the external contract and the
//! backend rejects searches without them.

use serde::Deserialize;
use serde_json::{json, Value};

/// Paged search responses wrap their rows in an `object` array.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ObjectPage<T> {
    #[serde(default)]
    pub object: Vec<T>,
}

/// The holdings endpoint uses its own envelope key.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct HoldingsPage<T> {
    #[serde(rename = "meroShareDematShare", default)]
    pub holdings: Vec<T>,
}

/// Bank-detail rows as the portal returns them (an array; the first
/// element is the account actually registered for applications).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankBranchEntry {
    pub account_branch_id: u64,
    pub account_number: String,
    pub account_type_id: u64,
    /// Customer id on the wire.
    pub id: u64,
}

/// Body of the credential exchange.
pub fn auth_payload(capital_id: u32, username: &str, password: &str) -> Value {
    json!({
        "clientId": capital_id,
        "username": username,
        "password": password,
    })
}

/// Search body for currently applicable issues.
pub fn issue_search_payload(page_size: u32) -> Value {
    json!({
        "filterFieldParams": [
            { "key": "companyIssue.companyISIN.script", "alias": "Scrip" },
            { "key": "companyIssue.companyISIN.company.name", "alias": "Company Name" },
            { "key": "companyIssue.assignedToClient.name", "value": "", "alias": "Issue Manager" },
        ],
        "page": 1,
        "size": page_size,
        "searchRoleViewConstants": "VIEW_APPLICABLE_SHARE",
        "filterDateParams": [
            { "key": "minIssueOpenDate", "condition": "", "alias": "", "value": "" },
            { "key": "maxIssueCloseDate", "condition": "", "alias": "", "value": "" },
        ],
    })
}

/// Search body for the account's completed applications.
pub fn application_search_payload(page_size: u32) -> Value {
    json!({
        "filterFieldParams": [
            { "key": "companyShare.companyIssue.companyISIN.script", "alias": "Scrip" },
            { "key": "companyShare.companyIssue.companyISIN.company.name", "alias": "Company Name" },
        ],
        "page": 1,
        "size": page_size,
        "searchRoleViewConstants": "VIEW_APPLICANT_FORM_COMPLETE",
        "filterDateParams": [
            { "key": "appliedDate", "condition": "", "alias": "", "value": "" },
            { "key": "appliedDate", "condition": "", "alias": "", "value": "" },
        ],
    })
}

/// Query body for the holdings list of one demat account.
pub fn holdings_payload(demat: &str, client_code: &str, page_size: u32) -> Value {
    json!({
        "sortBy": "CCY_SHORT_NAME",
        "demat": [demat],
        "clientCode": client_code,
        "page": 1,
        "size": page_size,
        "sortAsc": "true",
    })
}
