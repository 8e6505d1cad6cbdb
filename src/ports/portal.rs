//! Portal Port - The Fixed MeroShare Endpoint Set
//!
//! One async trait covering every endpoint the bot talks to. The exact
//! request/response shapes are dictated by the portal; this trait
//! exposes them as typed records and keeps reqwest out of the usecases.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::issue::{
    ApplicableIssue, ApplicationForm, ApplicationReport, ApplicationSummary,
    BankDetail, BankRef, ShareHolding,
};

/// Transport-level failure talking to the portal.
///
/// All variants belong to the transient class of the failure taxonomy:
/// retryable on idempotent reads, reported otherwise.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Connection, TLS, or timeout failure before a response arrived.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    /// The portal answered with an unexpected HTTP status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Successful authentication: the bearer token plus the portal's own
/// greeting message (which becomes the session status).
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub token: String,
    pub message: String,
}

/// One row of the capital table: participant code → portal-internal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapitalEntry {
    pub code: String,
    pub id: u32,
}

/// Definitive answer from the share-apply submission endpoint.
///
/// Non-201 answers are data, not errors: the caller must never retry
/// a submission that got a definitive response.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub accepted: bool,
    pub status: u16,
    pub message: String,
}

/// The fixed set of JSON-over-HTTPS endpoints on the depository portal.
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// POST the credential exchange. 200 yields a bearer token from the
    /// `Authorization` response header; anything else is a `Status` error
    /// carrying the portal's message.
    async fn authenticate(
        &self,
        capital_id: u32,
        username: &str,
        password: &str,
    ) -> Result<AuthGrant, PortalError>;

    /// Fetch the full participant-code → capital-id table.
    async fn capital_list(&self) -> Result<Vec<CapitalEntry>, PortalError>;

    /// Search currently applicable share issues (one page).
    async fn applicable_issues(
        &self,
        token: &str,
        page_size: u32,
    ) -> Result<Vec<ApplicableIssue>, PortalError>;

    /// The account's registered banks.
    async fn bank_list(&self, token: &str) -> Result<Vec<BankRef>, PortalError>;

    /// Branch/account/customer details for one bank id.
    async fn bank_detail(&self, token: &str, bank_id: u64) -> Result<BankDetail, PortalError>;

    /// Submit a subscription form. Returns a receipt for any definitive
    /// HTTP answer; only transport failures are `Err`.
    async fn submit_application(
        &self,
        token: &str,
        form: &ApplicationForm,
    ) -> Result<SubmissionReceipt, PortalError>;

    /// Search the account's recent applications (one page).
    async fn application_search(
        &self,
        token: &str,
        page_size: u32,
    ) -> Result<Vec<ApplicationSummary>, PortalError>;

    /// Detail record for one applicant form.
    async fn application_detail(
        &self,
        token: &str,
        form_id: u64,
    ) -> Result<ApplicationReport, PortalError>;

    /// Current holdings for one demat account (one page).
    async fn holdings(
        &self,
        token: &str,
        demat: &str,
        client_code: &str,
        page_size: u32,
    ) -> Result<Vec<ShareHolding>, PortalError>;
}
