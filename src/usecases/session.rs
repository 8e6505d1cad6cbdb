//! Account Session - The Per-Account State Machine
//!
//! One authenticated connection to the portal for one account:
//! `Unauthenticated -> Authenticated`, never back. A failed
//! authenticated call is reported through the status message and the
//! session stays nominally authenticated, mirroring the portal's habit
//! of not expiring tokens mid-run. Nothing here ever raises past the
//! account boundary; the worst outcome is a descriptive status string.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::adapters::capital::CapitalDirectory;
use crate::config::{ApiConfig, AppConfig};
use crate::domain::account::AccountCredentials;
use crate::domain::issue::{ApplicableIssue, ApplicationForm, ShareHolding};
use crate::domain::outcome::{ApplyOutcome, FailureKind};
use crate::ports::portal::{PortalApi, PortalError};
use crate::ports::retry::RetryPolicy;

/// Retry bounds and page sizes for one session, sourced from config.
///
/// The attempt ceilings differ per operation because the portal's
/// flakiness does: issue searches during an open window fail far more
/// often than logins.
#[derive(Debug, Clone, Copy)]
pub struct SessionTuning {
    pub login: RetryPolicy,
    pub issue_list: RetryPolicy,
    pub application_status: RetryPolicy,
    pub issue_page_size: u32,
    pub application_page_size: u32,
    pub holdings_page_size: u32,
}

impl SessionTuning {
    pub fn from_config(config: &AppConfig) -> Self {
        let retry = &config.retry;
        Self {
            login: RetryPolicy::idempotent(
                retry.login_attempts,
                Duration::from_millis(retry.login_delay_ms),
            ),
            issue_list: RetryPolicy::idempotent(
                retry.issue_list_attempts,
                Duration::from_millis(retry.issue_list_delay_ms),
            ),
            application_status: RetryPolicy::idempotent(
                retry.status_attempts,
                Duration::from_millis(retry.status_delay_ms),
            ),
            issue_page_size: config.api.issue_page_size,
            application_page_size: config.api.application_page_size,
            holdings_page_size: config.api.holdings_page_size,
        }
    }
}

impl Default for SessionTuning {
    fn default() -> Self {
        let api = ApiConfig::default();
        Self {
            login: RetryPolicy::idempotent(3, Duration::from_secs(3)),
            issue_list: RetryPolicy::idempotent(15, Duration::from_millis(100)),
            application_status: RetryPolicy::idempotent(20, Duration::from_millis(100)),
            issue_page_size: api.issue_page_size,
            application_page_size: api.application_page_size,
            holdings_page_size: api.holdings_page_size,
        }
    }
}

enum SessionState {
    Unauthenticated,
    Authenticated { token: String },
}

/// One account's session. Owned exclusively by that account's workflow
/// and discarded after its result row is produced.
pub struct AccountSession<P> {
    portal: Arc<P>,
    directory: Arc<CapitalDirectory<P>>,
    credentials: AccountCredentials,
    tuning: SessionTuning,
    state: SessionState,
    /// Resolved once, cached for the account's lifetime.
    capital_id: Option<u32>,
    /// Cached issue list, reused by `apply`.
    issues: Option<Vec<ApplicableIssue>>,
    /// Last-observed status; always set after any operation.
    status: String,
    last_failure: Option<FailureKind>,
}

impl<P: PortalApi> AccountSession<P> {
    pub fn new(
        portal: Arc<P>,
        directory: Arc<CapitalDirectory<P>>,
        credentials: AccountCredentials,
        tuning: SessionTuning,
    ) -> Self {
        Self {
            portal,
            directory,
            credentials,
            tuning,
            state: SessionState::Unauthenticated,
            capital_id: None,
            issues: None,
            status: "Not attempted".to_string(),
            last_failure: None,
        }
    }

    /// The human-readable result of the most recent operation.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Closed-taxonomy classification of the most recent failure.
    pub fn last_failure(&self) -> Option<FailureKind> {
        self.last_failure
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn credentials(&self) -> &AccountCredentials {
        &self.credentials
    }

    fn token(&self) -> Option<String> {
        match &self.state {
            SessionState::Authenticated { token } => Some(token.clone()),
            SessionState::Unauthenticated => None,
        }
    }

    fn set_failure(&mut self, kind: FailureKind, status: impl Into<String>) {
        self.status = status.into();
        self.last_failure = Some(kind);
    }

    /// Exchange credentials for a bearer token.
    ///
    /// Fails fast with zero network attempts when the participant code
    /// cannot be resolved to a capital id. Returns whether the session
    /// is now authenticated; callers must check before issuing
    /// authenticated calls.
    pub async fn login(&mut self) -> bool {
        if !self.credentials.has_login_fields() {
            self.set_failure(
                FailureKind::UnresolvableIdentity,
                "Username, password and DPID required",
            );
            return false;
        }

        let capital_id = match self.capital_id {
            Some(id) => id,
            None => match self.directory.resolve(&self.credentials.dpid).await {
                Ok(id) => {
                    self.capital_id = Some(id);
                    id
                }
                Err(e) => {
                    warn!(account = %self.credentials.name, error = %e, "capital id unresolved");
                    self.set_failure(FailureKind::UnresolvableIdentity, "Problem Finding Capital");
                    return false;
                }
            },
        };

        let policy = self.tuning.login;
        let result = policy
            .run(|| {
                self.portal.authenticate(
                    capital_id,
                    &self.credentials.username,
                    &self.credentials.password,
                )
            })
            .await;

        match result {
            Ok(grant) => {
                info!(account = %self.credentials.name, "logged in");
                self.status = grant.message;
                self.last_failure = None;
                self.state = SessionState::Authenticated { token: grant.token };
                true
            }
            Err(PortalError::Status { status, message }) => {
                warn!(account = %self.credentials.name, status, %message, "login refused");
                self.set_failure(FailureKind::Transient, message);
                false
            }
            Err(e) => {
                warn!(account = %self.credentials.name, error = %e, "login failed");
                self.set_failure(FailureKind::Transient, format!("Login failed! {e}"));
                false
            }
        }
    }

    /// Fetch (and cache) the list of currently applicable issues.
    ///
    /// Retry exhaustion degrades to an empty list plus a status rather
    /// than an error.
    pub async fn applicable_issues(&mut self) -> Vec<ApplicableIssue> {
        let Some(token) = self.token() else {
            self.set_failure(FailureKind::Transient, "Not logged in");
            return Vec::new();
        };
        if let Some(cached) = &self.issues {
            return cached.clone();
        }

        let policy = self.tuning.issue_list;
        let size = self.tuning.issue_page_size;
        match policy
            .run(|| self.portal.applicable_issues(&token, size))
            .await
        {
            Ok(issues) => {
                info!(
                    account = %self.credentials.name,
                    count = issues.len(),
                    "applicable issues obtained"
                );
                self.status = "Applicable issues obtained".to_string();
                self.last_failure = None;
                self.issues = Some(issues.clone());
                issues
            }
            Err(e) => {
                warn!(account = %self.credentials.name, error = %e, "applicable issue search failed");
                self.set_failure(
                    FailureKind::Transient,
                    format!("Applicable issues request failed! {e}"),
                );
                Vec::new()
            }
        }
    }

    /// Match `scrip` against the applicable issues and submit a
    /// subscription for `kitta` units.
    ///
    /// The submission itself is sent at most once per invocation; every
    /// earlier exit is a remote no-op.
    pub async fn apply(&mut self, scrip: &str, kitta: u32) -> ApplyOutcome {
        let Some(token) = self.token() else {
            return self.finish_apply(ApplyOutcome::NotAuthenticated);
        };

        if self.issues.is_none() {
            self.applicable_issues().await;
        }
        let Some(issues) = self.issues.clone() else {
            return self.finish_apply(ApplyOutcome::Failed {
                message: "applicable issue list unavailable".to_string(),
            });
        };

        let Some(issue) = issues.iter().find(|i| i.scrip == scrip) else {
            return self.finish_apply(ApplyOutcome::NoMatchingIssue);
        };
        if let Some(action) = issue.blocking_action() {
            return self.finish_apply(ApplyOutcome::NotOpen {
                action: action.to_string(),
            });
        }

        let banks = match self.portal.bank_list(&token).await {
            Ok(banks) => banks,
            Err(e) => {
                return self.finish_apply(ApplyOutcome::Failed {
                    message: e.to_string(),
                });
            }
        };
        let Some(bank_id) = banks
            .iter()
            .find(|b| b.name == self.credentials.bank)
            .map(|b| b.id)
        else {
            return self.finish_apply(ApplyOutcome::BankNotFound);
        };

        let detail = match self.portal.bank_detail(&token, bank_id).await {
            Ok(detail) => detail,
            Err(e) => {
                return self.finish_apply(ApplyOutcome::Failed {
                    message: e.to_string(),
                });
            }
        };

        let form = ApplicationForm {
            account_branch_id: detail.branch_id,
            account_number: detail.account_number.clone(),
            account_type_id: detail.account_type_id,
            applied_kitta: kitta,
            bank_id: detail.bank_id,
            boid: self.credentials.boid(),
            company_share_id: issue.company_share_id,
            crn_number: self.credentials.crn.clone(),
            customer_id: detail.customer_id,
            demat: self.credentials.demat(),
            transaction_pin: self.credentials.pin.clone(),
        };

        // Exactly one submission attempt, even on a transport failure:
        // a duplicate subscription is worse than a missed one.
        let receipt = RetryPolicy::submit_once()
            .run(|| self.portal.submit_application(&token, &form))
            .await;

        let outcome = match receipt {
            Ok(r) if r.accepted => ApplyOutcome::Applied {
                kitta,
                message: r.message,
            },
            Ok(r) => ApplyOutcome::Rejected {
                status: if r.message.is_empty() {
                    format!("HTTP {}", r.status)
                } else {
                    format!("HTTP {}: {}", r.status, r.message)
                },
            },
            Err(e) => ApplyOutcome::Rejected {
                status: e.to_string(),
            },
        };
        self.finish_apply(outcome)
    }

    fn finish_apply(&mut self, outcome: ApplyOutcome) -> ApplyOutcome {
        self.status = outcome.status_line();
        self.last_failure = outcome.failure_kind();
        if self.last_failure.is_none() {
            info!(account = %self.credentials.name, status = %self.status, "application submitted");
        } else {
            warn!(account = %self.credentials.name, status = %self.status, "apply did not go through");
        }
        outcome
    }

    /// Look up the status of a past application for `scrip`.
    ///
    /// Two independent retry loops: the search and the detail fetch. A
    /// detail failure never re-runs the search.
    pub async fn application_status(&mut self, scrip: &str) -> String {
        let Some(token) = self.token() else {
            self.set_failure(FailureKind::Transient, "Not logged in");
            return self.status.clone();
        };

        let policy = self.tuning.application_status;
        let size = self.tuning.application_page_size;
        let summaries = match policy
            .run(|| self.portal.application_search(&token, size))
            .await
        {
            Ok(summaries) => summaries,
            Err(e) => {
                warn!(account = %self.credentials.name, error = %e, "application search failed");
                self.set_failure(FailureKind::Transient, "Application status request failed");
                return self.status.clone();
            }
        };

        let Some(target) = summaries.iter().find(|s| s.scrip == scrip) else {
            self.set_failure(FailureKind::BusinessRule, "Script not found");
            return self.status.clone();
        };

        let form_id = target.applicant_form_id;
        match policy
            .run(|| self.portal.application_detail(&token, form_id))
            .await
        {
            Ok(report) => {
                info!(account = %self.credentials.name, status = %report.status_name, "application status");
                self.status = report.status_name;
                self.last_failure = None;
            }
            Err(e) => {
                warn!(account = %self.credentials.name, error = %e, "report fetch failed");
                self.set_failure(FailureKind::Transient, "Report request failed");
            }
        }
        self.status.clone()
    }

    /// Fetch current holdings for the account's demat number.
    ///
    /// A listing read is idempotent and cheap to simply fail: one
    /// attempt, empty result plus a status on any failure.
    pub async fn share_list(&mut self) -> Vec<ShareHolding> {
        let Some(token) = self.token() else {
            self.set_failure(FailureKind::Transient, "Not logged in");
            return Vec::new();
        };

        let demat = self.credentials.demat();
        match self
            .portal
            .holdings(
                &token,
                &demat,
                &self.credentials.dpid,
                self.tuning.holdings_page_size,
            )
            .await
        {
            Ok(holdings) => {
                info!(
                    account = %self.credentials.name,
                    holdings = holdings.len(),
                    "share list obtained"
                );
                self.status = "Share list obtained".to_string();
                self.last_failure = None;
                holdings
            }
            Err(e) => {
                warn!(account = %self.credentials.name, error = %e, "share list failed");
                self.set_failure(FailureKind::Transient, "Error Getting MyShare List");
                Vec::new()
            }
        }
    }
}
