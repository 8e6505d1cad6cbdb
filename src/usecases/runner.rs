//! Bulk Runner - One Operation Across Many Accounts
//!
//! Drives exactly one operation per enabled account record and emits
//! one output row per account (or per issue/holding). Rows are
//! independent: one account's failure never aborts the rest of the
//! batch. Sequential by default, with optional bounded fan-out since
//! sessions share nothing but the read-only capital directory.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::adapters::capital::CapitalDirectory;
use crate::adapters::sheet::{AccountRecord, ResultSheet};
use crate::config::RunnerConfig;
use crate::ports::portal::PortalApi;
use crate::usecases::session::{AccountSession, SessionTuning};

/// One of the portal workflows the runner can drive.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Login only; the row reports the portal's greeting or the failure.
    CheckAccountStatus,
    /// Current holdings, one row per held scrip.
    ListShares,
    /// Currently applicable issues, one row per issue.
    ListApplicableIssues,
    /// Subscribe `kitta` units of the issue matching `scrip`.
    Apply { scrip: String, kitta: u32 },
    /// Status of a past application for `scrip`.
    ApplicationStatus { scrip: String },
}

impl Operation {
    /// Output column set, matching the original workbook layouts.
    pub fn headers(&self) -> Vec<&'static str> {
        match self {
            Self::CheckAccountStatus => vec!["Client ID", "Name", "Demat", "Status"],
            Self::ListShares => vec![
                "Client ID",
                "Name",
                "DMAT No",
                "Script",
                "Current Balance",
                "Free Balance",
            ],
            Self::ListApplicableIssues => vec![
                "Client ID",
                "Name",
                "Demat",
                "Script",
                "Share Group",
                "Type",
                "Reservation Type",
            ],
            Self::Apply { .. } => vec!["Client ID", "Name", "Demat", "Script", "Application"],
            Self::ApplicationStatus { .. } => {
                vec!["Client ID", "Name", "Demat", "Scrip", "Status"]
            }
        }
    }

    /// Whether the sheet's second enable flag gates this operation.
    fn needs_transactable(&self) -> bool {
        matches!(
            self,
            Self::ListApplicableIssues | Self::Apply { .. } | Self::ApplicationStatus { .. }
        )
    }
}

/// Account pacing and fan-out bounds, sourced from config.
#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    /// 1 = fully sequential (the observed baseline).
    pub parallel_accounts: usize,
    /// Pause between accounts when running sequentially.
    pub pause_between_accounts: Duration,
}

impl RunnerSettings {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            parallel_accounts: config.parallel_accounts,
            pause_between_accounts: Duration::from_millis(config.pause_between_accounts_ms),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            parallel_accounts: 1,
            pause_between_accounts: Duration::from_millis(200),
        }
    }
}

/// Runs one operation across a batch of accounts.
pub struct BulkRunner<P> {
    portal: Arc<P>,
    directory: Arc<CapitalDirectory<P>>,
    tuning: SessionTuning,
    settings: RunnerSettings,
}

impl<P: PortalApi + 'static> BulkRunner<P> {
    pub fn new(
        portal: Arc<P>,
        directory: Arc<CapitalDirectory<P>>,
        tuning: SessionTuning,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            portal,
            directory,
            tuning,
            settings,
        }
    }

    /// Drive `operation` for every eligible account and collect the
    /// result table. Account order is preserved in the output.
    pub async fn run(&self, accounts: &[AccountRecord], operation: &Operation) -> ResultSheet {
        let mut sheet = ResultSheet::new(operation.headers());

        let eligible: Vec<AccountRecord> = accounts
            .iter()
            .filter(|a| a.enabled && (a.transactable || !operation.needs_transactable()))
            .cloned()
            .collect();
        if eligible.len() < accounts.len() {
            info!(
                skipped = accounts.len() - eligible.len(),
                "accounts disabled by sheet flags"
            );
        }

        if self.settings.parallel_accounts <= 1 {
            for (index, account) in eligible.into_iter().enumerate() {
                if index > 0 && !self.settings.pause_between_accounts.is_zero() {
                    sleep(self.settings.pause_between_accounts).await;
                }
                let rows = run_account(
                    Arc::clone(&self.portal),
                    Arc::clone(&self.directory),
                    self.tuning,
                    account,
                    operation.clone(),
                )
                .await;
                sheet.rows.extend(rows);
            }
        } else {
            let semaphore = Arc::new(Semaphore::new(self.settings.parallel_accounts));
            let mut handles = Vec::with_capacity(eligible.len());
            for account in eligible {
                let semaphore = Arc::clone(&semaphore);
                let portal = Arc::clone(&self.portal);
                let directory = Arc::clone(&self.directory);
                let tuning = self.tuning;
                let operation = operation.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    run_account(portal, directory, tuning, account, operation).await
                }));
            }
            for handle in handles {
                match handle.await {
                    Ok(rows) => sheet.rows.extend(rows),
                    Err(e) => warn!(error = %e, "account task failed"),
                }
            }
        }

        info!(rows = sheet.rows.len(), "batch finished");
        sheet
    }
}

/// One account, one fresh session, one operation, its output rows.
async fn run_account<P: PortalApi>(
    portal: Arc<P>,
    directory: Arc<CapitalDirectory<P>>,
    tuning: SessionTuning,
    account: AccountRecord,
    operation: Operation,
) -> Vec<Vec<String>> {
    let client_id = account.client_id;
    let name = account.credentials.name.clone();
    let demat = account.credentials.demat();

    let mut session = AccountSession::new(portal, directory, account.credentials, tuning);
    let logged_in = session.login().await;

    match operation {
        Operation::CheckAccountStatus => {
            vec![vec![client_id, name, demat, session.status().to_string()]]
        }
        Operation::ListShares => {
            let holdings = if logged_in {
                session.share_list().await
            } else {
                Vec::new()
            };
            if holdings.is_empty() {
                vec![vec![
                    client_id,
                    name,
                    demat,
                    session.status().to_string(),
                    "0".to_string(),
                    "0".to_string(),
                ]]
            } else {
                holdings
                    .into_iter()
                    .map(|h| {
                        vec![
                            client_id.clone(),
                            name.clone(),
                            demat.clone(),
                            h.script,
                            h.current_balance.to_string(),
                            h.free_balance.to_string(),
                        ]
                    })
                    .collect()
            }
        }
        Operation::ListApplicableIssues => {
            let issues = if logged_in {
                session.applicable_issues().await
            } else {
                Vec::new()
            };
            if issues.is_empty() {
                vec![vec![
                    client_id,
                    name,
                    demat,
                    session.status().to_string(),
                    "NA".to_string(),
                    "NA".to_string(),
                    "NA".to_string(),
                ]]
            } else {
                issues
                    .into_iter()
                    .map(|issue| {
                        vec![
                            client_id.clone(),
                            name.clone(),
                            demat.clone(),
                            issue.scrip,
                            issue.share_group_name.unwrap_or_else(|| "NA".to_string()),
                            issue.share_type_name.unwrap_or_else(|| "NA".to_string()),
                            issue
                                .reservation_type_name
                                .unwrap_or_else(|| "NA".to_string()),
                        ]
                    })
                    .collect()
            }
        }
        Operation::Apply { scrip, kitta } => {
            if logged_in {
                session.apply(&scrip, kitta).await;
            }
            vec![vec![client_id, name, demat, scrip, session.status().to_string()]]
        }
        Operation::ApplicationStatus { scrip } => {
            if logged_in {
                session.application_status(&scrip).await;
            }
            vec![vec![client_id, name, demat, scrip, session.status().to_string()]]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_per_operation() {
        assert_eq!(
            Operation::CheckAccountStatus.headers(),
            vec!["Client ID", "Name", "Demat", "Status"]
        );
        assert_eq!(Operation::ListShares.headers().len(), 6);
        assert_eq!(Operation::ListApplicableIssues.headers().len(), 7);
    }

    #[test]
    fn test_transactable_gate() {
        assert!(!Operation::CheckAccountStatus.needs_transactable());
        assert!(!Operation::ListShares.needs_transactable());
        assert!(Operation::ListApplicableIssues.needs_transactable());
        assert!(
            Operation::Apply {
                scrip: "NFS".to_string(),
                kitta: 10
            }
            .needs_transactable()
        );
    }

    #[test]
    fn test_default_runner_is_sequential() {
        let settings = RunnerSettings::default();
        assert_eq!(settings.parallel_accounts, 1);
    }
}
