//! Integration Tests - Session, Directory, and Runner Behavior
//!
//! Drives the per-account state machine against a mocked portal port.
//! Uses mockall for trait mocking and tokio::test for async tests; the
//! capital cache lives in a tempdir per test.

use std::sync::Arc;
use std::time::Duration;

use mockall::mock;
use mockall::predicate::*;

use meroshare_bulk_bot::adapters::capital::{CapitalDirectory, DirectoryError};
use meroshare_bulk_bot::adapters::sheet::AccountRecord;
use meroshare_bulk_bot::domain::account::AccountCredentials;
use meroshare_bulk_bot::domain::issue::{
    ApplicableIssue, ApplicationForm, ApplicationReport, ApplicationSummary, BankDetail, BankRef,
    ShareHolding,
};
use meroshare_bulk_bot::domain::outcome::{ApplyOutcome, FailureKind};
use meroshare_bulk_bot::ports::portal::{
    AuthGrant, CapitalEntry, PortalApi, PortalError, SubmissionReceipt,
};
use meroshare_bulk_bot::ports::retry::RetryPolicy;
use meroshare_bulk_bot::usecases::runner::{BulkRunner, Operation, RunnerSettings};
use meroshare_bulk_bot::usecases::session::{AccountSession, SessionTuning};

// ---- Mock Definitions ----

mock! {
    pub Portal {}

    #[async_trait::async_trait]
    impl PortalApi for Portal {
        async fn authenticate(
            &self,
            capital_id: u32,
            username: &str,
            password: &str,
        ) -> Result<AuthGrant, PortalError>;

        async fn capital_list(&self) -> Result<Vec<CapitalEntry>, PortalError>;

        async fn applicable_issues(
            &self,
            token: &str,
            page_size: u32,
        ) -> Result<Vec<ApplicableIssue>, PortalError>;

        async fn bank_list(&self, token: &str) -> Result<Vec<BankRef>, PortalError>;

        async fn bank_detail(&self, token: &str, bank_id: u64) -> Result<BankDetail, PortalError>;

        async fn submit_application(
            &self,
            token: &str,
            form: &ApplicationForm,
        ) -> Result<SubmissionReceipt, PortalError>;

        async fn application_search(
            &self,
            token: &str,
            page_size: u32,
        ) -> Result<Vec<ApplicationSummary>, PortalError>;

        async fn application_detail(
            &self,
            token: &str,
            form_id: u64,
        ) -> Result<ApplicationReport, PortalError>;

        async fn holdings(
            &self,
            token: &str,
            demat: &str,
            client_code: &str,
            page_size: u32,
        ) -> Result<Vec<ShareHolding>, PortalError>;
    }
}

// ---- Test Fixtures ----

fn credentials() -> AccountCredentials {
    AccountCredentials {
        name: "Test Account".to_string(),
        dpid: "12345".to_string(),
        username: "00012345".to_string(),
        password: "secret".to_string(),
        client_id: "1".to_string(),
        crn: "CRN-1".to_string(),
        pin: "1234".to_string(),
        bank: "XYZ Bank".to_string(),
    }
}

fn fast_tuning() -> SessionTuning {
    SessionTuning {
        login: RetryPolicy::idempotent(3, Duration::ZERO),
        issue_list: RetryPolicy::idempotent(2, Duration::ZERO),
        application_status: RetryPolicy::idempotent(2, Duration::ZERO),
        issue_page_size: 10,
        application_page_size: 200,
        holdings_page_size: 200,
    }
}

fn issue(scrip: &str, share_id: u64, action: Option<&str>) -> ApplicableIssue {
    ApplicableIssue {
        company_share_id: share_id,
        scrip: scrip.to_string(),
        company_name: None,
        action: action.map(str::to_string),
        share_group_name: Some("Ordinary Shares".to_string()),
        share_type_name: Some("IPO".to_string()),
        reservation_type_name: None,
    }
}

fn grant() -> AuthGrant {
    AuthGrant {
        token: "Bearer token-1".to_string(),
        message: "Welcome to MeroShare!".to_string(),
    }
}

/// A directory whose cache file already maps 12345 -> 123, so resolving
/// it needs no network call.
fn seeded_directory(portal: &Arc<MockPortal>) -> (tempfile::TempDir, Arc<CapitalDirectory<MockPortal>>) {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("capitals.json");
    std::fs::write(&cache, r#"[{"code":"12345","id":123}]"#).unwrap();
    let directory = Arc::new(CapitalDirectory::new(
        Arc::clone(portal),
        &cache,
        RetryPolicy::idempotent(2, Duration::ZERO),
    ));
    (dir, directory)
}

fn empty_directory(portal: &Arc<MockPortal>) -> (tempfile::TempDir, Arc<CapitalDirectory<MockPortal>>) {
    let dir = tempfile::tempdir().unwrap();
    let directory = Arc::new(CapitalDirectory::new(
        Arc::clone(portal),
        dir.path().join("capitals.json"),
        RetryPolicy::idempotent(2, Duration::ZERO),
    ));
    (dir, directory)
}

fn session(
    portal: Arc<MockPortal>,
    directory: Arc<CapitalDirectory<MockPortal>>,
) -> AccountSession<MockPortal> {
    AccountSession::new(portal, directory, credentials(), fast_tuning())
}

async fn logged_in_session(
    portal: MockPortal,
) -> (tempfile::TempDir, AccountSession<MockPortal>) {
    let portal = Arc::new(portal);
    let (dir, directory) = seeded_directory(&portal);
    let mut session = session(portal, directory);
    assert!(session.login().await);
    (dir, session)
}

// ---- Capital Directory ----

#[tokio::test]
async fn test_cached_code_resolves_without_network() {
    let mut portal = MockPortal::new();
    portal.expect_capital_list().never();
    let portal = Arc::new(portal);
    let (_dir, directory) = seeded_directory(&portal);

    assert_eq!(directory.resolve("12345").await.unwrap(), 123);
}

#[tokio::test]
async fn test_miss_triggers_exactly_one_refresh() {
    let mut portal = MockPortal::new();
    portal.expect_capital_list().times(1).returning(|| {
        Ok(vec![CapitalEntry {
            code: "12345".to_string(),
            id: 123,
        }])
    });
    let portal = Arc::new(portal);
    let (_dir, directory) = empty_directory(&portal);

    assert_eq!(directory.resolve("12345").await.unwrap(), 123);
    // Second resolve hits the refreshed in-memory table.
    assert_eq!(directory.resolve("12345").await.unwrap(), 123);
}

#[tokio::test]
async fn test_unknown_code_is_unresolvable_after_one_refresh() {
    let mut portal = MockPortal::new();
    portal.expect_capital_list().times(1).returning(|| {
        Ok(vec![CapitalEntry {
            code: "12345".to_string(),
            id: 123,
        }])
    });
    let portal = Arc::new(portal);
    let (_dir, directory) = empty_directory(&portal);

    let err = directory.resolve("999").await.unwrap_err();
    assert!(matches!(err, DirectoryError::Unresolvable(code) if code == "999"));
}

#[tokio::test]
async fn test_refresh_overwrites_cache_artifact() {
    let mut portal = MockPortal::new();
    portal.expect_capital_list().times(1).returning(|| {
        Ok(vec![
            CapitalEntry {
                code: "12345".to_string(),
                id: 123,
            },
            CapitalEntry {
                code: "67890".to_string(),
                id: 456,
            },
        ])
    });
    let portal = Arc::new(portal);
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("capitals.json");
    std::fs::write(&cache, r#"[{"code":"11111","id":1}]"#).unwrap();
    let directory = CapitalDirectory::new(
        Arc::clone(&portal),
        &cache,
        RetryPolicy::idempotent(2, Duration::ZERO),
    );

    assert_eq!(directory.resolve("67890").await.unwrap(), 456);

    let written = std::fs::read_to_string(&cache).unwrap();
    let entries: Vec<CapitalEntry> = serde_json::from_str(&written).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.code != "11111"));
}

// ---- Login ----

#[tokio::test]
async fn test_login_transitions_to_authenticated() {
    let mut portal = MockPortal::new();
    portal
        .expect_authenticate()
        .with(eq(123u32), eq("00012345"), eq("secret"))
        .times(1)
        .returning(|_, _, _| Ok(grant()));
    portal
        .expect_holdings()
        .withf(|_token, demat, code, size| {
            demat == "1301234500012345" && code == "12345" && *size == 200
        })
        .times(1)
        .returning(|_, _, _, _| {
            Ok(vec![ShareHolding {
                script: "NFS".to_string(),
                current_balance: 120.0,
                free_balance: 100.0,
            }])
        });

    let (_dir, mut session) = logged_in_session(portal).await;
    assert!(session.is_authenticated());
    assert_eq!(session.status(), "Welcome to MeroShare!");

    let holdings = session.share_list().await;
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].script, "NFS");
}

#[tokio::test]
async fn test_unresolvable_code_issues_zero_auth_requests() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().never();
    portal
        .expect_capital_list()
        .times(1)
        .returning(|| Ok(vec![]));
    let portal = Arc::new(portal);
    let (_dir, directory) = empty_directory(&portal);
    let mut creds = credentials();
    creds.dpid = "999".to_string();
    let mut session = AccountSession::new(portal, directory, creds, fast_tuning());

    assert!(!session.login().await);
    assert!(!session.is_authenticated());
    assert_eq!(session.status(), "Problem Finding Capital");
    assert_eq!(
        session.last_failure(),
        Some(FailureKind::UnresolvableIdentity)
    );
}

#[tokio::test]
async fn test_login_retries_within_bound_then_succeeds() {
    let mut portal = MockPortal::new();
    let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let seen = Arc::clone(&calls);
    portal
        .expect_authenticate()
        .times(3)
        .returning(move |_, _, _| {
            let n = seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n < 2 {
                Err(PortalError::Status {
                    status: 502,
                    message: "Bad Gateway".to_string(),
                })
            } else {
                Ok(grant())
            }
        });

    let (_dir, session) = logged_in_session(portal).await;
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_login_failure_surfaces_portal_message() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().times(3).returning(|_, _, _| {
        Err(PortalError::Status {
            status: 401,
            message: "Invalid username or password.".to_string(),
        })
    });
    let portal = Arc::new(portal);
    let (_dir, directory) = seeded_directory(&portal);
    let mut session = session(portal, directory);

    assert!(!session.login().await);
    assert_eq!(session.status(), "Invalid username or password.");
    assert_eq!(session.last_failure(), Some(FailureKind::Transient));
}

// ---- Apply ----

#[tokio::test]
async fn test_apply_blocked_issue_sends_nothing() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    portal
        .expect_applicable_issues()
        .times(1)
        .returning(|_, _| Ok(vec![issue("NFS", 503, Some("Already Applied"))]));
    portal.expect_bank_list().never();
    portal.expect_submit_application().never();

    let (_dir, mut session) = logged_in_session(portal).await;
    let outcome = session.apply("NFS", 10).await;

    assert_eq!(
        outcome,
        ApplyOutcome::NotOpen {
            action: "Already Applied".to_string()
        }
    );
    assert_eq!(session.status(), "Couldn't apply for issue! - Already Applied");
}

#[tokio::test]
async fn test_apply_without_match_sends_nothing() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    portal
        .expect_applicable_issues()
        .times(1)
        .returning(|_, _| Ok(vec![issue("OTHER", 1, None)]));
    portal.expect_bank_list().never();
    portal.expect_submit_application().never();

    let (_dir, mut session) = logged_in_session(portal).await;
    let outcome = session.apply("NFS", 10).await;

    assert_eq!(outcome, ApplyOutcome::NoMatchingIssue);
    assert_eq!(session.status(), "No matching applicable issues");
    assert_eq!(outcome.failure_kind(), Some(FailureKind::BusinessRule));
}

#[tokio::test]
async fn test_apply_missing_bank_stops_before_details() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    portal
        .expect_applicable_issues()
        .returning(|_, _| Ok(vec![issue("NFS", 503, None)]));
    portal.expect_bank_list().times(1).returning(|_| {
        Ok(vec![BankRef {
            id: 7,
            name: "Some Other Bank".to_string(),
        }])
    });
    portal.expect_bank_detail().never();
    portal.expect_submit_application().never();

    let (_dir, mut session) = logged_in_session(portal).await;
    let outcome = session.apply("NFS", 10).await;

    assert_eq!(outcome, ApplyOutcome::BankNotFound);
    assert_eq!(session.status(), "Bank name not found.");
}

#[tokio::test]
async fn test_apply_submits_full_form_once() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    portal
        .expect_applicable_issues()
        .times(1)
        .returning(|_, _| Ok(vec![issue("NFS", 503, None)]));
    portal.expect_bank_list().times(1).returning(|_| {
        Ok(vec![BankRef {
            id: 7,
            name: "XYZ Bank".to_string(),
        }])
    });
    portal
        .expect_bank_detail()
        .with(always(), eq(7u64))
        .times(1)
        .returning(|_, bank_id| {
            Ok(BankDetail {
                bank_id,
                branch_id: 71,
                account_number: "0123456789".to_string(),
                account_type_id: 1,
                customer_id: 42,
            })
        });
    portal
        .expect_submit_application()
        .withf(|_token, form| {
            form.applied_kitta == 10
                && form.company_share_id == 503
                && form.boid == "00012345"
                && form.demat == "1301234500012345"
                && form.crn_number == "CRN-1"
                && form.customer_id == 42
                && form.bank_id == 7
        })
        .times(1)
        .returning(|_, _| {
            Ok(SubmissionReceipt {
                accepted: true,
                status: 201,
                message: "Share applied successfully.".to_string(),
            })
        });

    let (_dir, mut session) = logged_in_session(portal).await;
    let outcome = session.apply("NFS", 10).await;

    assert!(matches!(outcome, ApplyOutcome::Applied { kitta: 10, .. }));
    assert_eq!(session.status(), "Successfully applied! 10 Kitta");
}

#[tokio::test]
async fn test_rejected_submission_is_never_retried() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    portal
        .expect_applicable_issues()
        .returning(|_, _| Ok(vec![issue("NFS", 503, None)]));
    portal.expect_bank_list().returning(|_| {
        Ok(vec![BankRef {
            id: 7,
            name: "XYZ Bank".to_string(),
        }])
    });
    portal.expect_bank_detail().returning(|_, bank_id| {
        Ok(BankDetail {
            bank_id,
            branch_id: 71,
            account_number: "0123456789".to_string(),
            account_type_id: 1,
            customer_id: 42,
        })
    });
    // The at-most-once property: a definitive rejection must not trigger
    // a second submission.
    portal
        .expect_submit_application()
        .times(1)
        .returning(|_, _| {
            Ok(SubmissionReceipt {
                accepted: false,
                status: 409,
                message: "Form already exists".to_string(),
            })
        });

    let (_dir, mut session) = logged_in_session(portal).await;
    let outcome = session.apply("NFS", 10).await;

    assert_eq!(
        outcome.failure_kind(),
        Some(FailureKind::SubmissionRejected)
    );
    assert_eq!(session.status(), "Apply failed! HTTP 409: Form already exists");
}

#[tokio::test]
async fn test_apply_reuses_cached_issue_list() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    portal
        .expect_applicable_issues()
        .times(1)
        .returning(|_, _| Ok(vec![issue("NFS", 503, Some("Already Applied"))]));

    let (_dir, mut session) = logged_in_session(portal).await;
    let fetched = session.applicable_issues().await;
    assert_eq!(fetched.len(), 1);

    // apply() must use the session cache instead of searching again.
    let outcome = session.apply("NFS", 10).await;
    assert!(matches!(outcome, ApplyOutcome::NotOpen { .. }));
}

// ---- Application Status ----

#[tokio::test]
async fn test_status_unknown_scrip_skips_detail_fetch() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    portal.expect_application_search().times(1).returning(|_, _| {
        Ok(vec![ApplicationSummary {
            applicant_form_id: 9001,
            scrip: "OTHER".to_string(),
        }])
    });
    portal.expect_application_detail().never();

    let (_dir, mut session) = logged_in_session(portal).await;
    let status = session.application_status("NFS").await;

    assert_eq!(status, "Script not found");
    assert_eq!(session.last_failure(), Some(FailureKind::BusinessRule));
}

#[tokio::test]
async fn test_status_reports_detail_status_name() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    portal.expect_application_search().times(1).returning(|_, _| {
        Ok(vec![ApplicationSummary {
            applicant_form_id: 9001,
            scrip: "NFS".to_string(),
        }])
    });
    portal
        .expect_application_detail()
        .with(always(), eq(9001u64))
        .times(1)
        .returning(|_, _| {
            Ok(ApplicationReport {
                status_name: "Alloted".to_string(),
            })
        });

    let (_dir, mut session) = logged_in_session(portal).await;
    assert_eq!(session.application_status("NFS").await, "Alloted");
}

#[tokio::test]
async fn test_detail_failure_does_not_rerun_search() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    portal.expect_application_search().times(1).returning(|_, _| {
        Ok(vec![ApplicationSummary {
            applicant_form_id: 9001,
            scrip: "NFS".to_string(),
        }])
    });
    // Detail retries within its own bound (2 in fast tuning) and the
    // search above is still only hit once.
    portal
        .expect_application_detail()
        .times(2)
        .returning(|_, _| Err(PortalError::Decode("truncated".to_string())));

    let (_dir, mut session) = logged_in_session(portal).await;
    assert_eq!(session.application_status("NFS").await, "Report request failed");
}

// ---- Share List ----

#[tokio::test]
async fn test_share_list_failure_degrades_to_status() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    // Not retried: a single failed attempt is final.
    portal.expect_holdings().times(1).returning(|_, _, _, _| {
        Err(PortalError::Status {
            status: 500,
            message: "Internal Server Error".to_string(),
        })
    });

    let (_dir, mut session) = logged_in_session(portal).await;
    let holdings = session.share_list().await;

    assert!(holdings.is_empty());
    assert_eq!(session.status(), "Error Getting MyShare List");
}

// ---- Bulk Runner ----

fn record(seq: &str, name: &str, username: &str) -> AccountRecord {
    let mut creds = credentials();
    creds.name = name.to_string();
    creds.username = username.to_string();
    creds.client_id = seq.to_string();
    AccountRecord {
        client_id: seq.to_string(),
        enabled: true,
        transactable: true,
        credentials: creds,
    }
}

#[tokio::test]
async fn test_one_account_failure_never_aborts_the_batch() {
    let mut portal = MockPortal::new();
    portal
        .expect_authenticate()
        .returning(|_, username, _| {
            if username == "00000001" {
                Err(PortalError::Status {
                    status: 401,
                    message: "Invalid username or password.".to_string(),
                })
            } else {
                Ok(grant())
            }
        });
    let portal = Arc::new(portal);
    let (_dir, directory) = seeded_directory(&portal);

    let runner = BulkRunner::new(
        portal,
        directory,
        fast_tuning(),
        RunnerSettings {
            parallel_accounts: 1,
            pause_between_accounts: Duration::ZERO,
        },
    );

    let accounts = vec![
        record("1", "Bad Account", "00000001"),
        record("2", "Good Account", "00000002"),
    ];
    let sheet = runner.run(&accounts, &Operation::CheckAccountStatus).await;

    assert_eq!(sheet.headers, vec!["Client ID", "Name", "Demat", "Status"]);
    assert_eq!(sheet.rows.len(), 2);
    assert_eq!(sheet.rows[0][3], "Invalid username or password.");
    assert_eq!(sheet.rows[1][3], "Welcome to MeroShare!");
}

#[tokio::test]
async fn test_disabled_accounts_are_skipped() {
    let portal = Arc::new(MockPortal::new());
    let (_dir, directory) = seeded_directory(&portal);
    let runner = BulkRunner::new(
        portal,
        directory,
        fast_tuning(),
        RunnerSettings {
            parallel_accounts: 1,
            pause_between_accounts: Duration::ZERO,
        },
    );

    let mut disabled = record("1", "Disabled", "00000001");
    disabled.enabled = false;
    let mut untransactable = record("2", "No Apply", "00000002");
    untransactable.transactable = false;

    let sheet = runner
        .run(
            &[disabled, untransactable],
            &Operation::Apply {
                scrip: "NFS".to_string(),
                kitta: 10,
            },
        )
        .await;

    assert!(sheet.rows.is_empty());
}

#[tokio::test]
async fn test_parallel_fan_out_preserves_account_order() {
    let mut portal = MockPortal::new();
    portal.expect_authenticate().returning(|_, _, _| Ok(grant()));
    let portal = Arc::new(portal);
    let (_dir, directory) = seeded_directory(&portal);

    let runner = BulkRunner::new(
        portal,
        directory,
        fast_tuning(),
        RunnerSettings {
            parallel_accounts: 4,
            pause_between_accounts: Duration::ZERO,
        },
    );

    let accounts: Vec<AccountRecord> = (1..=8)
        .map(|i| record(&i.to_string(), &format!("Account {i}"), &format!("0000000{i}")))
        .collect();
    let sheet = runner.run(&accounts, &Operation::CheckAccountStatus).await;

    assert_eq!(sheet.rows.len(), 8);
    for (index, row) in sheet.rows.iter().enumerate() {
        assert_eq!(row[0], (index + 1).to_string());
    }
}
