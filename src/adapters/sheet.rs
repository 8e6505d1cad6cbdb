//! Account Sheet Adapter - CSV In, Result Rows Out
//!
//! Plain I/O: reads one credential row per account and writes one
//! result row per account per operation. No decision logic beyond the
//! column mapping; malformed rows are logged and skipped rather than
//! aborting the run.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::account::AccountCredentials;

/// The sheet stores participant codes offset by this constant; the
/// portal's code is `raw - OFFSET`.
pub const DPID_OFFSET: i64 = 13_000_000;

/// One row of the input sheet, as stored.
#[derive(Debug, Deserialize)]
struct SheetRow {
    #[serde(rename = "SN")]
    seq: String,
    #[serde(rename = "Name")]
    name: String,
    /// "NO" disables the account entirely.
    #[serde(rename = "Active")]
    active: String,
    /// "NO" additionally disables transactional operations.
    #[serde(rename = "Apply")]
    apply: String,
    #[serde(rename = "Username")]
    username: String,
    /// Offset participant code (portal code + 13,000,000).
    #[serde(rename = "DPID")]
    dpid: i64,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "CRN", default)]
    crn: String,
    #[serde(rename = "PIN", default)]
    pin: String,
    #[serde(rename = "Bank", default)]
    bank: String,
}

/// One account as the runner consumes it.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    /// Sequence id from the sheet, echoed into output rows.
    pub client_id: String,
    /// First enable flag: account participates at all.
    pub enabled: bool,
    /// Second enable flag: account participates in apply/issue/status
    /// operations.
    pub transactable: bool,
    pub credentials: AccountCredentials,
}

/// A result table ready to be written: headers plus uniform rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultSheet {
    pub fn new<S: Into<String>>(headers: Vec<S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }
}

fn flag_enabled(flag: &str) -> bool {
    !flag.trim().eq_ignore_ascii_case("no")
}

fn record_from_row(row: SheetRow) -> AccountRecord {
    let code = row.dpid - DPID_OFFSET;
    if code <= 0 {
        warn!(seq = %row.seq, dpid = row.dpid, "sheet DPID below portal offset");
    }
    AccountRecord {
        client_id: row.seq.clone(),
        enabled: flag_enabled(&row.active),
        transactable: flag_enabled(&row.apply),
        credentials: AccountCredentials {
            name: row.name,
            dpid: code.to_string(),
            username: row.username.replace(' ', ""),
            password: row.password,
            client_id: row.seq,
            crn: row.crn,
            pin: row.pin,
            bank: row.bank,
        },
    }
}

/// Read every account row from the sheet. Rows that fail to parse are
/// skipped with a warning so one bad line never blocks the batch.
pub fn read_accounts(path: impl AsRef<Path>) -> Result<Vec<AccountRecord>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open account sheet: {}", path.display()))?;

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<SheetRow>().enumerate() {
        match row {
            Ok(row) => records.push(record_from_row(row)),
            Err(e) => warn!(line = index + 2, error = %e, "skipping malformed sheet row"),
        }
    }

    info!(accounts = records.len(), path = %path.display(), "account sheet loaded");
    Ok(records)
}

/// Write a result table as CSV, overwriting any previous output.
pub fn write_results(path: impl AsRef<Path>, sheet: &ResultSheet) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create result sheet: {}", path.display()))?;

    writer
        .write_record(&sheet.headers)
        .context("Failed to write result header")?;
    for row in &sheet.rows {
        writer.write_record(row).context("Failed to write result row")?;
    }
    writer.flush().context("Failed to flush result sheet")?;

    info!(rows = sheet.rows.len(), path = %path.display(), "result sheet written");
    Ok(())
}
