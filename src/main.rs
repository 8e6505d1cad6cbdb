//! MeroShare Bulk Bot — Entry Point
//!
//! Wiring sequence:
//! 1. Parse CLI flags
//! 2. Load config.toml + validate
//! 3. Init tracing (EnvFilter, level from config)
//! 4. Read the account sheet
//! 5. Create PortalClient (immutable base headers + timeout)
//! 6. Create CapitalDirectory (shared cache, refresh-once semantics)
//! 7. Menu loop: pick an operation, run the batch, write the result CSV

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use meroshare_bulk_bot::adapters::api::{PortalClient, PortalClientConfig};
use meroshare_bulk_bot::adapters::capital::CapitalDirectory;
use meroshare_bulk_bot::adapters::sheet;
use meroshare_bulk_bot::config::loader::load_config;
use meroshare_bulk_bot::ports::retry::RetryPolicy;
use meroshare_bulk_bot::usecases::runner::{BulkRunner, Operation, RunnerSettings};
use meroshare_bulk_bot::usecases::session::SessionTuning;

#[derive(Debug, Parser)]
#[command(name = "meroshare-bulk-bot", about = "Bulk operations against the MeroShare portal")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,
    /// Override the account sheet path from config.
    #[arg(long)]
    sheet: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.bot.log_level)),
        )
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting MeroShare bulk bot"
    );

    let sheet_path = cli.sheet.unwrap_or_else(|| config.sheet.input_file.clone());
    let accounts = sheet::read_accounts(&sheet_path)
        .with_context(|| format!("Failed to read account sheet {sheet_path}"))?;
    anyhow::ensure!(!accounts.is_empty(), "Account sheet {sheet_path} has no rows");

    let client = Arc::new(
        PortalClient::new(PortalClientConfig::from_config(&config.api))
            .context("Failed to create portal client")?,
    );
    let directory = Arc::new(CapitalDirectory::new(
        Arc::clone(&client),
        &config.cache.capital_file,
        RetryPolicy::idempotent(
            config.retry.capital_attempts,
            Duration::from_millis(config.retry.capital_delay_ms),
        ),
    ));
    let runner = BulkRunner::new(
        client,
        directory,
        SessionTuning::from_config(&config),
        RunnerSettings::from_config(&config.runner),
    );

    loop {
        println!();
        println!("Please select an option:");
        println!("  1. Check Account Status");
        println!("  2. List My Shares");
        println!("  3. Get Applicable Issues");
        println!("  4. Apply IPO");
        println!("  5. Check IPO Application Status");
        println!("  0. Exit");

        let choice = prompt("Enter your choice: ")?;
        let operation = match choice.as_str() {
            "0" => break,
            "1" => Operation::CheckAccountStatus,
            "2" => Operation::ListShares,
            "3" => Operation::ListApplicableIssues,
            "4" => {
                let scrip = prompt("Script Code to Apply For: ")?;
                let kitta = match prompt("No. of Kitta to Apply: ")?.parse::<u32>() {
                    Ok(kitta) if kitta > 0 => kitta,
                    _ => {
                        println!("Kitta must be a positive number.");
                        continue;
                    }
                };
                Operation::Apply { scrip, kitta }
            }
            "5" => {
                let scrip = prompt("Script Code to Check: ")?;
                Operation::ApplicationStatus { scrip }
            }
            _ => {
                println!("Invalid choice!");
                continue;
            }
        };

        let results = runner.run(&accounts, &operation).await;
        let path = output_path(&config.sheet.output_dir, &operation);
        sheet::write_results(&path, &results)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {} rows to {}", results.rows.len(), path.display());
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}

/// Result file names follow the original workbook conventions.
fn output_path(dir: &str, operation: &Operation) -> PathBuf {
    let name = match operation {
        Operation::CheckAccountStatus => "MeroShare Account Status.csv".to_string(),
        Operation::ListShares => format!(
            "MeroShare - Share List - {}.csv",
            chrono::Local::now().format("%d-%b-%Y")
        ),
        Operation::ListApplicableIssues => "Applicable Issue List.csv".to_string(),
        Operation::Apply { scrip, .. } => format!("IPO Applied for {scrip}.csv"),
        Operation::ApplicationStatus { scrip } => {
            format!("Application Status for {scrip}.csv")
        }
    };
    Path::new(dir).join(name)
}
