//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters, and
//! providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
    let path = Path::new(path);

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| "Failed to parse config.toml")?;

    validate_config(&config)?;

    info!(
        base_url = %config.api.base_url,
        parallel = config.runner.parallel_accounts,
        "Configuration loaded successfully"
    );

    Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
    // API validation
    anyhow::ensure!(
        config.api.base_url.starts_with("https://"),
        "api.base_url must be an https URL, got {:?}",
        config.api.base_url
    );
    anyhow::ensure!(
        config.api.origin.starts_with("https://"),
        "api.origin must be an https URL, got {:?}",
        config.api.origin
    );
    anyhow::ensure!(
        config.api.timeout_seconds > 0,
        "api.timeout_seconds must be positive"
    );
    anyhow::ensure!(
        config.api.issue_page_size > 0
            && config.api.application_page_size > 0
            && config.api.holdings_page_size > 0,
        "api page sizes must be positive"
    );

    // Retry validation: every ceiling must allow at least one attempt
    let retry = &config.retry;
    for (name, attempts) in [
        ("retry.login_attempts", retry.login_attempts),
        ("retry.issue_list_attempts", retry.issue_list_attempts),
        ("retry.status_attempts", retry.status_attempts),
        ("retry.capital_attempts", retry.capital_attempts),
    ] {
        anyhow::ensure!(attempts >= 1, "{name} must be at least 1, got {attempts}");
    }

    // Runner validation
    anyhow::ensure!(
        (1..=16).contains(&config.runner.parallel_accounts),
        "runner.parallel_accounts must be in 1..=16, got {}",
        config.runner.parallel_accounts
    );

    // Sheet validation
    anyhow::ensure!(
        !config.sheet.input_file.is_empty(),
        "sheet.input_file must not be empty"
    );
    anyhow::ensure!(
        !config.cache.capital_file.is_empty(),
        "cache.capital_file must not be empty"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_sparse_config_gets_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bot]\nname = \"test-bot\"").unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.bot.name, "test-bot");
        assert_eq!(config.retry.login_attempts, 3);
        assert_eq!(config.retry.status_attempts, 20);
        assert_eq!(config.api.issue_page_size, 10);
        assert_eq!(config.runner.parallel_accounts, 1);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nlogin_attempts = 0").unwrap();

        let result = load_config(file.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_oversized_pool() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[runner]\nparallel_accounts = 64").unwrap();

        let result = load_config(file.path().to_str().unwrap());
        assert!(result.is_err());
    }
}
