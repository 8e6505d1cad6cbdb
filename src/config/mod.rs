//! Configuration Module - TOML-based Bot Configuration
//!
//! Loads configuration from `config.toml`. Every tunable — retry
//! ceilings, fixed delays, page sizes, pacing, fan-out — lives here
//! rather than as a magic number at a call site. All sections and
//! fields have defaults, so a sparse file is valid.

pub mod loader;

use serde::Deserialize;

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub sheet: SheetConfig,
    pub runner: RunnerConfig,
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Human-readable bot name.
    pub name: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "meroshare-bulk-bot".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Portal endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Portal backend base URL.
    pub base_url: String,
    /// Web-frontend origin the backend expects.
    pub origin: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Page size for the applicable-issue search.
    pub issue_page_size: u32,
    /// Page size for the recent-application search.
    pub application_page_size: u32,
    /// Page size for the holdings query.
    pub holdings_page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://webbackend.cdsc.com.np/api".to_string(),
            origin: "https://meroshare.cdsc.com.np".to_string(),
            timeout_seconds: 30,
            issue_page_size: 10,
            application_page_size: 200,
            holdings_page_size: 200,
        }
    }
}

/// Fixed-delay retry bounds per operation.
///
/// The original call sites disagreed on these (5 vs 10 vs 20); the most
/// defensive observed bound is the default and all of them are tunable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub login_attempts: u32,
    pub login_delay_ms: u64,
    pub issue_list_attempts: u32,
    pub issue_list_delay_ms: u64,
    pub status_attempts: u32,
    pub status_delay_ms: u64,
    pub capital_attempts: u32,
    pub capital_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            login_attempts: 3,
            login_delay_ms: 3_000,
            issue_list_attempts: 15,
            issue_list_delay_ms: 100,
            status_attempts: 20,
            status_delay_ms: 100,
            capital_attempts: 3,
            capital_delay_ms: 3_000,
        }
    }
}

/// Capital-table cache artifact location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capital_file: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capital_file: "capitals.json".to_string(),
        }
    }
}

/// Account sheet locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Input CSV with one credential row per account.
    pub input_file: String,
    /// Directory result sheets are written into.
    pub output_dir: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            input_file: "accounts.csv".to_string(),
            output_dir: ".".to_string(),
        }
    }
}

/// Batch pacing and fan-out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Concurrent accounts; 1 = fully sequential.
    pub parallel_accounts: usize,
    /// Pause between accounts when sequential.
    pub pause_between_accounts_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallel_accounts: 1,
            pause_between_accounts_ms: 200,
        }
    }
}
