//! Configuration loading and resolution.
//!
//! Values resolve in priority order:
//! 1. CLI flags
//! 2. `config.json` in the state directory (or `--config`)
//! 3. `GENROLL_*` environment variables
//! 4. Built-in defaults
use crate::workflow::{EnrollOptions, PartialBatchPolicy, SupervisorPolicy, Timing};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Current schema version for `config.json`.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_ENTRY_URL: &str = "https://web.whatsapp.com/";
pub const DEFAULT_DRIVER_BINARY: &str = "chromedriver";

pub const WEBDRIVER_URL_ENV: &str = "GENROLL_WEBDRIVER_URL";
pub const BROWSER_ARGS_ENV: &str = "GENROLL_BROWSER_ARGS";

/// On-disk configuration. Every field except `schema_version` is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnrollConfig {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webdriver_url: Option<String>,
    #[serde(default = "default_entry_url")]
    pub entry_url: String,
    #[serde(default = "default_driver_binary")]
    pub driver_binary: String,
    /// Replaces the default browser arguments when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_args: Option<Vec<String>>,
    #[serde(default = "default_max_cycles")]
    pub max_cycles: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub partial_batch: PartialBatchPolicy,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Timeouts and fixed delays, in whole seconds unless the name says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub group_lookup_secs: u64,
    pub element_secs: u64,
    pub session_check_secs: u64,
    pub login_secs: u64,
    pub login_settle_secs: u64,
    pub post_click_settle_ms: u64,
    pub retry_backoff_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            group_lookup_secs: 35,
            element_secs: 20,
            session_check_secs: 20,
            login_secs: 60,
            login_settle_secs: 40,
            post_click_settle_ms: 2_000,
            retry_backoff_secs: 10,
        }
    }
}

impl TimingConfig {
    pub fn timing(&self) -> Timing {
        Timing {
            group_lookup: Duration::from_secs(self.group_lookup_secs),
            element: Duration::from_secs(self.element_secs),
            session_check: Duration::from_secs(self.session_check_secs),
            login: Duration::from_secs(self.login_secs),
            login_settle: Duration::from_secs(self.login_settle_secs),
            post_click_settle: Duration::from_millis(self.post_click_settle_ms),
        }
    }
}

fn default_entry_url() -> String {
    DEFAULT_ENTRY_URL.to_string()
}

fn default_driver_binary() -> String {
    DEFAULT_DRIVER_BINARY.to_string()
}

fn default_max_cycles() -> usize {
    crate::workflow::DEFAULT_MAX_CYCLES
}

/// Config used when no `config.json` exists.
pub fn default_config() -> EnrollConfig {
    EnrollConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        webdriver_url: None,
        entry_url: default_entry_url(),
        driver_binary: default_driver_binary(),
        browser_args: None,
        max_cycles: default_max_cycles(),
        max_attempts: None,
        partial_batch: PartialBatchPolicy::default(),
        timing: TimingConfig::default(),
    }
}

/// Load a config file; `None` when it does not exist.
pub fn load_config(path: &Path) -> Result<Option<EnrollConfig>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("read config {}", path.display())),
    };
    let config: EnrollConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config {}", path.display()))?;
    Ok(Some(config))
}

/// Validate schema version and value ranges.
pub fn validate_config(config: &EnrollConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if let Some(url) = config.webdriver_url.as_deref() {
        validate_http_url(url, "webdriver_url")?;
    }
    validate_http_url(&config.entry_url, "entry_url")?;
    if config.driver_binary.trim().is_empty() {
        return Err(anyhow!("driver_binary must be non-empty"));
    }
    if config.max_cycles == 0 {
        return Err(anyhow!("max_cycles must be at least 1"));
    }
    if config.max_attempts == Some(0) {
        return Err(anyhow!("max_attempts must be at least 1 when set"));
    }
    let timing = &config.timing;
    for (label, value) in [
        ("timing.group_lookup_secs", timing.group_lookup_secs),
        ("timing.element_secs", timing.element_secs),
        ("timing.session_check_secs", timing.session_check_secs),
        ("timing.login_secs", timing.login_secs),
    ] {
        if value == 0 {
            return Err(anyhow!("{label} must be at least 1"));
        }
    }
    Ok(())
}

fn validate_http_url(url: &str, label: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(());
    }
    Err(anyhow!("{label} must be an http(s) URL (got {url:?})"))
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub webdriver_url: Option<String>,
    pub max_cycles: Option<usize>,
    pub max_attempts: Option<u32>,
    pub partial_batch: Option<PartialBatchPolicy>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub webdriver_url: String,
    pub entry_url: String,
    pub driver_binary: String,
    pub browser_args: Vec<String>,
    pub options: EnrollOptions,
    pub policy: SupervisorPolicy,
}

/// Browser arguments used when neither config nor environment set any.
pub fn default_browser_args(profile_dir: &Path) -> Vec<String> {
    vec![
        format!("--user-data-dir={}", profile_dir.display()),
        "--profile-directory=Default".to_string(),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
    ]
}

/// Merge CLI overrides, the config file, and the environment.
///
/// `env` is the variable lookup, usually `|key| std::env::var(key).ok()`.
pub fn resolve_settings(
    config: &EnrollConfig,
    overrides: &Overrides,
    profile_dir: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let webdriver_url = overrides
        .webdriver_url
        .clone()
        .or_else(|| config.webdriver_url.clone())
        .or_else(|| env(WEBDRIVER_URL_ENV))
        .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string());
    validate_http_url(&webdriver_url, "webdriver url")?;

    let browser_args = match (&config.browser_args, env(BROWSER_ARGS_ENV)) {
        (Some(args), _) => args.clone(),
        (None, Some(raw)) => shell_words::split(&raw)
            .with_context(|| format!("parse {BROWSER_ARGS_ENV}"))?,
        (None, None) => default_browser_args(profile_dir),
    };

    let max_cycles = overrides.max_cycles.unwrap_or(config.max_cycles);
    if max_cycles == 0 {
        return Err(anyhow!("--max-cycles must be at least 1"));
    }
    let max_attempts = overrides.max_attempts.or(config.max_attempts);
    if max_attempts == Some(0) {
        return Err(anyhow!("--max-attempts must be at least 1"));
    }

    Ok(Settings {
        webdriver_url,
        entry_url: config.entry_url.clone(),
        driver_binary: config.driver_binary.clone(),
        browser_args,
        options: EnrollOptions {
            max_cycles,
            partial_batch: overrides.partial_batch.unwrap_or(config.partial_batch),
            timing: config.timing.timing(),
        },
        policy: SupervisorPolicy {
            backoff: Duration::from_secs(config.timing.retry_backoff_secs),
            max_attempts,
        },
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
