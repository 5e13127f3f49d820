//! Application configuration for Outreach.
//!
//! User config lives at `~/.outreach/outreach.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file; it names the env vars holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OutreachError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "outreach.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".outreach";

/// Env var that points at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "OUTREACH_CONFIG";

// ---------------------------------------------------------------------------
// Config structs (matching outreach.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub serpapi: SerpApiConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub business: BusinessConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub email_template: EmailTemplateConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding `clients.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Directory holding checkpoint files and run metadata.
    #[serde(default = "default_recovery_dir")]
    pub recovery_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            recovery_dir: default_recovery_dir(),
        }
    }
}

impl PathsConfig {
    /// Path of the contact document store.
    pub fn contacts_file(&self) -> PathBuf {
        expand_home(&self.data_dir).join("clients.json")
    }

    /// Path of the recovery directory.
    pub fn recovery_path(&self) -> PathBuf {
        expand_home(&self.recovery_dir)
    }
}

fn default_data_dir() -> String {
    "data".into()
}
fn default_recovery_dir() -> String {
    ".recovery".into()
}

/// `[serpapi]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerpApiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_serpapi_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_serpapi_base_url")]
    pub base_url: String,
}

impl Default for SerpApiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_serpapi_key_env(),
            base_url: default_serpapi_base_url(),
        }
    }
}

fn default_serpapi_key_env() -> String {
    "SERPAPI_KEY".into()
}
fn default_serpapi_base_url() -> String {
    "https://serpapi.com".into()
}

/// `[gemini]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}

/// `[smtp]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Implicit TLS (port 465 style). `false` means STARTTLS.
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub user: String,
    /// Name of the env var holding the SMTP password.
    #[serde(default = "default_smtp_password_env")]
    pub password_env: String,
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            secure: false,
            user: String::new(),
            password_env: default_smtp_password_env(),
            timeout_secs: default_smtp_timeout(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_smtp_password_env() -> String {
    "SMTP_PASS".into()
}
fn default_smtp_timeout() -> u64 {
    30
}

/// `[business]` section: the operator's identity used in every message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub company: String,
}

/// `[search]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_searches")]
    pub max_searches_per_run: u32,
    #[serde(default = "default_results_per_page")]
    pub results_per_page: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages_per_search: u32,
    /// Platforms searched when none are given on the command line.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_searches_per_run: default_max_searches(),
            results_per_page: default_results_per_page(),
            max_pages_per_search: default_max_pages(),
            platforms: default_platforms(),
        }
    }
}

fn default_max_searches() -> u32 {
    30
}
fn default_results_per_page() -> u32 {
    10
}
fn default_max_pages() -> u32 {
    5
}
fn default_platforms() -> Vec<String> {
    vec!["instagram.com".into(), "facebook.com".into()]
}

/// `[rate_limit]` section. All delays are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Pause between platform queries.
    #[serde(default = "default_search_delay")]
    pub search_delay_ms: u64,
    /// Pause between result pages of one query.
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,
    /// Pause between generation calls.
    #[serde(default = "default_generation_delay")]
    pub generation_delay_ms: u64,
    /// Pause between sends.
    #[serde(default = "default_email_delay")]
    pub email_delay_ms: u64,
    #[serde(default = "default_max_emails")]
    pub max_emails_per_run: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            search_delay_ms: default_search_delay(),
            page_delay_ms: default_page_delay(),
            generation_delay_ms: default_generation_delay(),
            email_delay_ms: default_email_delay(),
            max_emails_per_run: default_max_emails(),
        }
    }
}

fn default_search_delay() -> u64 {
    2000
}
fn default_page_delay() -> u64 {
    1000
}
fn default_generation_delay() -> u64 {
    1000
}
fn default_email_delay() -> u64 {
    5000
}
fn default_max_emails() -> usize {
    10
}

/// `[email_template]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplateConfig {
    #[serde(default)]
    pub default_subject: String,
    #[serde(default)]
    pub default_body: String,
    /// Extra operator instructions appended to the generation prompt.
    #[serde(default)]
    pub generation_prompt: String,
}

/// `[recovery]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Remove checkpoints once a run is marked complete.
    #[serde(default)]
    pub clear_on_complete: bool,
    /// Retry count at which a fresh start is recommended.
    #[serde(default = "default_retry_threshold")]
    pub retry_warning_threshold: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            clear_on_complete: false,
            retry_warning_threshold: default_retry_threshold(),
        }
    }
}

fn default_retry_threshold() -> u32 {
    3
}

/// `[http]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout applied to every outbound provider request.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}

/// `[dashboard]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_host")]
    pub host: String,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    /// Directory of static dashboard assets, served as the fallback route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_dashboard_host(),
            port: default_dashboard_port(),
            static_dir: None,
        }
    }
}

fn default_dashboard_host() -> String {
    "127.0.0.1".into()
}
fn default_dashboard_port() -> u16 {
    3000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Get the path to the config directory (`~/.outreach/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| OutreachError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file, honouring `OUTREACH_CONFIG`.
pub fn config_file_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the config at `path`. Returns defaults if the file does not exist.
pub fn load_config_or_default(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OutreachError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| OutreachError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write `config` to `path` atomically, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| OutreachError::io(parent, e))?;
        }
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| OutreachError::config(e.to_string()))?;

    let temp = path.with_extension("toml.tmp");
    std::fs::write(&temp, content).map_err(|e| OutreachError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| OutreachError::io(path, e))?;
    Ok(())
}

/// Read a secret from the env var named by `var_name`.
pub fn read_secret(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.is_empty())
}

/// Check that every credential needed by a full run is present.
///
/// Reports all missing values at once.
pub fn validate_credentials(config: &AppConfig) -> Result<()> {
    let mut missing = Vec::new();
    if read_secret(&config.gemini.api_key_env).is_none() {
        missing.push(format!("Gemini API key (env {})", config.gemini.api_key_env));
    }
    if read_secret(&config.serpapi.api_key_env).is_none() {
        missing.push(format!("SerpAPI key (env {})", config.serpapi.api_key_env));
    }
    if config.smtp.user.is_empty() {
        missing.push("SMTP user ([smtp] user)".to_string());
    }
    if read_secret(&config.smtp.password_env).is_none() {
        missing.push(format!("SMTP password (env {})", config.smtp.password_env));
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(OutreachError::config(format!(
            "missing required configuration:\n  - {}",
            missing.join("\n  - ")
        )))
    }
}
