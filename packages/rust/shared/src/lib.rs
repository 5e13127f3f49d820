//! Shared types, error model, and configuration for Outreach.
//!
//! This crate is the foundation depended on by all other Outreach crates.
//! It provides:
//! - [`OutreachError`]: the unified error type
//! - Domain types ([`Contact`], [`NewContact`], [`SearchHit`], [`SearchParams`])
//! - Configuration ([`AppConfig`], config loading, credential checks)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BusinessConfig, DashboardConfig, EmailTemplateConfig, GeminiConfig, HttpConfig,
    PathsConfig, RateLimitConfig, RecoveryConfig, SearchConfig, SerpApiConfig, SmtpConfig,
    config_dir, config_file_path, expand_home, load_config_from, load_config_or_default,
    read_secret, save_config_to, validate_credentials,
};
pub use error::{OutreachError, Result};
pub use types::{
    Contact, ContactId, ContactPatch, DeliveryStatus, NewContact, Platform, SearchHit,
    SearchParams, SearchResult, parse_platform_list,
};
