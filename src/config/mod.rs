pub mod policy;

#[cfg(feature = "cli")]
pub mod cli;

pub use policy::CrosslistPolicy;

use crate::utils::error::Result;
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};

/// Settings for talking to the remote platform. Cloned into every worker so
/// fan-out tasks share no mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub base_url: String,
    pub account_id: i64,
    pub per_page: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Base delay for linear retry back-off on non-rate-limit failures.
    pub retry_delay_ms: u64,
    /// Fixed pacing delay inserted before every outbound request.
    pub pacing_delay_ms: u64,
    /// Fixed cool-down after a 429 before retrying the same page.
    pub rate_limit_backoff_secs: u64,
    /// Absolute pagination ceiling, a safety valve against misconfigured servers.
    pub max_pages_absolute: u32,
    pub concurrent_requests: usize,
    pub cache_path: String,
    pub terms_cache_ttl_secs: i64,
    pub instructor_cache_ttl_secs: i64,
    pub audit_log_path: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            account_id: 1,
            per_page: 100,
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
            pacing_delay_ms: 100,
            rate_limit_backoff_secs: 60,
            max_pages_absolute: 50,
            concurrent_requests: 4,
            cache_path: "./cache/crosslist_cache.json".to_string(),
            terms_cache_ttl_secs: 3600,
            instructor_cache_ttl_secs: 600,
            audit_log_path: "./logs/crosslist_audit.csv".to_string(),
        }
    }
}

impl CanvasConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Validate for CanvasConfig {
    fn validate(&self) -> Result<()> {
        validate_url("base_url", &self.base_url)?;
        validate_positive_number("per_page", self.per_page, 1)?;
        validate_positive_number("max_retries", self.max_retries as usize, 1)?;
        validate_range("concurrent_requests", self.concurrent_requests, 1, 8)?;
        validate_path("cache_path", &self.cache_path)?;
        validate_path("audit_log_path", &self.audit_log_path)?;
        Ok(())
    }
}
