//! Assertion configuration
//!
//! Suite-wide defaults for every matcher produced by a [`crate::Matchers`]
//! factory. Loaded from YAML or built in code; a timeout from the
//! environment wins over both.

use crate::poll::{BackoffSchedule, PollOptions};
use crate::result::{ExpectError, ExpectResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default assertion timeout (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default delays between poll attempts
pub const DEFAULT_BACKOFF_MS: [u64; 4] = [100, 250, 500, 1000];

/// Attribute the storefront renders test ids into
pub const DEFAULT_TEST_ID_ATTRIBUTE: &str = "data-test";

/// Environment variable overriding [`ExpectConfig::timeout_ms`]
pub const TIMEOUT_ENV_VAR: &str = "STOREFRONT_EXPECT_TIMEOUT_MS";

/// How a sort assertion treats a collection with no rendered items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyPolicy {
    /// Zero items means the listing has not loaded yet: keep polling
    #[default]
    Fail,
    /// Zero items is vacuously sorted
    Pass,
}

/// Configuration shared by all matchers of one suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectConfig {
    /// Total time an assertion may poll, in milliseconds
    pub timeout_ms: u64,
    /// Escalating delays between attempts; the last one repeats
    pub backoff_ms: Vec<u64>,
    /// Verdict for an empty element collection
    pub empty_policy: EmptyPolicy,
    /// Attribute used by test-id selectors
    pub test_id_attribute: String,
}

impl Default for ExpectConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            backoff_ms: DEFAULT_BACKOFF_MS.to_vec(),
            empty_policy: EmptyPolicy::Fail,
            test_id_attribute: DEFAULT_TEST_ID_ATTRIBUTE.to_string(),
        }
    }
}

impl ExpectConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout in milliseconds
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the backoff schedule
    #[must_use]
    pub fn with_backoff_ms(mut self, backoff_ms: impl Into<Vec<u64>>) -> Self {
        self.backoff_ms = backoff_ms.into();
        self
    }

    /// Set the empty-collection policy
    #[must_use]
    pub const fn with_empty_policy(mut self, policy: EmptyPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    /// Set the test-id attribute
    #[must_use]
    pub fn with_test_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.test_id_attribute = attribute.into();
        self
    }

    /// Timeout as a Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(yaml: &str) -> ExpectResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ExpectResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ExpectResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Apply [`TIMEOUT_ENV_VAR`] from the process environment
    pub fn with_env_overrides(self) -> ExpectResult<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ExpectResult<Self> {
        if let Some(raw) = lookup(TIMEOUT_ENV_VAR) {
            self.timeout_ms = raw.trim().parse().map_err(|_| ExpectError::Config {
                message: format!("{TIMEOUT_ENV_VAR} must be milliseconds, got {raw:?}"),
            })?;
        }
        Ok(self)
    }

    /// Check invariants the poll loop relies on
    pub fn validate(&self) -> ExpectResult<()> {
        BackoffSchedule::from_millis(&self.backoff_ms).map(|_| ())
    }

    /// Poll options derived from this configuration
    pub fn poll_options(&self) -> ExpectResult<PollOptions> {
        let backoff = BackoffSchedule::from_millis(&self.backoff_ms)?;
        Ok(PollOptions::new(self.timeout()).with_backoff(backoff))
    }
}
