//! Configuration for a storytelling session.
//!
//! This module provides the `Config` struct with a builder pattern for the
//! generation service, print pacing, stage attempt limits, retry policy and
//! the phrase lists used by the classifiers.

use crate::classifier::MarkerTable;
use crate::error::{Error, Result};
use std::time::Duration;

/// Default OpenAI-compatible API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default delay between printed characters in milliseconds.
const DEFAULT_PRINT_DELAY_MS: u64 = 30;

/// Default maximum retries for a failed generation call.
const DEFAULT_MAX_RETRIES: u32 = 0;

/// Default initial backoff in seconds.
const DEFAULT_INITIAL_BACKOFF_SECS: u64 = 2;

/// Default backoff multiplier.
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Configuration for a storytelling session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,

    /// Credential for the generation service.
    pub api_key: Option<String>,

    /// Chat model name.
    pub model: String,

    /// Sampling temperature for every request.
    pub temperature: f32,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Delay between printed characters.
    pub print_delay: Duration,

    /// Answers a stage reads before giving up (`None` = ask forever).
    pub max_stage_attempts: Option<u32>,

    /// Retries after a retryable generation failure (0 = fail at once).
    pub max_retries: u32,

    /// Initial backoff in seconds.
    pub initial_backoff_secs: u64,

    /// Backoff multiplier.
    pub backoff_multiplier: f64,

    /// Phrase lists for the confusion, negative and approval classifiers.
    pub markers: MarkerTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            print_delay: Duration::from_millis(DEFAULT_PRINT_DELAY_MS),
            max_stage_attempts: None,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_secs: DEFAULT_INITIAL_BACKOFF_SECS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            markers: MarkerTable::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the chat model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the request timeout in seconds.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the delay between printed characters.
    pub fn print_delay(mut self, delay: Duration) -> Self {
        self.print_delay = delay;
        self
    }

    /// Set the delay between printed characters in milliseconds.
    pub fn print_delay_ms(mut self, ms: u64) -> Self {
        self.print_delay = Duration::from_millis(ms);
        self
    }

    /// Bound how many answers each stage reads.
    pub fn max_stage_attempts(mut self, attempts: u32) -> Self {
        self.max_stage_attempts = Some(attempts);
        self
    }

    /// Let every stage ask until it gets a usable answer.
    pub fn unbounded_stage_attempts(mut self) -> Self {
        self.max_stage_attempts = None;
        self
    }

    /// Set the maximum generation retries.
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the initial backoff in seconds.
    pub fn initial_backoff_secs(mut self, secs: u64) -> Self {
        self.initial_backoff_secs = secs;
        self
    }

    /// Set the backoff multiplier.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Replace the classifier phrase lists.
    pub fn markers(mut self, markers: MarkerTable) -> Self {
        self.markers = markers;
        self
    }

    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check that the configuration can drive a session.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingApiKey` if no non-empty key is set, and
    /// `Error::ConfigError` for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(Error::MissingApiKey);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config_error(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        if self.max_stage_attempts == Some(0) {
            return Err(Error::config_error("max stage attempts must be at least 1"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(Error::config_error(format!(
                "backoff multiplier must be at least 1, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }
}
