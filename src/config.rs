//! Settings for the dispatcher and the bundled store.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```text
//! field                  default     meaning
//! ────────────────────────────────────────────────────────────────────
//! base_delay_secs        10          delay between ticks when healthy
//! backoff_step_secs      30          added per transport-health failure
//! backoff_ceiling_secs   300         longest delay between ticks (max 1 day)
//! send_timeout_secs      30          time budget of one transport call
//! claim_timeout_secs     none        reclaim mails claimed longer than this
//! retention_secs         259200      drop mails older than this (3 days)
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::BackoffTrigger;

const DEFAULT_BASE_DELAY_SECS: u64 = 10;
const DEFAULT_BACKOFF_STEP_SECS: u64 = 30;
const DEFAULT_BACKOFF_CEILING_SECS: u64 = 300;
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETENTION_SECS: u64 = 3 * 24 * 60 * 60;
const MAX_DELAY_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostboxConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,

    #[serde(default = "default_backoff_step")]
    pub backoff_step_secs: u64,

    #[serde(default = "default_backoff_ceiling")]
    pub backoff_ceiling_secs: u64,

    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_timeout_secs: Option<u64>,

    #[serde(default = "default_retention")]
    pub retention_secs: u64,
}

fn default_base_delay() -> u64 {
    DEFAULT_BASE_DELAY_SECS
}

fn default_backoff_step() -> u64 {
    DEFAULT_BACKOFF_STEP_SECS
}

fn default_backoff_ceiling() -> u64 {
    DEFAULT_BACKOFF_CEILING_SECS
}

fn default_send_timeout() -> u64 {
    DEFAULT_SEND_TIMEOUT_SECS
}

fn default_retention() -> u64 {
    DEFAULT_RETENTION_SECS
}

impl Default for PostboxConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: DEFAULT_BASE_DELAY_SECS,
            backoff_step_secs: DEFAULT_BACKOFF_STEP_SECS,
            backoff_ceiling_secs: DEFAULT_BACKOFF_CEILING_SECS,
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
            claim_timeout_secs: None,
            retention_secs: DEFAULT_RETENTION_SECS,
        }
    }
}

impl PostboxConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Override fields from `POSTBOX_WORKER_DELAY`, `POSTBOX_BACKOFF_STEP`,
    /// `POSTBOX_BACKOFF_CEILING` and `POSTBOX_SEND_TIMEOUT` (all in seconds).
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let fields: [(&str, &mut u64); 4] = [
            ("POSTBOX_WORKER_DELAY", &mut self.base_delay_secs),
            ("POSTBOX_BACKOFF_STEP", &mut self.backoff_step_secs),
            ("POSTBOX_BACKOFF_CEILING", &mut self.backoff_ceiling_secs),
            ("POSTBOX_SEND_TIMEOUT", &mut self.send_timeout_secs),
        ];
        for (name, field) in fields {
            if let Some(raw) = lookup(name) {
                *field = raw.trim().parse().map_err(|_| {
                    ConfigError::Invalid(format!("{} must be a number of seconds, got {:?}", name, raw))
                })?;
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backoff_step_secs == 0 {
            return Err(ConfigError::Invalid("backoff_step_secs must be positive".into()));
        }
        if self.backoff_ceiling_secs > MAX_DELAY_SECS {
            return Err(ConfigError::Invalid(format!(
                "backoff_ceiling_secs ({}) exceeds one day ({})",
                self.backoff_ceiling_secs, MAX_DELAY_SECS
            )));
        }
        if self.backoff_ceiling_secs < self.base_delay_secs {
            return Err(ConfigError::Invalid(format!(
                "backoff_ceiling_secs ({}) is below base_delay_secs ({})",
                self.backoff_ceiling_secs, self.base_delay_secs
            )));
        }
        if self.send_timeout_secs == 0 {
            return Err(ConfigError::Invalid("send_timeout_secs must be positive".into()));
        }
        if let Some(claim_timeout) = self.claim_timeout_secs {
            if claim_timeout <= self.send_timeout_secs {
                return Err(ConfigError::Invalid(format!(
                    "claim_timeout_secs ({}) must exceed send_timeout_secs ({})",
                    claim_timeout, self.send_timeout_secs
                )));
            }
        }
        Ok(())
    }

    pub fn backoff_trigger(&self) -> BackoffTrigger {
        BackoffTrigger::new(
            Duration::from_secs(self.base_delay_secs),
            Duration::from_secs(self.backoff_step_secs),
            Duration::from_secs(self.backoff_ceiling_secs),
        )
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn claim_timeout(&self) -> Option<Duration> {
        self.claim_timeout_secs.map(Duration::from_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}
