use crate::constants::DEFAULT_STORAGE_NAME;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Prefix of every environment variable read by [`DispatchConfig`]
pub const ENV_PREFIX: &str = "ACTION_DISPATCH";

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of actions handed to the transport in one batch
    pub max_batch_size: usize,
    /// Capacity of the lifecycle event broadcast channel
    pub event_channel_capacity: usize,
    /// Name of the action result store
    pub storage_name: String,
    /// Turn local execution failures into failure report actions
    pub report_failures: bool,
    /// Context sequence number used when deriving action ids
    pub context_num: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50,
            event_channel_capacity: 1000,
            storage_name: DEFAULT_STORAGE_NAME.to_string(),
            report_failures: true,
            context_num: "1".to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(format!("{ENV_PREFIX}_MAX_BATCH_SIZE")) {
            config.max_batch_size = parse_env("MAX_BATCH_SIZE", &value)?;
        }

        if let Ok(value) = std::env::var(format!("{ENV_PREFIX}_EVENT_CHANNEL_CAPACITY")) {
            config.event_channel_capacity = parse_env("EVENT_CHANNEL_CAPACITY", &value)?;
        }

        if let Ok(value) = std::env::var(format!("{ENV_PREFIX}_STORAGE_NAME")) {
            config.storage_name = value;
        }

        if let Ok(value) = std::env::var(format!("{ENV_PREFIX}_REPORT_FAILURES")) {
            config.report_failures = parse_env("REPORT_FAILURES", &value)?;
        }

        if let Ok(value) = std::env::var(format!("{ENV_PREFIX}_CONTEXT_NUM")) {
            config.context_num = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration layered from an optional file and `ACTION_DISPATCH_*` variables.
    ///
    /// The file format is inferred from the extension. A missing file is not an error.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading dispatch configuration");

        let config: DispatchConfig = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_batch_size == 0 {
            return Err(ConfigurationError::InvalidField {
                field: "max_batch_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.event_channel_capacity == 0 {
            return Err(ConfigurationError::InvalidField {
                field: "event_channel_capacity".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.storage_name.trim().is_empty() {
            return Err(ConfigurationError::InvalidField {
                field: "storage_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_env<T>(name: &str, value: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigurationError::InvalidEnvironmentValue {
            var: format!("{ENV_PREFIX}_{name}"),
            reason: e.to_string(),
        })
}
