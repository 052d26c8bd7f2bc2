//! Messaging configuration is stored in [MessagingConfig].
//!
//! By default, the config is created with opinionated default values, which can then be overwritten
//! by values from `sprout.json` file under the `messaging` key.

use config::{Config, ConfigError, File};
use serde::Deserialize;
use sprout::config::CONFIG_FILE;

/// Name under which [MessagingConfig] is registered as a component.
pub const MESSAGING_CONFIG: &str = "messagingConfig";

#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessagingConfig {
    /// Prefix identifying user destinations.
    pub user_destination_prefix: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            user_destination_prefix: "/user/".to_string(),
        }
    }
}

impl From<OptionalMessagingConfig> for MessagingConfig {
    fn from(value: OptionalMessagingConfig) -> Self {
        let default = Self::default();
        Self {
            user_destination_prefix: value
                .user_destination_prefix
                .unwrap_or(default.user_destination_prefix),
        }
    }
}

impl MessagingConfig {
    /// Reads the config from [CONFIG_FILE], if present.
    pub fn init_from_config() -> Result<Self, ConfigError> {
        Self::init_from_source(File::with_name(CONFIG_FILE).required(false))
    }

    fn init_from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(source)
            .build()
            .and_then(|config| config.try_deserialize::<OptionalMessagingConfigWrapper>())
            .map(|config| {
                config
                    .messaging
                    .map(|config| config.into())
                    .unwrap_or_default()
            })
    }

    pub fn with_user_destination_prefix(mut self, user_destination_prefix: impl Into<String>) -> Self {
        self.user_destination_prefix = user_destination_prefix.into();
        self
    }
}

#[derive(Deserialize)]
struct OptionalMessagingConfig {
    user_destination_prefix: Option<String>,
}

#[derive(Deserialize)]
struct OptionalMessagingConfigWrapper {
    messaging: Option<OptionalMessagingConfig>,
}
