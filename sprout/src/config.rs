//! Framework configuration is stored in [ApplicationConfig], which is owned by the
//! [ApplicationContext](crate::application::ApplicationContext) and also registered as a singleton,
//! so it can be injected into any other component.
//!
//! By default, the config is created with opinionated default values, which can then be overwritten
//! by environment variables prefixed with `SPROUT_` or `sprout.json` file.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_ENV_PREFIX: &str = "SPROUT";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "sprout.json";

/// Name under which [ApplicationConfig] is registered as a singleton.
pub const APPLICATION_CONFIG: &str = "applicationConfig";

/// Framework configuration.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApplicationConfig {
    /// Should a default tracing logger be installed in the scope of the application.
    pub install_tracing_logger: bool,
    /// Can definitions be registered again under an already used name.
    pub allow_definition_overriding: bool,
    /// Should all non-lazy singletons be created when the context is refreshed.
    pub pre_instantiate_singletons: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
            allow_definition_overriding: true,
            pre_instantiate_singletons: true,
        }
    }
}

impl From<OptionalApplicationConfig> for ApplicationConfig {
    fn from(value: OptionalApplicationConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            allow_definition_overriding: value
                .allow_definition_overriding
                .unwrap_or(default.allow_definition_overriding),
            pre_instantiate_singletons: value
                .pre_instantiate_singletons
                .unwrap_or(default.pre_instantiate_singletons),
        }
    }
}

impl ApplicationConfig {
    /// Reads the config from [CONFIG_FILE] (if present) and environment variables.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<OptionalApplicationConfig>())
            .map(|config| config.into())
    }

    pub fn with_install_tracing_logger(mut self, install_tracing_logger: bool) -> Self {
        self.install_tracing_logger = install_tracing_logger;
        self
    }

    pub fn with_allow_definition_overriding(mut self, allow_definition_overriding: bool) -> Self {
        self.allow_definition_overriding = allow_definition_overriding;
        self
    }

    pub fn with_pre_instantiate_singletons(mut self, pre_instantiate_singletons: bool) -> Self {
        self.pre_instantiate_singletons = pre_instantiate_singletons;
        self
    }
}

#[derive(Deserialize, Default)]
struct OptionalApplicationConfig {
    install_tracing_logger: Option<bool>,
    allow_definition_overriding: Option<bool>,
    pre_instantiate_singletons: Option<bool>,
}
