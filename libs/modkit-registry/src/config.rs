//! Registry configuration.
//!
//! Sources are layered with `figment`, later ones overriding earlier ones:
//!
//! 1. built-in defaults (`RegistryConfig::default()`);
//! 2. an optional YAML file;
//! 3. `MODKIT_REGISTRY_*` environment variables
//!    (e.g. `MODKIT_REGISTRY_SLOW_LOOKUP_THRESHOLD=250us`).

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "MODKIT_REGISTRY_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Time successful lookups and log per-call and cumulative durations.
    pub stats_logging: bool,
    /// Successful lookups slower than this are logged at `warn`.
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub slow_lookup_threshold: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid registry configuration: {0}")]
    Invalid(#[source] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Invalid(Box::new(err))
    }
}

impl RegistryConfig {
    /// Defaults merged with environment overrides.
    #[must_use]
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Defaults, then `path` (YAML, skipped when absent), then environment.
    #[must_use]
    pub fn figment_with_file(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extracts a config from an arbitrary figment, e.g. a host's
    /// `registry` section via `figment.focus("registry")`.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the merged values do not deserialize.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// # Errors
    /// Returns `ConfigError::Invalid` if an environment override is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// # Errors
    /// Returns `ConfigError::Invalid` if the file or an environment override is malformed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment_with_file(path))
    }
}
