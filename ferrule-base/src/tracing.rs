use ferrule::StdError;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::filter::{Directive, EnvFilter, LevelFilter};
use tracing_subscriber::Layer as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::ConfigSection;

/// Global tracing subscriber setup.
pub struct Tracing;

impl Tracing {
    /// Installs a fmt subscriber filtered by `config`.
    ///
    /// Returns `false` without touching the existing subscriber if one was
    /// already installed. Invalid directives are reported as errors.
    pub fn init(config: &TracingConfig) -> Result<bool, StdError> {
        let filter = Self::env_filter(config)?;
        let installed = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(filter))
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!(level = %config.level, "tracing initialized");
        }
        Ok(installed)
    }

    /// Builds the filter: every configured directive plus the default level.
    pub fn env_filter(config: &TracingConfig) -> Result<EnvFilter, StdError> {
        config
            .directives
            .iter()
            .try_fold(
                EnvFilter::default().add_directive(LevelFilter::from_level(config.level).into()),
                |filter, directive| {
                    Ok::<_, StdError>(filter.add_directive(directive.parse::<Directive>()?))
                },
            )
    }
}

/// The `"tracing"` configuration section.
///
/// `level` is the default verbosity and accepts the usual names in any case.
/// `directives` are `EnvFilter` directives such as `"ferrule=trace"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    #[serde(with = "level_name")]
    pub level: Level,
    pub directives: Vec<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            directives: Vec::new(),
        }
    }
}

impl ConfigSection for TracingConfig {
    fn key() -> &'static str {
        "tracing"
    }
}

mod level_name {
    use serde::{Deserialize as _, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(level.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
