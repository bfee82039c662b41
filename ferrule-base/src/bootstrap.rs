use std::path::Path;
use std::sync::Arc;

use ferrule::{DependencyContainer, DuplicateImplementationAction, ResolveOptions, StdError};
use serde::{Deserialize, Serialize};

use crate::{Bundle, Config, ConfigSection, Tracing, TracingConfig};

/// The `"container"` configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Default options of the built container.
    pub resolve_options: ResolveOptions,
    pub duplicate_implementation_action: DuplicateImplementationAction,
    /// Run auto-registration after the bundles are installed.
    pub auto_register: bool,
    /// Module prefixes scanned by auto-registration; empty scans every loaded type.
    pub modules: Vec<String>,
}

impl ConfigSection for ContainerConfig {
    fn key() -> &'static str {
        "container"
    }
}

/// Builds a root container from configuration.
///
/// The configuration itself is registered as an instance of [`Config`], so
/// injected types can read their own sections.
///
/// # Examples
///
/// ```rust
/// use ferrule::{DependencyContainer, StdError};
/// use ferrule_base::{Bootstrap, Config};
/// use std::sync::Arc;
///
/// let config = Config::parse(r#"{
///     "container": {
///         "resolve_options": {"unregistered_resolution_action": "fail"}
///     }
/// }"#).unwrap();
///
/// let container = Bootstrap::new(config)
///     .with_bundle(|container: &DependencyContainer| -> Result<(), StdError> {
///         container.register_instance::<u16, u16>(Arc::new(8080))?;
///         Ok(())
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(*container.resolve::<u16>().unwrap(), 8080);
/// assert!(container.resolve::<Config>().is_ok());
/// ```
pub struct Bootstrap {
    config: Config,
    bundles: Vec<Box<dyn Bundle>>,
}

impl Bootstrap {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            bundles: Vec::new(),
        }
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, StdError> {
        Ok(Self::new(Config::parse_file(path).await?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Adds a bundle; bundles are installed in the order they were added.
    pub fn with_bundle<B>(mut self, bundle: B) -> Self
    where
        B: Bundle + 'static,
    {
        self.bundles.push(Box::new(bundle));
        self
    }

    /// Initializes tracing when a `"tracing"` section is present, creates the
    /// container, installs the bundles and runs auto-registration if enabled.
    pub fn build(self) -> Result<DependencyContainer, StdError> {
        if let Some(tracing) = self.config.get::<Option<TracingConfig>>(TracingConfig::key())? {
            Tracing::init(&tracing)?;
        }
        let container_config: ContainerConfig = self.config.section()?;

        let container = DependencyContainer::with_options(container_config.resolve_options);
        container.register_instance::<Config, Config>(Arc::new(self.config))?;
        for bundle in &self.bundles {
            bundle.install(&container)?;
        }

        if container_config.auto_register {
            let action = container_config.duplicate_implementation_action;
            if container_config.modules.is_empty() {
                container.auto_register(action)?;
            } else {
                let modules: Vec<&str> = container_config.modules.iter().map(String::as_str).collect();
                container.auto_register_modules(&modules, action, None)?;
            }
        }
        tracing::info!(
            bundles = self.bundles.len(),
            auto_register = container_config.auto_register,
            "container bootstrapped"
        );
        Ok(container)
    }
}
