//! # ferrule-base
//!
//! Application plumbing around the ferrule container: JSON configuration
//! sections, tracing setup, registration bundles and a bootstrap that builds
//! a root container from configuration.
//!
//! ## Core Components
//!
//! - **Configuration**: Typed sections loaded and merged from JSON sources
//! - **Tracing**: `tracing-subscriber` setup driven by a `"tracing"` section
//! - **Bundles**: Reusable groups of registrations
//! - **Bootstrap**: Builds the container, installs bundles and auto-registers types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrule::{DependencyContainer, StdError};
//! use ferrule_base::Bootstrap;
//!
//! fn services(container: &DependencyContainer) -> Result<(), StdError> {
//!     container.register_instance::<String, String>(std::sync::Arc::new("ready".into()))?;
//!     Ok(())
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), StdError> {
//!     let container = Bootstrap::from_file("config.json")
//!         .await?
//!         .with_bundle(services)
//!         .build()?;
//!
//!     println!("{}", container.resolve::<String>()?);
//!     container.dispose();
//!     Ok(())
//! }
//! ```

mod bootstrap;
mod bundle;
mod config;
mod tracing;

pub use bootstrap::*;
pub use bundle::*;
pub use config::*;
pub use tracing::*;
