//! # ferrule
//!
//! A runtime dependency injection container: types are registered against the
//! interfaces they implement and resolved on demand with their constructor
//! dependencies filled in.
//!
//! ## Core Concepts
//!
//! - **DependencyContainer**: Maps a (type, name) pair to a factory and resolves instances
//! - **Injectable**: Describes how a type is constructed, which properties it exposes and
//!   which interfaces it implements
//! - **Implements**: Lets an `Arc<T>` be served as an `Arc<dyn Interface>`
//! - **Factories**: Multi-instance, singleton, pre-built instance (strong or weak) and delegate
//! - **Child containers**: Scopes that fall back to their parent for missing registrations
//! - **Auto-registration**: Registers loaded types and their interfaces in bulk
//!
//! ## Basic Usage
//!
//! ```rust
//! use ferrule::{DependencyContainer, Injectable};
//! use std::sync::Arc;
//!
//! trait Repository: Send + Sync {
//!     fn name(&self) -> &str;
//! }
//!
//! #[derive(Injectable)]
//! #[inject(implements(dyn Repository))]
//! struct MemoryRepository;
//!
//! impl Repository for MemoryRepository {
//!     fn name(&self) -> &str {
//!         "memory"
//!     }
//! }
//!
//! #[derive(Injectable)]
//! struct UserService {
//!     repository: Arc<dyn Repository>,
//! }
//!
//! let container = DependencyContainer::new();
//! container.register::<dyn Repository, MemoryRepository>()?;
//!
//! // UserService is not registered: it is constructed from its descriptor.
//! let service = container.resolve::<UserService>()?;
//! assert_eq!(service.repository.name(), "memory");
//! # Ok::<(), ferrule::Error>(())
//! ```
//!
//! ## Named Registrations and Lifetimes
//!
//! ```rust
//! use ferrule::{DependencyContainer, Injectable};
//! use std::sync::Arc;
//!
//! #[derive(Injectable, Default)]
//! struct Connection;
//!
//! let container = DependencyContainer::new();
//! container.register::<Connection, Connection>()?.as_singleton()?;
//! container.register_named::<Connection, Connection>("replica")?;
//!
//! let primary = container.resolve::<Connection>()?;
//! assert!(Arc::ptr_eq(&primary, &container.resolve::<Connection>()?));
//!
//! let replica = container.resolve_named::<Connection>("replica")?;
//! assert!(!Arc::ptr_eq(&replica, &container.resolve_named::<Connection>("replica")?));
//! # Ok::<(), ferrule::Error>(())
//! ```
//!
//! ## Features
//!
//! - `macros` (default): `#[derive(Injectable)]` and `#[injectable]` for impl blocks
//! - `serde`: Serialization of [`ResolveOptions`] and the related policy enums

mod autoregister;
mod container;
mod descriptor;
mod error;
mod factory;
mod inject;
mod key;
mod options;

pub use autoregister::*;
pub use container::*;
pub use descriptor::*;
pub use error::*;
pub use inject::*;
pub use key::*;
pub use options::*;

#[cfg(feature = "macros")]
pub use ferrule_macros::*;

#[doc(hidden)]
pub mod __private {
    pub use inventory;
}
