use ferrule::{DependencyContainer, StdError};

/// A reusable group of registrations.
///
/// Closures taking the container implement it, so small bundles need no type.
pub trait Bundle: Send + Sync {
    fn install(&self, container: &DependencyContainer) -> Result<(), StdError>;
}

impl<F> Bundle for F
where
    F: Fn(&DependencyContainer) -> Result<(), StdError> + Send + Sync,
{
    fn install(&self, container: &DependencyContainer) -> Result<(), StdError> {
        self(container)
    }
}

pub trait BundleExt {
    /// Installs `bundle` into `self`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrule::{DependencyContainer, StdError};
    /// use ferrule_base::BundleExt as _;
    /// use std::sync::Arc;
    ///
    /// fn greetings(container: &DependencyContainer) -> Result<(), StdError> {
    ///     container.register_instance::<String, String>(Arc::new("hello".into()))?;
    ///     Ok(())
    /// }
    ///
    /// let container = DependencyContainer::new();
    /// container.add_bundle(greetings).unwrap();
    /// assert_eq!(*container.resolve::<String>().unwrap(), "hello");
    /// ```
    fn add_bundle<B>(&self, bundle: B) -> Result<&Self, StdError>
    where
        B: Bundle;
}

impl BundleExt for DependencyContainer {
    fn add_bundle<B>(&self, bundle: B) -> Result<&Self, StdError>
    where
        B: Bundle,
    {
        bundle.install(self)?;
        Ok(self)
    }
}
