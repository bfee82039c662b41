use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::inject::SharedAny;
use crate::{
    ConstructorArgs, DependencyContainer, Implements, Injectable, ResolutionError, ResolveOptions,
    TypeKey,
};

type ConstructFn =
    fn(&DependencyContainer, &ConstructorArgs, &ResolveOptions) -> Result<SharedAny, ResolutionError>;

type ProbeFn = fn(&DependencyContainer, &ConstructorArgs, &ResolveOptions) -> bool;

/// Builds an implementation and hands it out as a requested type.
#[derive(Clone, Copy)]
pub(crate) struct Activator {
    implementation: fn() -> TypeKey,
    construct: ConstructFn,
    probe: ProbeFn,
}

impl Activator {
    pub(crate) const fn of<I, T>() -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        T: Injectable + Implements<I>,
    {
        Self {
            implementation: TypeKey::of::<T>,
            construct: construct_as::<I, T>,
            probe: probe::<T>,
        }
    }

    pub(crate) fn implementation(&self) -> TypeKey {
        (self.implementation)()
    }

    pub(crate) fn construct(
        &self,
        container: &DependencyContainer,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> Result<SharedAny, ResolutionError> {
        (self.construct)(container, args, options)
    }

    pub(crate) fn probe(
        &self,
        container: &DependencyContainer,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> bool {
        (self.probe)(container, args, options)
    }
}

fn construct_as<I, T>(
    container: &DependencyContainer,
    args: &ConstructorArgs,
    options: &ResolveOptions,
) -> Result<SharedAny, ResolutionError>
where
    I: ?Sized + Send + Sync + 'static,
    T: Injectable + Implements<I>,
{
    let instance = Arc::new(container.construct::<T>(args, options)?);
    let instance: Arc<I> = <T as Implements<I>>::upcast(instance);
    Ok(Arc::new(instance))
}

fn probe<T: Injectable>(
    container: &DependencyContainer,
    args: &ConstructorArgs,
    options: &ResolveOptions,
) -> bool {
    container.can_construct::<T>(args, options)
}

/// Binds an implementation to one of the interfaces it can be served as.
#[derive(Clone, Copy)]
pub struct InterfaceBinding {
    interface: fn() -> TypeKey,
    activator: Activator,
}

impl InterfaceBinding {
    pub const fn of<I, T>() -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        T: Injectable + Implements<I>,
    {
        Self {
            interface: TypeKey::of::<I>,
            activator: Activator::of::<I, T>(),
        }
    }

    pub fn interface(&self) -> TypeKey {
        (self.interface)()
    }

    pub fn implementation(&self) -> TypeKey {
        self.activator.implementation()
    }

    pub(crate) fn activator(&self) -> Activator {
        self.activator
    }
}

impl fmt::Debug for InterfaceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceBinding")
            .field("interface", &self.interface())
            .field("implementation", &self.implementation())
            .finish()
    }
}

/// Static description of an injectable type.
///
/// Descriptors are what registration by descriptor and auto-registration work
/// with. They are usually submitted to the global list of loaded types by the
/// derive macro or by [`submit_type!`](crate::submit_type), and can also be
/// built directly with [`TypeDescriptor::of`].
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    module: &'static str,
    activator: Activator,
    interfaces: fn() -> Vec<InterfaceBinding>,
}

impl TypeDescriptor {
    pub const fn of<T: Injectable>(module: &'static str) -> Self {
        Self {
            module,
            activator: Activator::of::<T, T>(),
            interfaces: T::interfaces,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.activator.implementation()
    }

    /// Full type name, also used as the registration name by multi-registration.
    pub fn name(&self) -> &'static str {
        self.key().name()
    }

    /// Module path the type was submitted from.
    pub fn module(&self) -> &'static str {
        self.module
    }

    /// Declared interfaces, excluding the type itself.
    pub fn interfaces(&self) -> Vec<InterfaceBinding> {
        (self.interfaces)()
    }

    /// Whether the type can be served as `interface`.
    pub fn implements(&self, interface: TypeKey) -> bool {
        self.activator_for(interface).is_some()
    }

    pub(crate) fn activator(&self) -> Activator {
        self.activator
    }

    pub(crate) fn activator_for(&self, requested: TypeKey) -> Option<Activator> {
        if requested == self.key() {
            return Some(self.activator);
        }
        self.interfaces()
            .into_iter()
            .find(|binding| binding.interface() == requested)
            .map(|binding| binding.activator)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name())
            .field("module", &self.module)
            .field("interfaces", &self.interfaces())
            .finish()
    }
}

inventory::collect!(TypeDescriptor);

/// Submits a type to the list of loaded types used by auto-registration and
/// by construction of unregistered types.
///
/// `#[derive(Injectable)]` and `#[injectable]` do this automatically.
///
/// ```rust
/// use ferrule::{Constructor, Injectable};
///
/// #[derive(Default)]
/// struct Clock;
///
/// impl Injectable for Clock {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::default()]
///     }
/// }
///
/// ferrule::submit_type!(Clock);
///
/// assert!(ferrule::loaded_types().any(|d| d.name().ends_with("Clock")));
/// ```
#[macro_export]
macro_rules! submit_type {
    ($ty:ty) => {
        $crate::__private::inventory::submit! {
            $crate::TypeDescriptor::of::<$ty>(::core::module_path!())
        }
    };
}

/// Iterates over every type submitted in the program.
pub fn loaded_types() -> impl Iterator<Item = &'static TypeDescriptor> {
    inventory::iter::<TypeDescriptor>.into_iter()
}

static LOADED: Lazy<HashMap<TypeId, TypeDescriptor>> = Lazy::new(|| {
    let mut types = HashMap::new();
    for descriptor in loaded_types() {
        types.entry(descriptor.key().id()).or_insert(*descriptor);
    }
    types
});

pub(crate) fn find_loaded(key: TypeKey) -> Option<TypeDescriptor> {
    LOADED.get(&key.id()).copied()
}
