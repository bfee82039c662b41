//! Descriptors that replace runtime reflection.
//!
//! A type takes part in constructor injection by implementing [`Injectable`]:
//! it lists its constructors (each an ordered set of [`Parameter`]s plus a build
//! closure), its build-up [`Property`]s and the interfaces it can be served as.
//! The container picks a constructor by looking at which parameters it can
//! currently satisfy, resolves them and hands them to the build closure through
//! [`Arguments`].
//!
//! # Examples
//!
//! Writing the descriptors by hand:
//!
//! ```rust
//! use ferrule::{Constructor, DependencyContainer, Injectable, Parameter};
//! use std::sync::Arc;
//!
//! struct Engine;
//!
//! impl Injectable for Engine {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::from_default_fn(|| Engine)]
//!     }
//! }
//!
//! struct Car {
//!     engine: Arc<Engine>,
//! }
//!
//! impl Injectable for Car {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(
//!             vec![Parameter::of::<Engine>("engine")],
//!             |args| Ok(Car { engine: args.next()? }),
//!         )]
//!     }
//! }
//!
//! let container = DependencyContainer::new();
//! container.register::<Engine, Engine>().unwrap();
//! container.register::<Car, Car>().unwrap();
//! let car = container.resolve::<Car>().unwrap();
//! # let _ = &car.engine;
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{InterfaceBinding, ResolutionError, StdError, TypeKey};

/// Type-erased shared instance. Always holds an `Arc<T>` for the registered `T`.
pub(crate) type SharedAny = Arc<dyn Any + Send + Sync>;

pub(crate) fn downcast<T>(instance: &SharedAny) -> Option<Arc<T>>
where
    T: ?Sized + 'static,
{
    instance.downcast_ref::<Arc<T>>().cloned()
}

/// A concrete type the container knows how to construct and inject.
///
/// Usually derived with `#[derive(Injectable)]` or generated by `#[injectable]`
/// on an impl block.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructors in declaration order.
    fn constructors() -> Vec<Constructor<Self>>;

    /// Properties filled by [`DependencyContainer::build_up`](crate::DependencyContainer::build_up).
    fn properties() -> Vec<Property<Self>> {
        Vec::new()
    }

    /// Interfaces this type is registered under by auto-registration.
    fn interfaces() -> Vec<InterfaceBinding> {
        Vec::new()
    }
}

/// Declares that an `Arc<Self>` can be served as an `Arc<I>`.
///
/// This is the assignability relation between an implementation and a requested
/// type. Every type implements itself; implementations for trait objects are
/// generated by `#[inject(implements(...))]`, `#[injectable(implements(...))]` or
/// [`implements!`](crate::implements).
pub trait Implements<I>: Send + Sync + 'static
where
    I: ?Sized,
{
    fn upcast(self: Arc<Self>) -> Arc<I>;
}

impl<T> Implements<T> for T
where
    T: ?Sized + Send + Sync + 'static,
{
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Generates [`Implements`] for a concrete type and a list of trait objects.
///
/// ```rust
/// use std::sync::Arc;
///
/// trait Animal: Send + Sync {}
///
/// struct Fish;
/// impl Animal for Fish {}
///
/// ferrule::implements!(Fish => dyn Animal);
///
/// let animal: Arc<dyn Animal> = ferrule::Implements::<dyn Animal>::upcast(Arc::new(Fish));
/// # let _ = animal;
/// ```
#[macro_export]
macro_rules! implements {
    ($ty:ty => $($iface:ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$iface> for $ty {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$iface> {
                    self
                }
            }
        )+
    };
}

/// Disposal contract for instances owned by a container.
///
/// Strong instance registrations made with
/// [`register_disposable`](crate::DependencyContainer::register_disposable) are
/// disposed when their container is disposed. Implementations must tolerate
/// being called more than once when the same instance is registered twice.
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self);
}

/// One constructor parameter: its name and the type it is resolved as.
#[derive(Clone, Copy, Debug)]
pub struct Parameter {
    name: &'static str,
    key: TypeKey,
}

impl Parameter {
    pub fn of<T>(name: &'static str) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            name,
            key: TypeKey::of::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }
}

/// A constructor descriptor: ordered parameters and the closure building the value.
pub struct Constructor<T> {
    parameters: Vec<Parameter>,
    build: Box<dyn Fn(&mut Arguments) -> Result<T, StdError>>,
}

impl<T> Constructor<T> {
    pub fn new<F>(parameters: Vec<Parameter>, build: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<T, StdError> + 'static,
    {
        Self {
            parameters,
            build: Box::new(build),
        }
    }

    /// A parameterless constructor calling `f`.
    pub fn from_default_fn(f: fn() -> T) -> Self
    where
        T: 'static,
    {
        Self::new(Vec::new(), move |_| Ok(f()))
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn build(&self, args: &mut Arguments) -> Result<T, StdError> {
        (self.build)(args)
    }
}

impl<T> Default for Constructor<T>
where
    T: Default + 'static,
{
    fn default() -> Self {
        Self::from_default_fn(T::default)
    }
}

impl<T> fmt::Debug for Constructor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Picks the constructor with the most parameters among those whose every
/// parameter is satisfiable. Ties keep the constructor declared first.
pub(crate) fn select_constructor<'a, T, F>(
    constructors: &'a [Constructor<T>],
    mut satisfiable: F,
) -> Option<&'a Constructor<T>>
where
    F: FnMut(&Parameter) -> bool,
{
    let mut best: Option<&Constructor<T>> = None;
    for constructor in constructors {
        if best.is_some_and(|v| v.parameters.len() >= constructor.parameters.len()) {
            continue;
        }
        if constructor.parameters.iter().all(&mut satisfiable) {
            best = Some(constructor);
        }
    }
    best
}

/// Resolved values handed to a constructor's build closure, in parameter order.
pub struct Arguments {
    values: std::vec::IntoIter<(Parameter, SharedAny)>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<(Parameter, SharedAny)>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }

    /// Takes the next argument as an `Arc<T>`.
    pub fn next<T>(&mut self) -> Result<Arc<T>, ResolutionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let (parameter, value) = self
            .values
            .next()
            .ok_or(ResolutionError::ArgumentsExhausted {
                expected: type_name::<T>(),
            })?;
        downcast(&value).ok_or(ResolutionError::ArgumentMismatch {
            name: parameter.name,
            expected: type_name::<T>(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

/// Named constructor arguments overriding container resolution.
///
/// A parameter is taken from here when both its name and its type match;
/// otherwise the container resolves it. Only the outermost construction of a
/// resolve call sees these arguments.
///
/// # Examples
///
/// ```rust
/// use ferrule::ConstructorArgs;
/// use std::sync::Arc;
///
/// let args = ConstructorArgs::new().with("greeting", Arc::new(String::from("hi")));
/// assert_eq!(args.get::<String>("greeting").as_deref().map(String::as_str), Some("hi"));
/// assert!(args.get::<u32>("greeting").is_none());
/// ```
#[derive(Clone, Default)]
pub struct ConstructorArgs {
    values: HashMap<String, (TypeKey, SharedAny)>,
}

impl ConstructorArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T>(mut self, name: impl Into<String>, value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(name, value);
        self
    }

    pub fn insert<T>(&mut self, name: impl Into<String>, value: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.values
            .insert(name.into(), (TypeKey::of::<T>(), Arc::new(value)));
    }

    pub fn get<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.values.get(name).and_then(|(_, v)| downcast(v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn matching(&self, parameter: &Parameter) -> Option<SharedAny> {
        match self.values.get(parameter.name) {
            Some((key, value)) if *key == parameter.key => Some(value.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for ConstructorArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter().map(|(name, (key, _))| (name, key)))
            .finish()
    }
}

/// A property filled by build-up: an `Option<Arc<P>>` slot of `T`.
pub struct Property<T> {
    name: &'static str,
    key: TypeKey,
    is_empty: Box<dyn Fn(&mut T) -> bool>,
    assign: Box<dyn Fn(&mut T, &SharedAny) -> bool>,
}

impl<T> Property<T>
where
    T: 'static,
{
    /// Describes the property behind `slot`.
    ///
    /// ```rust
    /// use ferrule::Property;
    /// use std::sync::Arc;
    ///
    /// struct Controller {
    ///     greeting: Option<Arc<String>>,
    /// }
    ///
    /// fn greeting(this: &mut Controller) -> &mut Option<Arc<String>> {
    ///     &mut this.greeting
    /// }
    ///
    /// let property = Property::new("greeting", greeting);
    /// assert_eq!(property.name(), "greeting");
    /// ```
    pub fn new<P>(name: &'static str, slot: fn(&mut T) -> &mut Option<Arc<P>>) -> Self
    where
        P: ?Sized + Send + Sync + 'static,
    {
        Self {
            name,
            key: TypeKey::of::<P>(),
            is_empty: Box::new(move |this| slot(this).is_none()),
            assign: Box::new(move |this, value| match downcast::<P>(value) {
                Some(value) => {
                    *slot(this) = Some(value);
                    true
                }
                None => false,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub(crate) fn is_empty(&self, instance: &mut T) -> bool {
        (self.is_empty)(instance)
    }

    pub(crate) fn assign(&self, instance: &mut T, value: &SharedAny) -> bool {
        (self.assign)(instance, value)
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unit;

    fn constructor(parameters: Vec<Parameter>) -> Constructor<Unit> {
        Constructor::new(parameters, |_| Ok(Unit))
    }

    #[test]
    fn test_select_prefers_most_parameters() {
        let constructors = vec![
            constructor(vec![]),
            constructor(vec![Parameter::of::<u8>("a"), Parameter::of::<u16>("b")]),
            constructor(vec![Parameter::of::<u8>("a")]),
        ];
        let selected = select_constructor(&constructors, |_| true).unwrap();
        assert_eq!(selected.parameters().len(), 2);
    }

    #[test]
    fn test_select_skips_unsatisfiable() {
        let constructors = vec![
            constructor(vec![Parameter::of::<u8>("a")]),
            constructor(vec![Parameter::of::<u8>("a"), Parameter::of::<u16>("b")]),
        ];
        let selected =
            select_constructor(&constructors, |p| p.key() != TypeKey::of::<u16>()).unwrap();
        assert_eq!(selected.parameters().len(), 1);
    }

    #[test]
    fn test_select_ties_keep_declaration_order() {
        let constructors = vec![
            constructor(vec![Parameter::of::<u8>("first")]),
            constructor(vec![Parameter::of::<u16>("second")]),
        ];
        let selected = select_constructor(&constructors, |_| true).unwrap();
        assert_eq!(selected.parameters()[0].name(), "first");
    }

    #[test]
    fn test_select_none_when_nothing_satisfiable() {
        let constructors = vec![constructor(vec![Parameter::of::<u8>("a")])];
        assert!(select_constructor(&constructors, |_| false).is_none());
        assert!(select_constructor::<Unit, _>(&[], |_| true).is_none());
    }

    #[test]
    fn test_arguments_in_order() {
        let mut args = Arguments::new(vec![
            (Parameter::of::<u8>("a"), Arc::new(Arc::new(1u8)) as SharedAny),
            (Parameter::of::<str>("b"), Arc::new(Arc::<str>::from("b")) as SharedAny),
        ]);
        assert_eq!(*args.next::<u8>().unwrap(), 1);
        assert!(matches!(
            args.next::<u8>(),
            Err(ResolutionError::ArgumentMismatch { name: "b", .. })
        ));
        assert!(matches!(
            args.next::<u8>(),
            Err(ResolutionError::ArgumentsExhausted { .. })
        ));
    }

    #[test]
    fn test_constructor_args_match_name_and_type() {
        let args = ConstructorArgs::new().with("port", Arc::new(8080u16));
        assert!(args.matching(&Parameter::of::<u16>("port")).is_some());
        assert!(args.matching(&Parameter::of::<u32>("port")).is_none());
        assert!(args.matching(&Parameter::of::<u16>("host")).is_none());
    }
}
