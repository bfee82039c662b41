use std::any::{TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, trace};

use crate::autoregister::{Lifetime, plan_auto_registration};
use crate::descriptor::{Activator, find_loaded, loaded_types};
use crate::factory::{DelegateFn, ObjectFactory, Reference};
use crate::inject::{Arguments, SharedAny, downcast, select_constructor};
use crate::{
    ConstructorArgs, Dispose, DuplicateImplementationAction, Implements, Injectable, Parameter,
    RegistrationError, RegistrationKey, ResolutionError, ResolveOptions, StdError, TypeDescriptor,
    TypeKey,
};

/// Dependency injection container.
///
/// The container maps a (type, name) pair to a factory deciding how instances
/// are produced: constructed on every resolution, constructed once and shared,
/// handed out from a pre-built instance, or produced by a user closure.
/// Resolution falls back to the parent chain of child containers and, when the
/// options allow it, to constructing types that were never registered.
///
/// `DependencyContainer` is a cheap handle: clones share the same registrations.
/// All operations take `&self` and are safe to call from several threads.
///
/// # Examples
///
/// ```rust
/// use ferrule::{Constructor, DependencyContainer, Injectable};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// #[derive(Default)]
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".into()
///     }
/// }
///
/// impl Injectable for English {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::default()]
///     }
/// }
///
/// ferrule::implements!(English => dyn Greeter);
///
/// let container = DependencyContainer::new();
/// container.register::<dyn Greeter, English>().unwrap();
///
/// let greeter = container.resolve::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// // Interface registrations default to singletons.
/// assert!(Arc::ptr_eq(&greeter, &container.resolve::<dyn Greeter>().unwrap()));
/// ```
#[derive(Clone)]
pub struct DependencyContainer {
    inner: Arc<Inner>,
}

struct Inner {
    registrations: DashMap<RegistrationKey, Arc<ObjectFactory>>,
    known_types: DashMap<TypeId, Activator>,
    parent: Option<Weak<Inner>>,
    options: ResolveOptions,
    disposed: AtomicBool,
}

impl Inner {
    fn new(parent: Option<Weak<Inner>>, options: ResolveOptions) -> Self {
        Self {
            registrations: DashMap::new(),
            known_types: DashMap::new(),
            parent,
            options,
            disposed: AtomicBool::new(false),
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let factories: Vec<_> = self
            .registrations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.registrations.clear();
        self.known_types.clear();
        for factory in &factories {
            factory.dispose();
        }
        debug!(registrations = factories.len(), "container disposed");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Default for DependencyContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyContainer {
    /// Creates an empty root container with default resolve options.
    pub fn new() -> Self {
        Self::with_options(ResolveOptions::DEFAULT)
    }

    /// Creates an empty root container whose resolutions use `options` unless
    /// told otherwise.
    pub fn with_options(options: ResolveOptions) -> Self {
        Self {
            inner: Arc::new(Inner::new(None, options)),
        }
    }

    /// Default options of this container.
    pub fn options(&self) -> ResolveOptions {
        self.inner.options
    }

    /// Creates a child container.
    ///
    /// The child starts empty and inherits the default options. Resolutions it
    /// cannot satisfy locally are delegated to this container; registrations
    /// made in the child never affect the parent. The child only holds a weak
    /// link, so it does not keep the parent alive.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrule::DependencyContainer;
    /// use std::sync::Arc;
    ///
    /// let parent = DependencyContainer::new();
    /// parent.register_instance::<String, String>(Arc::new("parent".into())).unwrap();
    ///
    /// let child = parent.child_container();
    /// assert_eq!(*child.resolve::<String>().unwrap(), "parent");
    ///
    /// child.register_instance::<String, String>(Arc::new("child".into())).unwrap();
    /// assert_eq!(*child.resolve::<String>().unwrap(), "child");
    /// assert_eq!(*parent.resolve::<String>().unwrap(), "parent");
    /// ```
    pub fn child_container(&self) -> DependencyContainer {
        let child = Self {
            inner: Arc::new(Inner::new(
                Some(Arc::downgrade(&self.inner)),
                self.inner.options,
            )),
        };
        trace!(parent = self.id(), child = child.id(), "child container created");
        child
    }

    /// Parent container, if this is a child whose parent is still alive.
    pub fn parent(&self) -> Option<DependencyContainer> {
        let inner = self.inner.parent.as_ref()?.upgrade()?;
        Some(Self { inner })
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Whether a registration exists for `T` under `name` in this container,
    /// ignoring parents.
    pub fn is_registered<T>(&self, name: &str) -> bool
    where
        T: ?Sized + 'static,
    {
        self.inner
            .registrations
            .contains_key(&RegistrationKey::of::<T>(name))
    }

    // Registration

    /// Registers `T` as the unnamed implementation of `I`.
    ///
    /// Registering a type as itself (`I == T`) defaults to multi-instance;
    /// registering it as another type defaults to singleton. Use the returned
    /// [`RegisterOptions`] to change the lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Duplicate`] if `I` already has an unnamed
    /// registration in this container.
    pub fn register<I, T>(&self) -> Result<RegisterOptions<'_>, RegistrationError>
    where
        I: ?Sized + Send + Sync + 'static,
        T: Injectable + Implements<I>,
    {
        self.register_named::<I, T>("")
    }

    /// Registers `T` as the implementation of `I` under `name`.
    pub fn register_named<I, T>(&self, name: &str) -> Result<RegisterOptions<'_>, RegistrationError>
    where
        I: ?Sized + Send + Sync + 'static,
        T: Injectable + Implements<I>,
    {
        self.add_known_type::<T>();
        let activator = Activator::of::<I, T>();
        let factory = if TypeKey::of::<I>() == TypeKey::of::<T>() {
            ObjectFactory::MultiInstance(activator)
        } else {
            ObjectFactory::singleton(activator)
        };
        self.insert(RegistrationKey::of::<I>(name), factory)
    }

    /// Registers a pre-built instance, held strongly, as the unnamed `I`.
    ///
    /// The container never disposes instances registered this way, even if
    /// `T` implements [`Dispose`]. Use
    /// [`register_disposable`](Self::register_disposable) for that.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrule::DependencyContainer;
    /// use std::sync::Arc;
    ///
    /// let container = DependencyContainer::new();
    /// let value = Arc::new(42u32);
    /// container.register_instance::<u32, u32>(value.clone()).unwrap();
    ///
    /// assert!(Arc::ptr_eq(&value, &container.resolve::<u32>().unwrap()));
    /// ```
    pub fn register_instance<I, T>(
        &self,
        instance: Arc<T>,
    ) -> Result<RegisterOptions<'_>, RegistrationError>
    where
        I: ?Sized + Send + Sync + 'static,
        T: ?Sized + Implements<I>,
    {
        self.register_instance_named::<I, T>("", instance)
    }

    pub fn register_instance_named<I, T>(
        &self,
        name: &str,
        instance: Arc<T>,
    ) -> Result<RegisterOptions<'_>, RegistrationError>
    where
        I: ?Sized + Send + Sync + 'static,
        T: ?Sized + Implements<I>,
    {
        let reference = Reference::owned(instance, <T as Implements<I>>::upcast);
        self.insert(
            RegistrationKey::of::<I>(name),
            ObjectFactory::Instance(Box::new(reference)),
        )
    }

    /// Registers a pre-built instance that is disposed together with the
    /// container, as long as the registration still holds it strongly.
    pub fn register_disposable<I, T>(
        &self,
        instance: Arc<T>,
    ) -> Result<RegisterOptions<'_>, RegistrationError>
    where
        I: ?Sized + Send + Sync + 'static,
        T: ?Sized + Implements<I> + Dispose,
    {
        self.register_disposable_named::<I, T>("", instance)
    }

    pub fn register_disposable_named<I, T>(
        &self,
        name: &str,
        instance: Arc<T>,
    ) -> Result<RegisterOptions<'_>, RegistrationError>
    where
        I: ?Sized + Send + Sync + 'static,
        T: ?Sized + Implements<I> + Dispose,
    {
        let reference = Reference::owned(instance, <T as Implements<I>>::upcast)
            .with_dispose(<T as Dispose>::dispose);
        self.insert(
            RegistrationKey::of::<I>(name),
            ObjectFactory::Instance(Box::new(reference)),
        )
    }

    /// Registers a closure invoked on every resolution of the unnamed `I`.
    ///
    /// The closure receives the container owning the registration and the
    /// constructor arguments of the resolve call. Errors it returns surface as
    /// [`ResolutionError::Construction`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrule::DependencyContainer;
    /// use std::sync::Arc;
    ///
    /// let container = DependencyContainer::new();
    /// container
    ///     .register_delegate::<String, _>(|_, args| {
    ///         let name = args.get::<String>("name").map(|v| v.to_string());
    ///         Ok(Arc::new(format!("hello {}", name.unwrap_or_default())))
    ///     })
    ///     .unwrap();
    ///
    /// let args = ferrule::ConstructorArgs::new().with("name", Arc::new(String::from("bob")));
    /// let options = container.options();
    /// let greeting = container.resolve_with::<String>("", &args, &options).unwrap();
    /// assert_eq!(*greeting, "hello bob");
    /// ```
    pub fn register_delegate<I, F>(&self, delegate: F) -> Result<RegisterOptions<'_>, RegistrationError>
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(&DependencyContainer, &ConstructorArgs) -> Result<Arc<I>, StdError>
            + Send
            + Sync
            + 'static,
    {
        self.register_delegate_named::<I, F>("", delegate)
    }

    pub fn register_delegate_named<I, F>(
        &self,
        name: &str,
        delegate: F,
    ) -> Result<RegisterOptions<'_>, RegistrationError>
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(&DependencyContainer, &ConstructorArgs) -> Result<Arc<I>, StdError>
            + Send
            + Sync
            + 'static,
    {
        let delegate: Arc<DelegateFn> =
            Arc::new(move |container: &DependencyContainer, args: &ConstructorArgs| {
                let instance = delegate(container, args)?;
                Ok(Arc::new(instance) as SharedAny)
            });
        self.insert(RegistrationKey::of::<I>(name), ObjectFactory::Delegate(delegate))
    }

    /// Registers the type described by `implementation` as `requested` under
    /// `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::NotAssignable`] if the implementation does
    /// not declare `requested` among its interfaces and is not `requested`
    /// itself.
    pub fn register_type(
        &self,
        requested: TypeKey,
        implementation: &TypeDescriptor,
        name: &str,
    ) -> Result<RegisterOptions<'_>, RegistrationError> {
        let activator =
            implementation
                .activator_for(requested)
                .ok_or(RegistrationError::NotAssignable {
                    requested: requested.name(),
                    implementation: implementation.name(),
                })?;
        self.remember(implementation.activator());
        let factory = if requested == implementation.key() {
            ObjectFactory::MultiInstance(activator)
        } else {
            ObjectFactory::singleton(activator)
        };
        self.insert(RegistrationKey::new(requested, name), factory)
    }

    /// Registers several implementations of `I` at once, each named after its
    /// full type name and defaulting to singleton.
    ///
    /// Validation happens before anything is registered. If a registration
    /// conflicts with an existing one, those already made by this call are
    /// rolled back.
    ///
    /// # Errors
    ///
    /// * [`RegistrationError::DuplicateImplementation`] if a type is listed twice.
    /// * [`RegistrationError::TooFewImplementations`] for fewer than two types.
    /// * [`RegistrationError::NotAssignable`] if a type cannot be served as `I`.
    /// * [`RegistrationError::Duplicate`] if a name is already registered.
    pub fn register_multiple<I>(
        &self,
        implementations: &[TypeDescriptor],
    ) -> Result<MultiRegisterOptions<'_>, RegistrationError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let requested = TypeKey::of::<I>();

        let mut seen = HashSet::new();
        for descriptor in implementations {
            if !seen.insert(descriptor.key()) {
                return Err(RegistrationError::DuplicateImplementation {
                    requested: requested.name(),
                    implementation: descriptor.name(),
                });
            }
        }
        if implementations.len() < 2 {
            return Err(RegistrationError::TooFewImplementations {
                requested: requested.name(),
                count: implementations.len(),
            });
        }
        let activators = implementations
            .iter()
            .map(|descriptor| {
                descriptor
                    .activator_for(requested)
                    .map(|activator| (descriptor, activator))
                    .ok_or(RegistrationError::NotAssignable {
                        requested: requested.name(),
                        implementation: descriptor.name(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut registrations = Vec::with_capacity(activators.len());
        for (descriptor, activator) in activators {
            let key = RegistrationKey::new(requested, descriptor.name());
            match self.insert(key, ObjectFactory::singleton(activator)) {
                Ok(options) => {
                    self.remember(descriptor.activator());
                    registrations.push(options);
                }
                Err(err) => {
                    for options in &registrations {
                        self.inner.registrations.remove(options.key());
                    }
                    return Err(err);
                }
            }
        }
        Ok(MultiRegisterOptions { registrations })
    }

    /// Makes `T` constructible as an unregistered type in this container and
    /// its children, without registering it.
    pub fn add_known_type<T: Injectable>(&self) {
        self.remember(Activator::of::<T, T>());
    }

    fn remember(&self, activator: Activator) {
        self.inner
            .known_types
            .entry(activator.implementation().id())
            .or_insert(activator);
    }

    fn insert(
        &self,
        key: RegistrationKey,
        factory: ObjectFactory,
    ) -> Result<RegisterOptions<'_>, RegistrationError> {
        if self.is_disposed() {
            return Err(RegistrationError::Disposed);
        }
        let kind = factory.kind();
        let factory = Arc::new(factory);
        match self.inner.registrations.entry(key.clone()) {
            Entry::Occupied(_) => return Err(RegistrationError::Duplicate { key }),
            Entry::Vacant(entry) => {
                entry.insert(factory.clone());
            }
        }
        // A concurrent dispose may have cleared the map before the insert.
        if self.is_disposed() {
            self.inner
                .registrations
                .remove_if(&key, |_, current| Arc::ptr_eq(current, &factory));
            return Err(RegistrationError::Disposed);
        }
        debug!(%key, kind, "registered");
        Ok(RegisterOptions {
            container: self,
            key,
        })
    }

    fn convert(
        &self,
        key: &RegistrationKey,
        conversion: &'static str,
        f: fn(&ObjectFactory) -> Result<Option<ObjectFactory>, &'static str>,
    ) -> Result<(), RegistrationError> {
        let mut entry = self
            .inner
            .registrations
            .get_mut(key)
            .ok_or_else(|| RegistrationError::Missing { key: key.clone() })?;
        match f(entry.value().as_ref()) {
            Ok(Some(factory)) => {
                debug!(%key, from = entry.kind(), to = factory.kind(), "registration converted");
                *entry.value_mut() = Arc::new(factory);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(reason) => Err(RegistrationError::InvalidConversion {
                key: key.clone(),
                conversion,
                reason,
            }),
        }
    }

    /// Removes the unnamed registration of `T` from this container.
    ///
    /// Returns whether a registration was removed. Parents are not affected and
    /// the removed instance, if any, is not disposed.
    pub fn unregister<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.unregister_named::<T>("")
    }

    pub fn unregister_named<T>(&self, name: &str) -> bool
    where
        T: ?Sized + 'static,
    {
        let key = RegistrationKey::of::<T>(name);
        let removed = self.inner.registrations.remove(&key).is_some();
        if removed {
            debug!(%key, "unregistered");
        }
        removed
    }

    // Auto-registration

    /// Registers every loaded type, see [`auto_register_types`](Self::auto_register_types).
    pub fn auto_register(
        &self,
        duplicate_action: DuplicateImplementationAction,
    ) -> Result<(), RegistrationError> {
        let types: Vec<TypeDescriptor> = loaded_types().copied().collect();
        self.auto_register_types(&types, duplicate_action, None)
    }

    /// Registers loaded types submitted from the given modules or their
    /// submodules.
    pub fn auto_register_modules(
        &self,
        modules: &[&str],
        duplicate_action: DuplicateImplementationAction,
        predicate: Option<&dyn Fn(&TypeDescriptor) -> bool>,
    ) -> Result<(), RegistrationError> {
        let types: Vec<TypeDescriptor> = loaded_types()
            .filter(|descriptor| {
                modules
                    .iter()
                    .any(|module| in_module(descriptor.module(), module))
            })
            .copied()
            .collect();
        self.auto_register_types(&types, duplicate_action, predicate)
    }

    /// Registers `types` as planned by [`plan_auto_registration`].
    ///
    /// Registrations whose key already exists are skipped, so manual
    /// registrations made beforehand win.
    pub fn auto_register_types(
        &self,
        types: &[TypeDescriptor],
        duplicate_action: DuplicateImplementationAction,
        predicate: Option<&dyn Fn(&TypeDescriptor) -> bool>,
    ) -> Result<(), RegistrationError> {
        if self.is_disposed() {
            return Err(RegistrationError::Disposed);
        }
        let plan = plan_auto_registration(types, duplicate_action, |descriptor| {
            predicate.is_none_or(|predicate| predicate(descriptor))
        })?;
        debug!(types = types.len(), registrations = plan.len(), "auto-registering");

        for registration in plan {
            let is_self = registration.is_self_registration();
            let (key, lifetime, activator) = registration.into_parts();
            if is_self {
                self.remember(activator);
            }
            let factory = match lifetime {
                Lifetime::Singleton => ObjectFactory::singleton(activator),
                Lifetime::MultiInstance => ObjectFactory::MultiInstance(activator),
            };
            match self.insert(key.clone(), factory) {
                Ok(_) => {}
                Err(RegistrationError::Duplicate { .. }) => {
                    trace!(%key, "already registered, skipping");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    // Resolution

    /// Resolves the unnamed `T` with the container's default options.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrule::{DependencyContainer, ResolutionError};
    ///
    /// let container = DependencyContainer::new();
    /// assert!(matches!(
    ///     container.resolve::<String>(),
    ///     Err(ResolutionError::Unresolvable { .. })
    /// ));
    /// ```
    pub fn resolve<T>(&self) -> Result<Arc<T>, ResolutionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with::<T>("", &ConstructorArgs::new(), &self.inner.options)
    }

    pub fn resolve_named<T>(&self, name: &str) -> Result<Arc<T>, ResolutionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with::<T>(name, &ConstructorArgs::new(), &self.inner.options)
    }

    /// Resolves `T` registered under `name` (empty for unnamed).
    ///
    /// `args` override constructor parameters of the outermost construction
    /// by name and type. They are rejected by singleton registrations.
    pub fn resolve_with<T>(
        &self,
        name: &str,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> Result<Arc<T>, ResolutionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = RegistrationKey::of::<T>(name);
        let instance = self.resolve_key(&key, args, options)?;
        downcast(&instance).ok_or(ResolutionError::Unresolvable { key })
    }

    pub fn try_resolve<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<T>().ok()
    }

    pub fn try_resolve_named<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_named::<T>(name).ok()
    }

    pub fn try_resolve_with<T>(
        &self,
        name: &str,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with::<T>(name, args, options).ok()
    }

    /// Whether [`resolve`](Self::resolve) would find a registration or a usable
    /// constructor for `T`. Never constructs anything.
    pub fn can_resolve<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.can_resolve_with::<T>("", &ConstructorArgs::new(), &self.inner.options)
    }

    pub fn can_resolve_named<T>(&self, name: &str) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.can_resolve_with::<T>(name, &ConstructorArgs::new(), &self.inner.options)
    }

    pub fn can_resolve_with<T>(
        &self,
        name: &str,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.can_resolve_key(&RegistrationKey::of::<T>(name), args, options)
    }

    /// Resolves every registration of `T` in this container and its parents.
    ///
    /// Named registrations are always included; the unnamed one only with
    /// `include_unnamed`. A key registered in both a child and a parent is
    /// resolved from the child. Weak registrations whose instance is gone are
    /// skipped.
    pub fn resolve_all<T>(&self, include_unnamed: bool) -> Result<Vec<Arc<T>>, ResolutionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Err(ResolutionError::Disposed);
        }
        let ty = TypeKey::of::<T>();
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut current = Some(self.clone());
        while let Some(container) = current {
            for entry in container.inner.registrations.iter() {
                let key = entry.key();
                if key.ty() != ty || (!include_unnamed && !key.is_named()) {
                    continue;
                }
                if seen.insert(key.clone()) {
                    found.push((container.clone(), key.clone(), entry.value().clone()));
                }
            }
            current = container.parent();
        }

        let args = ConstructorArgs::new();
        let mut instances = Vec::with_capacity(found.len());
        for (owner, key, factory) in found {
            let instance = match factory.as_ref() {
                ObjectFactory::Instance(slot) => match slot.get() {
                    Some(instance) => instance,
                    None => continue,
                },
                factory => {
                    let _guard = ResolutionGuard::enter(owner.id(), &key).ok_or_else(|| {
                        ResolutionError::CircularDependency { key: key.clone() }
                    })?;
                    factory.get_object(&owner, &key, &args, &self.inner.options)?
                }
            };
            instances.push(downcast(&instance).ok_or(ResolutionError::Unresolvable { key })?);
        }
        Ok(instances)
    }

    /// Constructs a new `T` through its constructor descriptors, resolving
    /// parameters from this container. Nothing is registered.
    ///
    /// The constructor with the most parameters that can all be satisfied is
    /// used; ties go to the constructor declared first.
    pub fn construct<T: Injectable>(
        &self,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> Result<T, ResolutionError> {
        let constructors = T::constructors();
        let constructor = select_constructor(&constructors, |parameter| {
            self.can_satisfy(parameter, args, options)
        })
        .ok_or(ResolutionError::NoUsableConstructor {
            type_name: type_name::<T>(),
        })?;
        trace!(
            type_name = type_name::<T>(),
            parameters = constructor.parameters().len(),
            "constructing"
        );

        let mut values = Vec::with_capacity(constructor.parameters().len());
        for parameter in constructor.parameters() {
            let value = match args.matching(parameter) {
                Some(value) => value,
                None => self.resolve_key(
                    &RegistrationKey::unnamed(parameter.key()),
                    &ConstructorArgs::new(),
                    options,
                )?,
            };
            values.push((*parameter, value));
        }
        constructor
            .build(&mut Arguments::new(values))
            .map_err(|source| ResolutionError::Construction {
                type_name: type_name::<T>(),
                source,
            })
    }

    pub(crate) fn can_construct<T: Injectable>(
        &self,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> bool {
        T::constructors().iter().any(|constructor| {
            constructor
                .parameters()
                .iter()
                .all(|parameter| self.can_satisfy(parameter, args, options))
        })
    }

    fn can_satisfy(
        &self,
        parameter: &Parameter,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> bool {
        args.matching(parameter).is_some()
            || self.can_resolve_key(
                &RegistrationKey::unnamed(parameter.key()),
                &ConstructorArgs::new(),
                options,
            )
    }

    fn resolve_key(
        &self,
        key: &RegistrationKey,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> Result<SharedAny, ResolutionError> {
        if self.is_disposed() {
            return Err(ResolutionError::Disposed);
        }
        let circular = || ResolutionError::CircularDependency { key: key.clone() };

        if let Some((owner, matched, factory)) = self.find_registration(key, options) {
            let _guard = ResolutionGuard::enter(owner.id(), &matched).ok_or_else(circular)?;
            trace!(%key, kind = factory.kind(), "resolving registration");
            return factory.get_object(&owner, key, args, options);
        }
        if key.is_named() && !options.attempts_unnamed() {
            return Err(ResolutionError::Unresolvable { key: key.clone() });
        }
        if options.attempts_construction()
            && let Some(activator) = self.find_constructible(key.ty())
        {
            let _guard = ResolutionGuard::enter(self.id(), key).ok_or_else(circular)?;
            trace!(%key, "constructing unregistered type");
            return activator.construct(self, args, options);
        }
        Err(ResolutionError::Unresolvable { key: key.clone() })
    }

    fn can_resolve_key(
        &self,
        key: &RegistrationKey,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> bool {
        if self.is_disposed() {
            return false;
        }

        if let Some((owner, matched, factory)) = self.find_registration(key, options) {
            let Some(_guard) = ResolutionGuard::enter(owner.id(), &matched) else {
                return false;
            };
            return factory.can_produce(&owner, args, options);
        }
        if key.is_named() && !options.attempts_unnamed() {
            return false;
        }
        if !options.attempts_construction() {
            return false;
        }
        let Some(activator) = self.find_constructible(key.ty()) else {
            return false;
        };
        let Some(_guard) = ResolutionGuard::enter(self.id(), key) else {
            return false;
        };
        activator.probe(self, args, options)
    }

    /// Looks `key` up locally, then its unnamed fallback, then in the parents.
    /// Returns the owning container and the key that actually matched.
    fn find_registration(
        &self,
        key: &RegistrationKey,
        options: &ResolveOptions,
    ) -> Option<(DependencyContainer, RegistrationKey, Arc<ObjectFactory>)> {
        if let Some(factory) = self.local(key) {
            return Some((self.clone(), key.clone(), factory));
        }
        if key.is_named() && options.attempts_unnamed() {
            let unnamed = key.to_unnamed();
            if let Some(factory) = self.local(&unnamed) {
                return Some((self.clone(), unnamed, factory));
            }
        }
        self.parent()?.find_registration(key, options)
    }

    fn local(&self, key: &RegistrationKey) -> Option<Arc<ObjectFactory>> {
        self.inner
            .registrations
            .get(key)
            .map(|entry| entry.value().clone())
    }

    fn find_constructible(&self, ty: TypeKey) -> Option<Activator> {
        let mut current = Some(self.clone());
        while let Some(container) = current {
            if let Some(activator) = container.inner.known_types.get(&ty.id()) {
                return Some(*activator);
            }
            current = container.parent();
        }
        find_loaded(ty).map(|descriptor| descriptor.activator())
    }

    // Build-up

    /// Fills the empty properties of `instance` that this container can resolve.
    ///
    /// Properties that already hold a value are left alone and properties that
    /// cannot be resolved are skipped silently.
    pub fn build_up<T: Injectable>(&self, instance: &mut T) {
        self.build_up_with(instance, &self.inner.options);
    }

    pub fn build_up_with<T: Injectable>(&self, instance: &mut T, options: &ResolveOptions) {
        let args = ConstructorArgs::new();
        for property in T::properties() {
            if !property.is_empty(instance) {
                continue;
            }
            let key = RegistrationKey::unnamed(property.key());
            match self.resolve_key(&key, &args, options) {
                Ok(value) => {
                    property.assign(instance, &value);
                }
                Err(err) => {
                    trace!(property = property.name(), %err, "property not injected");
                }
            }
        }
    }

    // Disposal

    /// Releases every registration and disposes the strongly held disposable
    /// instances. Idempotent; later registrations and resolutions fail with
    /// `Disposed`. Dropping the last handle disposes as well.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

fn in_module(module: &str, prefix: &str) -> bool {
    module
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

thread_local! {
    static RESOLVING: RefCell<Vec<(usize, RegistrationKey)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a key as being resolved by a container on the current thread until dropped.
struct ResolutionGuard;

impl ResolutionGuard {
    /// Returns `None` if the container is already resolving the key.
    fn enter(container: usize, key: &RegistrationKey) -> Option<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|(id, v)| *id == container && v == key) {
                return None;
            }
            stack.push((container, key.clone()));
            Some(Self)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Changes the lifetime or the reference kind of a registration just made.
///
/// # Examples
///
/// ```rust
/// use ferrule::{Constructor, DependencyContainer, Injectable};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Counter;
///
/// impl Injectable for Counter {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::default()]
///     }
/// }
///
/// let container = DependencyContainer::new();
/// container.register::<Counter, Counter>().unwrap().as_singleton().unwrap();
///
/// let first = container.resolve::<Counter>().unwrap();
/// assert!(Arc::ptr_eq(&first, &container.resolve::<Counter>().unwrap()));
/// ```
pub struct RegisterOptions<'c> {
    container: &'c DependencyContainer,
    key: RegistrationKey,
}

impl<'c> RegisterOptions<'c> {
    pub fn key(&self) -> &RegistrationKey {
        &self.key
    }

    /// Makes the registration construct once and share the instance.
    ///
    /// Fails for delegate and instance registrations.
    pub fn as_singleton(self) -> Result<Self, RegistrationError> {
        self.container
            .convert(&self.key, "as_singleton", ObjectFactory::as_singleton)?;
        Ok(self)
    }

    /// Makes the registration construct a new instance per resolution.
    ///
    /// Fails for instance registrations.
    pub fn as_multi_instance(self) -> Result<Self, RegistrationError> {
        self.container
            .convert(&self.key, "as_multi_instance", ObjectFactory::as_multi_instance)?;
        Ok(self)
    }

    /// Holds the registered instance weakly: it stays resolvable only while
    /// someone else keeps it alive.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrule::DependencyContainer;
    /// use std::sync::Arc;
    ///
    /// let container = DependencyContainer::new();
    /// let value = Arc::new(String::from("transient"));
    /// container
    ///     .register_instance::<String, String>(value.clone())
    ///     .unwrap()
    ///     .with_weak_reference()
    ///     .unwrap();
    ///
    /// assert!(container.can_resolve::<String>());
    /// drop(value);
    /// assert!(container.resolve::<String>().is_err());
    /// ```
    pub fn with_weak_reference(self) -> Result<Self, RegistrationError> {
        self.container.convert(
            &self.key,
            "with_weak_reference",
            ObjectFactory::with_weak_reference,
        )?;
        Ok(self)
    }

    /// Holds the registered instance strongly again.
    ///
    /// Fails if a weakly held instance has already been dropped.
    pub fn with_strong_reference(self) -> Result<Self, RegistrationError> {
        self.container.convert(
            &self.key,
            "with_strong_reference",
            ObjectFactory::with_strong_reference,
        )?;
        Ok(self)
    }
}

/// Lifetime options applied to every registration of a
/// [`register_multiple`](DependencyContainer::register_multiple) call.
pub struct MultiRegisterOptions<'c> {
    registrations: Vec<RegisterOptions<'c>>,
}

impl<'c> MultiRegisterOptions<'c> {
    pub fn keys(&self) -> impl Iterator<Item = &RegistrationKey> {
        self.registrations.iter().map(RegisterOptions::key)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn as_singleton(self) -> Result<Self, RegistrationError> {
        self.apply(RegisterOptions::as_singleton)
    }

    pub fn as_multi_instance(self) -> Result<Self, RegistrationError> {
        self.apply(RegisterOptions::as_multi_instance)
    }

    fn apply(
        self,
        f: fn(RegisterOptions<'c>) -> Result<RegisterOptions<'c>, RegistrationError>,
    ) -> Result<Self, RegistrationError> {
        let registrations = self
            .registrations
            .into_iter()
            .map(f)
            .collect::<Result<_, _>>()?;
        Ok(Self { registrations })
    }
}
