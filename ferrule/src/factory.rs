use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::descriptor::Activator;
use crate::inject::SharedAny;
use crate::{
    ConstructorArgs, DependencyContainer, RegistrationKey, ResolutionError, ResolveOptions,
    StdError,
};

pub(crate) type DelegateFn =
    dyn Fn(&DependencyContainer, &ConstructorArgs) -> Result<SharedAny, StdError> + Send + Sync;

/// Strategy producing instances for one registration.
pub(crate) enum ObjectFactory {
    /// User supplied closure, invoked on every resolution.
    Delegate(Arc<DelegateFn>),
    /// New instance per resolution.
    MultiInstance(Activator),
    /// Lazily constructed on first resolution, then reused.
    Singleton {
        activator: Activator,
        instance: OnceCell<SharedAny>,
    },
    /// Pre-built instance, owned or observed.
    Instance(Box<dyn InstanceSlot>),
}

impl ObjectFactory {
    pub(crate) fn singleton(activator: Activator) -> Self {
        Self::Singleton {
            activator,
            instance: OnceCell::new(),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Delegate(_) => "delegate",
            Self::MultiInstance(_) => "multi-instance",
            Self::Singleton { .. } => "singleton",
            Self::Instance(slot) if slot.is_weak() => "weak instance",
            Self::Instance(_) => "instance",
        }
    }

    /// Produces an instance. `container` is the container owning the registration.
    pub(crate) fn get_object(
        &self,
        container: &DependencyContainer,
        key: &RegistrationKey,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> Result<SharedAny, ResolutionError> {
        match self {
            Self::Delegate(delegate) => {
                delegate(container, args).map_err(|source| ResolutionError::Construction {
                    type_name: key.ty().name(),
                    source,
                })
            }
            Self::MultiInstance(activator) => activator.construct(container, args, options),
            Self::Singleton {
                activator,
                instance,
            } => {
                if !args.is_empty() {
                    return Err(ResolutionError::SingletonArguments { key: key.clone() });
                }
                instance
                    .get_or_try_init(|| activator.construct(container, args, options))
                    .cloned()
            }
            Self::Instance(slot) => slot
                .get()
                .ok_or_else(|| ResolutionError::Unresolvable { key: key.clone() }),
        }
    }

    pub(crate) fn can_produce(
        &self,
        container: &DependencyContainer,
        args: &ConstructorArgs,
        options: &ResolveOptions,
    ) -> bool {
        match self {
            Self::Delegate(_) => true,
            Self::MultiInstance(activator) => activator.probe(container, args, options),
            Self::Singleton {
                activator,
                instance,
            } => {
                args.is_empty()
                    && (instance.get().is_some() || activator.probe(container, args, options))
            }
            Self::Instance(slot) => slot.is_alive(),
        }
    }

    pub(crate) fn as_singleton(&self) -> Result<Option<Self>, &'static str> {
        match self {
            Self::Delegate(_) => Err("delegate registrations are always multi-instance"),
            Self::MultiInstance(activator) => Ok(Some(Self::singleton(*activator))),
            Self::Singleton { .. } => Ok(None),
            Self::Instance(_) => Err("instance registrations have a fixed lifetime"),
        }
    }

    pub(crate) fn as_multi_instance(&self) -> Result<Option<Self>, &'static str> {
        match self {
            Self::Delegate(_) | Self::MultiInstance(_) => Ok(None),
            Self::Singleton { activator, .. } => Ok(Some(Self::MultiInstance(*activator))),
            Self::Instance(_) => Err("instance registrations have a fixed lifetime"),
        }
    }

    pub(crate) fn with_weak_reference(&self) -> Result<Option<Self>, &'static str> {
        match self {
            Self::Instance(slot) if slot.is_weak() => Ok(None),
            Self::Instance(slot) => Ok(Some(Self::Instance(slot.downgrade()))),
            _ => Err("only instance registrations hold references"),
        }
    }

    pub(crate) fn with_strong_reference(&self) -> Result<Option<Self>, &'static str> {
        match self {
            Self::Instance(slot) if !slot.is_weak() => Ok(None),
            Self::Instance(slot) => slot
                .upgrade()
                .map(|slot| Some(Self::Instance(slot)))
                .ok_or("the instance has already been dropped"),
            _ => Err("only instance registrations hold references"),
        }
    }

    /// Releases the instance if the factory owns a disposable one.
    pub(crate) fn dispose(&self) {
        if let Self::Instance(slot) = self {
            slot.dispose();
        }
    }
}

/// Storage of a pre-built instance, erased over its concrete and requested types.
pub(crate) trait InstanceSlot: Send + Sync {
    fn get(&self) -> Option<SharedAny>;

    fn is_weak(&self) -> bool;

    fn is_alive(&self) -> bool;

    fn downgrade(&self) -> Box<dyn InstanceSlot>;

    /// `None` when the observed instance has been dropped.
    fn upgrade(&self) -> Option<Box<dyn InstanceSlot>>;

    fn dispose(&self);
}

enum Ownership<T: ?Sized> {
    Owned(Arc<T>),
    Observed(Weak<T>),
}

/// An instance of `T` served as `I`.
pub(crate) struct Reference<I: ?Sized, T: ?Sized> {
    ownership: Ownership<T>,
    upcast: fn(Arc<T>) -> Arc<I>,
    dispose: Option<fn(&T)>,
}

impl<I, T> Reference<I, T>
where
    I: ?Sized + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    pub(crate) fn owned(instance: Arc<T>, upcast: fn(Arc<T>) -> Arc<I>) -> Self {
        Self {
            ownership: Ownership::Owned(instance),
            upcast,
            dispose: None,
        }
    }

    pub(crate) fn with_dispose(mut self, dispose: fn(&T)) -> Self {
        self.dispose = Some(dispose);
        self
    }

    fn with_ownership(&self, ownership: Ownership<T>) -> Box<dyn InstanceSlot> {
        Box::new(Self {
            ownership,
            upcast: self.upcast,
            dispose: self.dispose,
        })
    }

    fn target(&self) -> Option<Arc<T>> {
        match &self.ownership {
            Ownership::Owned(instance) => Some(instance.clone()),
            Ownership::Observed(instance) => instance.upgrade(),
        }
    }
}

impl<I, T> InstanceSlot for Reference<I, T>
where
    I: ?Sized + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    fn get(&self) -> Option<SharedAny> {
        let instance = (self.upcast)(self.target()?);
        Some(Arc::new(instance))
    }

    fn is_weak(&self) -> bool {
        matches!(self.ownership, Ownership::Observed(_))
    }

    fn is_alive(&self) -> bool {
        match &self.ownership {
            Ownership::Owned(_) => true,
            Ownership::Observed(instance) => instance.strong_count() > 0,
        }
    }

    fn downgrade(&self) -> Box<dyn InstanceSlot> {
        let observed = match &self.ownership {
            Ownership::Owned(instance) => Arc::downgrade(instance),
            Ownership::Observed(instance) => instance.clone(),
        };
        self.with_ownership(Ownership::Observed(observed))
    }

    fn upgrade(&self) -> Option<Box<dyn InstanceSlot>> {
        let instance = self.target()?;
        Some(self.with_ownership(Ownership::Owned(instance)))
    }

    fn dispose(&self) {
        if let (Ownership::Owned(instance), Some(dispose)) = (&self.ownership, self.dispose) {
            dispose(&**instance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(instance: Arc<String>) -> Reference<String, String> {
        Reference::owned(instance, |v| v)
    }

    fn is_alive(factory: &ObjectFactory) -> bool {
        matches!(factory, ObjectFactory::Instance(slot) if slot.is_alive())
    }

    #[test]
    fn test_weak_reference_follows_instance() {
        let instance = Arc::new(String::from("value"));
        let factory = ObjectFactory::Instance(Box::new(reference(instance.clone())));
        let factory = factory.with_weak_reference().unwrap().unwrap();
        assert!(is_alive(&factory));
        assert_eq!(factory.kind(), "weak instance");

        drop(instance);
        assert!(!is_alive(&factory));
        assert!(factory.with_strong_reference().is_err());
    }

    #[test]
    fn test_strong_reference_is_noop_for_owned() {
        let factory = ObjectFactory::Instance(Box::new(reference(Arc::new(String::new()))));
        assert!(factory.with_strong_reference().unwrap().is_none());
        assert!(factory.as_singleton().is_err());
        assert!(factory.as_multi_instance().is_err());
    }

    #[test]
    fn test_delegate_conversions() {
        let delegate: Arc<DelegateFn> =
            Arc::new(|_: &DependencyContainer, _: &ConstructorArgs| {
                Ok::<_, StdError>(Arc::new(Arc::new(1u8)) as SharedAny)
            });
        let factory = ObjectFactory::Delegate(delegate);
        assert!(factory.as_singleton().is_err());
        assert!(factory.as_multi_instance().unwrap().is_none());
        assert!(factory.with_weak_reference().is_err());
        assert!(factory.with_strong_reference().is_err());
    }
}
