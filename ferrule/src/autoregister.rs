use std::collections::HashSet;
use std::fmt;

use crate::descriptor::Activator;
use crate::{
    DuplicateImplementationAction, InterfaceBinding, RegistrationError, RegistrationKey, TypeKey,
    TypeDescriptor,
};

/// Lifetime of a planned registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Singleton,
    MultiInstance,
}

/// One registration produced by [`plan_auto_registration`].
#[derive(Clone)]
pub struct AutoRegistration {
    key: RegistrationKey,
    lifetime: Lifetime,
    activator: Activator,
}

impl AutoRegistration {
    pub fn key(&self) -> &RegistrationKey {
        &self.key
    }

    pub fn implementation(&self) -> TypeKey {
        self.activator.implementation()
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Whether the registration serves the implementation as itself.
    pub fn is_self_registration(&self) -> bool {
        self.key.ty() == self.implementation()
    }

    pub(crate) fn into_parts(self) -> (RegistrationKey, Lifetime, Activator) {
        (self.key, self.lifetime, self.activator)
    }
}

impl fmt::Debug for AutoRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoRegistration")
            .field("key", &self.key)
            .field("implementation", &self.implementation())
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Computes the registrations auto-registration would make for `types`.
///
/// Every type accepted by `predicate` is registered as itself, multi-instance.
/// Each declared interface is registered as a singleton of its first
/// implementer; with several implementers `duplicate_action` decides whether
/// the others are dropped, registered under their type names, or rejected.
/// Types are visited in the given order and duplicates are ignored.
pub fn plan_auto_registration<F>(
    types: &[TypeDescriptor],
    duplicate_action: DuplicateImplementationAction,
    mut predicate: F,
) -> Result<Vec<AutoRegistration>, RegistrationError>
where
    F: FnMut(&TypeDescriptor) -> bool,
{
    let mut seen = HashSet::new();
    let eligible: Vec<&TypeDescriptor> = types
        .iter()
        .filter(|descriptor| predicate(*descriptor) && seen.insert(descriptor.key()))
        .collect();

    let mut plan: Vec<AutoRegistration> = eligible
        .iter()
        .map(|descriptor| AutoRegistration {
            key: RegistrationKey::unnamed(descriptor.key()),
            lifetime: Lifetime::MultiInstance,
            activator: descriptor.activator(),
        })
        .collect();

    let mut interfaces: Vec<(TypeKey, Vec<InterfaceBinding>)> = Vec::new();
    for descriptor in &eligible {
        for binding in descriptor.interfaces() {
            let interface = binding.interface();
            if interface == descriptor.key() {
                continue;
            }
            match interfaces.iter_mut().find(|(key, _)| *key == interface) {
                Some((_, bindings)) => {
                    if bindings.iter().all(|v| v.implementation() != binding.implementation()) {
                        bindings.push(binding);
                    }
                }
                None => interfaces.push((interface, vec![binding])),
            }
        }
    }

    for (interface, bindings) in interfaces {
        let Some(first) = bindings.first() else {
            continue;
        };
        if bindings.len() > 1 {
            match duplicate_action {
                DuplicateImplementationAction::RegisterSingle => {}
                DuplicateImplementationAction::RegisterMultiple => {
                    plan.extend(bindings.iter().map(|binding| AutoRegistration {
                        key: RegistrationKey::new(interface, binding.implementation().name()),
                        lifetime: Lifetime::Singleton,
                        activator: binding.activator(),
                    }));
                }
                DuplicateImplementationAction::Fail => {
                    return Err(RegistrationError::AmbiguousImplementations {
                        interface: interface.name(),
                        implementations: bindings
                            .iter()
                            .map(|binding| binding.implementation().name())
                            .collect(),
                    });
                }
            }
        }
        plan.push(AutoRegistration {
            key: RegistrationKey::unnamed(interface),
            lifetime: Lifetime::Singleton,
            activator: first.activator(),
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{Constructor, Implements, Injectable};

    trait Animal: Send + Sync {}
    trait Pet: Send + Sync {}

    macro_rules! animal {
        ($name:ident $(, $iface:ty)*) => {
            #[derive(Default)]
            struct $name;

            impl Animal for $name {}

            impl Injectable for $name {
                fn constructors() -> Vec<Constructor<Self>> {
                    vec![Constructor::default()]
                }

                fn interfaces() -> Vec<InterfaceBinding> {
                    vec![$(InterfaceBinding::of::<$iface, Self>()),*]
                }
            }

            $(
                impl Implements<$iface> for $name {
                    fn upcast(self: Arc<Self>) -> Arc<$iface> {
                        self
                    }
                }
            )*
        };
    }

    animal!(Cat, dyn Animal);
    animal!(Dog, dyn Animal);
    animal!(Stone);

    impl Pet for Cat {}

    struct Hamster;

    impl Animal for Hamster {}
    impl Pet for Hamster {}

    impl Injectable for Hamster {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::from_default_fn(|| Hamster)]
        }

        fn interfaces() -> Vec<InterfaceBinding> {
            vec![
                InterfaceBinding::of::<dyn Pet, Self>(),
                InterfaceBinding::of::<dyn Animal, Self>(),
            ]
        }
    }

    crate::implements!(Hamster => dyn Animal, dyn Pet);

    fn types() -> Vec<TypeDescriptor> {
        vec![
            TypeDescriptor::of::<Cat>(module_path!()),
            TypeDescriptor::of::<Dog>(module_path!()),
            TypeDescriptor::of::<Stone>(module_path!()),
        ]
    }

    fn keys(plan: &[AutoRegistration]) -> Vec<String> {
        plan.iter().map(|v| v.key().to_string()).collect()
    }

    #[test]
    fn test_register_single_keeps_first() {
        let plan =
            plan_auto_registration(&types(), DuplicateImplementationAction::RegisterSingle, |_| {
                true
            })
            .unwrap();
        assert_eq!(plan.len(), 4);
        assert!(plan[..3].iter().all(AutoRegistration::is_self_registration));
        assert!(plan[..3].iter().all(|v| v.lifetime() == Lifetime::MultiInstance));

        let animal = &plan[3];
        assert_eq!(animal.key(), &RegistrationKey::of::<dyn Animal>(""));
        assert_eq!(animal.implementation(), TypeKey::of::<Cat>());
        assert_eq!(animal.lifetime(), Lifetime::Singleton);
    }

    #[test]
    fn test_register_multiple_names_each_implementation() {
        let plan = plan_auto_registration(
            &types(),
            DuplicateImplementationAction::RegisterMultiple,
            |_| true,
        )
        .unwrap();
        let keys = keys(&plan);
        let animal = TypeKey::of::<dyn Animal>();
        assert!(keys.contains(&RegistrationKey::new(animal, TypeKey::of::<Cat>().name()).to_string()));
        assert!(keys.contains(&RegistrationKey::new(animal, TypeKey::of::<Dog>().name()).to_string()));
        let unnamed = plan
            .iter()
            .find(|v| v.key() == &RegistrationKey::unnamed(animal))
            .unwrap();
        assert_eq!(unnamed.implementation(), TypeKey::of::<Cat>());
    }

    #[test]
    fn test_fail_on_ambiguous_interface() {
        let err = plan_auto_registration(&types(), DuplicateImplementationAction::Fail, |_| true)
            .unwrap_err();
        match err {
            RegistrationError::AmbiguousImplementations {
                interface,
                implementations,
            } => {
                assert_eq!(interface, TypeKey::of::<dyn Animal>().name());
                assert_eq!(implementations.len(), 2);
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn test_predicate_filters_before_grouping() {
        let plan = plan_auto_registration(&types(), DuplicateImplementationAction::Fail, |d| {
            d.key() != TypeKey::of::<Dog>()
        })
        .unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|v| v.implementation() != TypeKey::of::<Dog>()));
    }

    #[test]
    fn test_several_interfaces_and_duplicate_types() {
        let types = vec![
            TypeDescriptor::of::<Hamster>(module_path!()),
            TypeDescriptor::of::<Hamster>(module_path!()),
        ];
        let plan =
            plan_auto_registration(&types, DuplicateImplementationAction::Fail, |_| true).unwrap();
        assert_eq!(
            keys(&plan),
            vec![
                TypeKey::of::<Hamster>().to_string(),
                TypeKey::of::<dyn Pet>().to_string(),
                TypeKey::of::<dyn Animal>().to_string(),
            ]
        );
    }
}
