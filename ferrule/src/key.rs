use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime identity of a type, usable for both concrete types and trait objects.
///
/// Two keys are equal when their [`TypeId`]s are equal; the name is carried
/// for diagnostics only.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key of `T`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrule::TypeKey;
    ///
    /// trait Animal {}
    ///
    /// assert_eq!(TypeKey::of::<u32>(), TypeKey::of::<u32>());
    /// assert_ne!(TypeKey::of::<u32>(), TypeKey::of::<dyn Animal>());
    /// ```
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identifies one container entry: the requested type plus an optional name.
///
/// An empty name denotes the unnamed registration of the type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RegistrationKey {
    ty: TypeKey,
    name: String,
}

impl RegistrationKey {
    pub fn new(ty: TypeKey, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
        }
    }

    pub fn unnamed(ty: TypeKey) -> Self {
        Self::new(ty, String::new())
    }

    pub fn of<T>(name: &str) -> Self
    where
        T: ?Sized + 'static,
    {
        Self::new(TypeKey::of::<T>(), name)
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    /// Returns the unnamed key of the same type.
    pub fn to_unnamed(&self) -> Self {
        Self::unnamed(self.ty)
    }
}

impl fmt::Debug for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.ty)
        } else {
            write!(f, "{} named {:?}", self.ty, self.name)
        }
    }
}
