use thiserror::Error;

use crate::RegistrationKey;

/// Type alias for boxed errors that can be sent across threads.
///
/// User constructors and delegate factories report their failures with it.
pub type StdError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while registering types, instances or delegates.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The (type, name) pair is already registered in this container.
    #[error("{key} is already registered")]
    Duplicate { key: RegistrationKey },
    /// The implementation cannot be served as the requested type.
    #[error("{implementation} cannot be registered as {requested}")]
    NotAssignable {
        requested: &'static str,
        implementation: &'static str,
    },
    /// A lifetime or reference conversion does not apply to the registration.
    #[error("cannot apply {conversion} to {key}: {reason}")]
    InvalidConversion {
        key: RegistrationKey,
        conversion: &'static str,
        reason: &'static str,
    },
    /// The registration was removed before the options could be applied.
    #[error("{key} is no longer registered")]
    Missing { key: RegistrationKey },
    #[error("at least two implementations of {requested} are required, got {count}")]
    TooFewImplementations { requested: &'static str, count: usize },
    #[error("{implementation} is listed more than once for {requested}")]
    DuplicateImplementation {
        requested: &'static str,
        implementation: &'static str,
    },
    /// Auto-registration found several implementers under the `Fail` policy.
    #[error("{interface} has multiple implementations: {}", .implementations.join(", "))]
    AmbiguousImplementations {
        interface: &'static str,
        implementations: Vec<&'static str>,
    },
    #[error("container has been disposed")]
    Disposed,
}

/// Errors raised while resolving or constructing instances.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Nothing is registered or constructible for the key.
    ///
    /// Also reported for weak registrations whose instance has been dropped.
    #[error("unable to resolve {key}")]
    Unresolvable { key: RegistrationKey },
    /// None of the type's constructors has all of its parameters available.
    #[error("no usable constructor for {type_name}")]
    NoUsableConstructor { type_name: &'static str },
    #[error("circular dependency while resolving {key}")]
    CircularDependency { key: RegistrationKey },
    #[error("constructor arguments cannot be passed to singleton {key}")]
    SingletonArguments { key: RegistrationKey },
    /// A constructor or delegate factory returned an error.
    #[error("failed to construct {type_name}: {source}")]
    Construction {
        type_name: &'static str,
        #[source]
        source: StdError,
    },
    #[error("argument {name:?} is not a {expected}")]
    ArgumentMismatch {
        name: &'static str,
        expected: &'static str,
    },
    #[error("no argument left for {expected}")]
    ArgumentsExhausted { expected: &'static str },
    #[error("container has been disposed")]
    Disposed,
}

/// Either kind of container error, for callers mixing registration and resolution.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}
