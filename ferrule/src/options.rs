#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What to do when the requested type has no registration anywhere in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UnregisteredResolutionAction {
    /// Construct the type through its constructor descriptors if it is known.
    #[default]
    AttemptResolve,
    Fail,
}

/// What to do when a named registration is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NamedResolutionFailureAction {
    /// Retry with the unnamed registration of the same type.
    #[default]
    AttemptUnnamedResolution,
    Fail,
}

/// How auto-registration handles an interface with several implementers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DuplicateImplementationAction {
    /// Keep the first implementer and ignore the rest.
    #[default]
    RegisterSingle,
    /// Register every implementer under its type name, the first one also unnamed.
    RegisterMultiple,
    Fail,
}

/// Fallback behaviour of a resolution.
///
/// # Examples
///
/// ```rust
/// use ferrule::{ResolveOptions, UnregisteredResolutionAction};
///
/// let options = ResolveOptions::FAIL_UNREGISTERED_ONLY;
/// assert_eq!(
///     options.unregistered_resolution_action,
///     UnregisteredResolutionAction::Fail,
/// );
/// assert_eq!(ResolveOptions::default(), ResolveOptions::DEFAULT);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResolveOptions {
    pub unregistered_resolution_action: UnregisteredResolutionAction,
    pub named_resolution_failure_action: NamedResolutionFailureAction,
}

impl ResolveOptions {
    pub const DEFAULT: Self = Self {
        unregistered_resolution_action: UnregisteredResolutionAction::AttemptResolve,
        named_resolution_failure_action: NamedResolutionFailureAction::AttemptUnnamedResolution,
    };

    pub const FAIL_UNREGISTERED_ONLY: Self = Self {
        unregistered_resolution_action: UnregisteredResolutionAction::Fail,
        named_resolution_failure_action: NamedResolutionFailureAction::AttemptUnnamedResolution,
    };

    pub const FAIL_NAME_NOT_FOUND_ONLY: Self = Self {
        unregistered_resolution_action: UnregisteredResolutionAction::AttemptResolve,
        named_resolution_failure_action: NamedResolutionFailureAction::Fail,
    };

    pub const FAIL_UNREGISTERED_AND_NAME_NOT_FOUND: Self = Self {
        unregistered_resolution_action: UnregisteredResolutionAction::Fail,
        named_resolution_failure_action: NamedResolutionFailureAction::Fail,
    };

    pub(crate) fn attempts_construction(&self) -> bool {
        self.unregistered_resolution_action == UnregisteredResolutionAction::AttemptResolve
    }

    pub(crate) fn attempts_unnamed(&self) -> bool {
        self.named_resolution_failure_action
            == NamedResolutionFailureAction::AttemptUnnamedResolution
    }
}
