mod guarded;
mod map;
mod sequence;
mod set;

pub use crate::collections::{
    guarded::Scoped, map::ConcurrentMap, sequence::ConcurrentSequence, set::ConcurrentSet,
};
use thiserror::Error;

/// Failures reported by the concurrent containers.
///
/// Disposed containers never produce an error: they silently behave as empty.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContainerError {
    /// A mutation was attempted while the container is frozen.
    #[error("{container} is frozen and cannot be mutated")]
    Frozen {
        /// Container kind, e.g. `ConcurrentMap`.
        container: &'static str,
    },
    /// A targeted read or removal did not find its key, index or value.
    #[error("{what} not found in {container}")]
    NotFound {
        /// Container kind.
        container: &'static str,
        /// What was looked up.
        what: String,
    },
    /// `reduce` without an initial value on an empty container.
    #[error("reduce of empty {container} with no initial value")]
    EmptyReduction {
        /// Container kind.
        container: &'static str,
    },
    /// The operand of a repeat-style operation is not representable.
    #[error("unsupported operand for {operation}: {reason}")]
    TypeMismatch {
        /// Operation that rejected its operand.
        operation: &'static str,
        /// Human-readable description.
        reason: String,
    },
}

impl ContainerError {
    pub(crate) fn frozen(container: &'static str) -> Self {
        Self::Frozen { container }
    }

    pub(crate) fn not_found(container: &'static str, what: impl Into<String>) -> Self {
        Self::NotFound {
            container,
            what: what.into(),
        }
    }

    pub(crate) fn empty_reduction(container: &'static str) -> Self {
        Self::EmptyReduction { container }
    }

    pub(crate) fn type_mismatch(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            operation,
            reason: reason.into(),
        }
    }

    /// Whether this error was caused by a frozen container.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Frozen { .. })
    }

    /// Whether this error reports a missing key, index or value.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Shared `reduce` semantics: fold from `initial`, or from the first element
/// when no initial value is given.
pub(crate) fn reduce_items<T>(
    container: &'static str,
    items: impl IntoIterator<Item = T>,
    initial: Option<T>,
    f: impl FnMut(T, T) -> T,
) -> Result<T, ContainerError> {
    let mut items = items.into_iter();
    let Some(initial) = initial.or_else(|| items.next()) else {
        return Err(ContainerError::empty_reduction(container));
    };
    Ok(items.fold(initial, f))
}
