use crate::{
    collections::{ConcurrentSequence, ContainerError, Scoped, guarded::Guarded, reduce_items},
    types::IndexSet,
};
use core::{
    fmt,
    hash::{BuildHasher, Hash},
};
use indexmap::Equivalent;
use rustc_hash::FxBuildHasher;
use std::collections::HashSet as StdHashSet;

const KIND: &str = "ConcurrentSet";

/// Thread-safe, insertion-ordered set with pure and in-place set algebra.
///
/// Same locking, freeze and dispose rules as
/// [`ConcurrentMap`](crate::collections::ConcurrentMap).
pub struct ConcurrentSet<T> {
    inner: Guarded<IndexSet<T>>,
}

impl<T> ConcurrentSet<T> {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::from_store(IndexSet::default())
    }

    /// Create an empty set with room for `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_store(IndexSet::with_capacity_and_hasher(capacity, FxBuildHasher))
    }

    fn from_store(store: IndexSet<T>) -> Self {
        Self {
            inner: Guarded::new(KIND, store),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.read(IndexSet::len)
    }

    /// Whether the set has no elements.
    pub fn is_empty(&self) -> bool {
        self.inner.read(IndexSet::is_empty)
    }

    /// Make every subsequent mutation fail until [`Self::unfreeze`].
    pub fn freeze(&self) {
        self.inner.freeze();
    }

    /// Allow mutation again.
    pub fn unfreeze(&self) {
        self.inner.unfreeze();
    }

    /// Whether the set is currently frozen.
    pub fn is_frozen(&self) -> bool {
        self.inner.is_frozen()
    }

    /// Whether [`Self::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Clear the set and turn every further mutation into a no-op.
    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Exclusive access to the backing `IndexSet`; the set is disposed when
    /// the guard is dropped.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn scoped(&self) -> Result<Scoped<'_, IndexSet<T>>, ContainerError> {
        self.inner.scoped()
    }

    /// Run `f` against the backing store under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&IndexSet<T>) -> R) -> R {
        self.inner.read(f)
    }

    /// Run `f` against the backing store under the exclusive lock.
    ///
    /// Returns `Ok(None)` if the set is disposed. `f` must not call back into
    /// this set.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn batch_update<R>(
        &self,
        f: impl FnOnce(&mut IndexSet<T>) -> R,
    ) -> Result<Option<R>, ContainerError> {
        self.inner.mutate(f)
    }

    /// Remove every element.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn clear(&self) -> Result<(), ContainerError> {
        self.inner.mutate(IndexSet::clear).map(drop)
    }

    /// Accumulate over the elements starting from `init`.
    pub fn fold<A>(&self, init: A, f: impl FnMut(A, &T) -> A) -> A {
        self.inner.read(|set| set.iter().fold(init, f))
    }
}

impl<T: Hash + Eq> ConcurrentSet<T> {
    /// Remove and return the most recently inserted element.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn pop(&self) -> Result<Option<T>, ContainerError> {
        Ok(self.inner.mutate(|set| set.pop())?.flatten())
    }

    /// Whether `value` is a member.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<T>,
    {
        self.inner.read(|set| set.contains(value))
    }

    /// Add `value`; returns whether it was newly inserted.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn insert(&self, value: T) -> Result<bool, ContainerError> {
        Ok(self
            .inner
            .mutate(|set| set.insert(value))?
            .unwrap_or(false))
    }

    /// Remove `value`. No-op once disposed.
    ///
    /// # Errors
    /// [`ContainerError::NotFound`] if `value` is not a member,
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn remove<Q>(&self, value: &Q) -> Result<(), ContainerError>
    where
        Q: ?Sized + Hash + Equivalent<T>,
    {
        self.inner
            .try_mutate(|set| {
                if set.shift_remove(value) {
                    Ok(())
                } else {
                    Err(ContainerError::not_found(KIND, "value"))
                }
            })
            .map(drop)
    }

    /// Remove `value` if present; returns whether it was a member.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn discard<Q>(&self, value: &Q) -> Result<bool, ContainerError>
    where
        Q: ?Sized + Hash + Equivalent<T>,
    {
        Ok(self
            .inner
            .mutate(|set| set.shift_remove(value))?
            .unwrap_or(false))
    }

    /// Add every element of `values`.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn update(&self, values: impl IntoIterator<Item = T>) -> Result<(), ContainerError> {
        self.inner.mutate(|set| set.extend(values)).map(drop)
    }

    /// In-place union (`|=`).
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn union_update(&self, other: impl IntoIterator<Item = T>) -> Result<(), ContainerError> {
        self.update(other)
    }

    /// In-place intersection (`&=`).
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn intersection_update(
        &self,
        other: impl IntoIterator<Item = T>,
    ) -> Result<(), ContainerError> {
        let other: IndexSet<T> = other.into_iter().collect();
        self.inner
            .mutate(|set| set.retain(|item| other.contains(item)))
            .map(drop)
    }

    /// In-place difference (`-=`).
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn difference_update(
        &self,
        other: impl IntoIterator<Item = T>,
    ) -> Result<(), ContainerError> {
        let other: IndexSet<T> = other.into_iter().collect();
        self.inner
            .mutate(|set| set.retain(|item| !other.contains(item)))
            .map(drop)
    }

    /// In-place symmetric difference (`^=`).
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the set is frozen.
    pub fn symmetric_difference_update(
        &self,
        other: impl IntoIterator<Item = T>,
    ) -> Result<(), ContainerError> {
        let other: IndexSet<T> = other.into_iter().collect();
        self.inner
            .mutate(|set| {
                for item in other {
                    if !set.shift_remove(&item) {
                        set.insert(item);
                    }
                }
            })
            .map(drop)
    }

    /// New set with `f` applied to every element.
    pub fn map<U: Hash + Eq>(&self, f: impl FnMut(&T) -> U) -> ConcurrentSet<U> {
        self.inner.read(|set| set.iter().map(f).collect())
    }
}

impl<T: Hash + Eq + Clone> ConcurrentSet<T> {
    /// Plain `IndexSet` snapshot.
    pub fn to_set(&self) -> IndexSet<T> {
        self.inner.read(Clone::clone)
    }

    /// Elements in insertion order.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.read(|set| set.iter().cloned().collect())
    }

    /// Snapshot as a [`ConcurrentSequence`] in insertion order.
    pub fn to_sequence(&self) -> ConcurrentSequence<T> {
        ConcurrentSequence::from(self.to_vec())
    }

    /// New, unfrozen set with a clone of every element.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self::from_store(self.to_set())
    }

    /// New set keeping the elements for which `predicate` holds.
    #[must_use]
    pub fn filter(&self, mut predicate: impl FnMut(&T) -> bool) -> Self {
        self.inner
            .read(|set| set.iter().filter(|&item| predicate(item)).cloned().collect())
    }

    /// Combine the elements pairwise with `f`, starting from `initial` or,
    /// if absent, from the first element.
    ///
    /// # Errors
    /// [`ContainerError::EmptyReduction`] if the set is empty and no initial
    /// value is given.
    pub fn reduce(
        &self,
        f: impl FnMut(T, T) -> T,
        initial: Option<T>,
    ) -> Result<T, ContainerError> {
        reduce_items(KIND, self.to_vec(), initial, f)
    }

    /// Elements of `self` followed by the new elements of `other`.
    #[must_use]
    pub fn union(&self, other: impl IntoIterator<Item = T>) -> Self {
        let mut set = self.to_set();
        set.extend(other);
        Self::from_store(set)
    }

    /// Elements of `self` that are also in `other`.
    #[must_use]
    pub fn intersection(&self, other: impl IntoIterator<Item = T>) -> Self {
        let other: IndexSet<T> = other.into_iter().collect();
        self.filter(|item| other.contains(item))
    }

    /// Elements of `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: impl IntoIterator<Item = T>) -> Self {
        let other: IndexSet<T> = other.into_iter().collect();
        self.filter(|item| !other.contains(item))
    }

    /// Elements in exactly one of `self` and `other`.
    #[must_use]
    pub fn symmetric_difference(&self, other: impl IntoIterator<Item = T>) -> Self {
        let other: IndexSet<T> = other.into_iter().collect();
        self.inner.read(|set| {
            set.symmetric_difference(&other)
                .cloned()
                .collect()
        })
    }
}

impl<T> Default for ConcurrentSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Clone> Clone for ConcurrentSet<T> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl<T: Hash + Eq> FromIterator<T> for ConcurrentSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_store(iter.into_iter().collect())
    }
}

impl<T> From<IndexSet<T>> for ConcurrentSet<T> {
    fn from(store: IndexSet<T>) -> Self {
        Self::from_store(store)
    }
}

impl<T: Hash + Eq, const N: usize> From<[T; N]> for ConcurrentSet<T> {
    fn from(items: [T; N]) -> Self {
        items.into_iter().collect()
    }
}

impl<T: Hash + Eq> PartialEq for ConcurrentSet<T> {
    fn eq(&self, other: &Self) -> bool {
        if core::ptr::eq(self, other) {
            return true;
        }
        self.inner
            .read(|lhs| other.inner.read_lockless(|rhs| lhs == rhs))
    }
}

impl<T: Hash + Eq, S: BuildHasher> PartialEq<StdHashSet<T, S>> for ConcurrentSet<T> {
    fn eq(&self, other: &StdHashSet<T, S>) -> bool {
        self.inner
            .read(|set| set.len() == other.len() && set.iter().all(|item| other.contains(item)))
    }
}

impl<T: fmt::Debug> fmt::Debug for ConcurrentSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner
            .read(|set| f.debug_tuple(self.inner.kind()).field(set).finish())
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    fn std_set<const N: usize>(items: [i32; N]) -> StdHashSet<i32> {
        items.into_iter().collect()
    }

    #[test]
    fn remove_and_discard() {
        let set = ConcurrentSet::from([1, 2, 3]);
        set.remove(&2).unwrap();
        assert!(!set.contains(&2));
        assert!(!set.discard(&99).unwrap());
        assert!(set.remove(&42).unwrap_err().is_not_found());
    }

    #[test]
    fn pure_set_algebra() {
        let set = ConcurrentSet::from([1, 2, 3]);
        assert!(set.union([3, 4, 5]) == std_set([1, 2, 3, 4, 5]));
        assert!(set.intersection([3, 4, 5]) == std_set([3]));
        assert!(set.difference([3, 4, 5]) == std_set([1, 2]));
        assert!(set.symmetric_difference([3, 4, 5]) == std_set([1, 2, 4, 5]));
        assert!(set == std_set([1, 2, 3]));
    }

    #[test]
    fn in_place_set_algebra() {
        let set = ConcurrentSet::from([1, 2, 3]);
        set.union_update([3, 4]).unwrap();
        assert!(set == std_set([1, 2, 3, 4]));
        set.intersection_update([2, 4]).unwrap();
        assert!(set == std_set([2, 4]));
        set.difference_update([4]).unwrap();
        assert!(set == std_set([2]));
        set.symmetric_difference_update([2, 99]).unwrap();
        assert!(set == std_set([99]));
    }

    #[test]
    fn in_place_algebra_respects_freeze() {
        let set = ConcurrentSet::from([1]);
        set.freeze();
        assert!(set.union_update([3]).unwrap_err().is_frozen());
        assert!(set.symmetric_difference_update([1]).unwrap_err().is_frozen());
        assert!(set == std_set([1]));
    }

    #[test]
    fn converts_to_sequence() {
        let set = ConcurrentSet::from([7, 8, 9]);
        let seq = set.to_sequence();
        assert_eq!(seq, [7, 8, 9]);
    }

    #[test]
    fn equality_ignores_order() {
        assert_eq!(ConcurrentSet::from([1, 2, 3]), ConcurrentSet::from([3, 2, 1]));
        assert_ne!(ConcurrentSet::from([1, 2, 3]), ConcurrentSet::from([1, 2]));
    }
}
