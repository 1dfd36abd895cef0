use crate::collections::{ContainerError, Scoped, guarded::Guarded, reduce_items};
use core::{
    cmp::Ordering,
    fmt,
    ops::{Bound, Range, RangeBounds},
};

const KIND: &str = "ConcurrentSequence";

/// Thread-safe growable list.
///
/// Same locking, freeze and dispose rules as
/// [`ConcurrentMap`](crate::collections::ConcurrentMap).
pub struct ConcurrentSequence<T> {
    inner: Guarded<Vec<T>>,
}

impl<T> ConcurrentSequence<T> {
    /// Create an empty sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::from_store(Vec::new())
    }

    /// Create an empty sequence with room for `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_store(Vec::with_capacity(capacity))
    }

    fn from_store(store: Vec<T>) -> Self {
        Self {
            inner: Guarded::new(KIND, store),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.read(Vec::len)
    }

    /// Whether the sequence has no elements.
    pub fn is_empty(&self) -> bool {
        self.inner.read(Vec::is_empty)
    }

    /// Make every subsequent mutation fail until [`Self::unfreeze`].
    pub fn freeze(&self) {
        self.inner.freeze();
    }

    /// Allow mutation again.
    pub fn unfreeze(&self) {
        self.inner.unfreeze();
    }

    /// Whether the sequence is currently frozen.
    pub fn is_frozen(&self) -> bool {
        self.inner.is_frozen()
    }

    /// Whether [`Self::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Clear the sequence and turn every further mutation into a no-op.
    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Exclusive access to the backing `Vec`; the sequence is disposed when
    /// the guard is dropped.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn scoped(&self) -> Result<Scoped<'_, Vec<T>>, ContainerError> {
        self.inner.scoped()
    }

    /// Run `f` against the elements under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.inner.read(|items| f(items.as_slice()))
    }

    /// Run `f` against the backing `Vec` under the exclusive lock.
    ///
    /// Returns `Ok(None)` if the sequence is disposed. `f` must not call back
    /// into this sequence.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn batch_update<R>(
        &self,
        f: impl FnOnce(&mut Vec<T>) -> R,
    ) -> Result<Option<R>, ContainerError> {
        self.inner.mutate(f)
    }

    /// Append `value`.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn push(&self, value: T) -> Result<(), ContainerError> {
        self.inner.mutate(|items| items.push(value)).map(drop)
    }

    /// Append every element of `values`.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn extend(&self, values: impl IntoIterator<Item = T>) -> Result<(), ContainerError> {
        self.inner.mutate(|items| items.extend(values)).map(drop)
    }

    /// Insert `value` before `index`; an index past the end appends.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn insert(&self, index: usize, value: T) -> Result<(), ContainerError> {
        self.inner
            .mutate(|items| items.insert(index.min(items.len()), value))
            .map(drop)
    }

    /// Remove and return the last element.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn pop(&self) -> Result<Option<T>, ContainerError> {
        Ok(self.inner.mutate(Vec::pop)?.flatten())
    }

    /// Remove and return the element at `index`. `Ok(None)` once disposed.
    ///
    /// # Errors
    /// [`ContainerError::NotFound`] if `index` is out of range,
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn remove_at(&self, index: usize) -> Result<Option<T>, ContainerError> {
        self.inner.try_mutate(|items| {
            if index < items.len() {
                Ok(items.remove(index))
            } else {
                Err(index_not_found(index))
            }
        })
    }

    /// Remove and return every element in `range`.
    ///
    /// # Errors
    /// [`ContainerError::NotFound`] if `range` exceeds the sequence,
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn drain_range(&self, range: impl RangeBounds<usize>) -> Result<Vec<T>, ContainerError> {
        Ok(self
            .inner
            .try_mutate(|items| {
                let range = checked_range(&range, items.len())?;
                Ok(items.drain(range).collect())
            })?
            .unwrap_or_default())
    }

    /// Replace the elements in `range` with `values`, returning the removed
    /// elements. The replacement may differ in length.
    ///
    /// # Errors
    /// [`ContainerError::NotFound`] if `range` exceeds the sequence,
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn splice_range(
        &self,
        range: impl RangeBounds<usize>,
        values: impl IntoIterator<Item = T>,
    ) -> Result<Vec<T>, ContainerError> {
        Ok(self
            .inner
            .try_mutate(|items| {
                let range = checked_range(&range, items.len())?;
                Ok(items.splice(range, values).collect())
            })?
            .unwrap_or_default())
    }

    /// Remove every element.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn clear(&self) -> Result<(), ContainerError> {
        self.inner.mutate(Vec::clear).map(drop)
    }

    /// Reverse the elements in place.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn reverse(&self) -> Result<(), ContainerError> {
        self.inner.mutate(|items| items.reverse()).map(drop)
    }

    /// Stable in-place sort with a comparator.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) -> Result<(), ContainerError> {
        self.inner.mutate(|items| items.sort_by(compare)).map(drop)
    }

    /// New sequence with `f` applied to every element.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> ConcurrentSequence<U> {
        self.inner.read(|items| items.iter().map(f).collect())
    }

    /// Accumulate over the elements starting from `init`.
    pub fn fold<A>(&self, init: A, f: impl FnMut(A, &T) -> A) -> A {
        self.inner.read(|items| items.iter().fold(init, f))
    }
}

impl<T: Ord> ConcurrentSequence<T> {
    /// Stable in-place ascending sort.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn sort(&self) -> Result<(), ContainerError> {
        self.inner.mutate(|items| items.sort()).map(drop)
    }
}

impl<T: PartialEq> ConcurrentSequence<T> {
    /// Whether some element equals `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.inner.read(|items| items.contains(value))
    }

    /// Position of the first element equal to `value`.
    ///
    /// # Errors
    /// [`ContainerError::NotFound`] if no element matches.
    pub fn index_of(&self, value: &T) -> Result<usize, ContainerError> {
        self.inner
            .read(|items| items.iter().position(|item| item == value))
            .ok_or_else(value_not_found)
    }

    /// Number of elements equal to `value`.
    pub fn count(&self, value: &T) -> usize {
        self.inner
            .read(|items| items.iter().filter(|item| *item == value).count())
    }

    /// Remove the first element equal to `value`. No-op once disposed.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] is checked before existence, then
    /// [`ContainerError::NotFound`] if no element matches.
    pub fn remove(&self, value: &T) -> Result<(), ContainerError> {
        self.inner
            .try_mutate(|items| {
                let index = items
                    .iter()
                    .position(|item| item == value)
                    .ok_or_else(value_not_found)?;
                items.remove(index);
                Ok(())
            })
            .map(drop)
    }
}

impl<T: Clone> ConcurrentSequence<T> {
    /// Clone of the element at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.read(|items| items.get(index).cloned())
    }

    /// Like [`Self::get`], but out of range is an error.
    ///
    /// # Errors
    /// [`ContainerError::NotFound`] if `index` is out of range.
    pub fn try_get(&self, index: usize) -> Result<T, ContainerError> {
        self.get(index).ok_or_else(|| index_not_found(index))
    }

    /// Hot-path read that does not wait behind queued writers.
    pub fn lockless_get(&self, index: usize) -> Option<T> {
        self.inner.read_lockless(|items| items.get(index).cloned())
    }

    /// Clone of the first element.
    pub fn first(&self) -> Option<T> {
        self.inner.read(|items| items.first().cloned())
    }

    /// Clone of the last element.
    pub fn last(&self) -> Option<T> {
        self.inner.read(|items| items.last().cloned())
    }

    /// Clones of the elements in `range`.
    ///
    /// # Errors
    /// [`ContainerError::NotFound`] if `range` exceeds the sequence.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Result<Vec<T>, ContainerError> {
        self.inner.read(|items| {
            let range = checked_range(&range, items.len())?;
            Ok(items[range].to_vec())
        })
    }

    /// Overwrite the element at `index`. No-op once disposed.
    ///
    /// # Errors
    /// [`ContainerError::NotFound`] if `index` is out of range,
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn set(&self, index: usize, value: T) -> Result<(), ContainerError> {
        self.inner
            .try_mutate(|items| {
                let slot = items.get_mut(index).ok_or_else(|| index_not_found(index))?;
                *slot = value;
                Ok(())
            })
            .map(drop)
    }

    /// Plain `Vec` snapshot.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.read(Clone::clone)
    }

    /// New, unfrozen sequence with a clone of every element.
    ///
    /// Elements are duplicated through their `Clone` impl: owned data is
    /// copied deeply, `Arc`-shared data stays shared.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self::from_store(self.to_vec())
    }

    /// New sequence keeping the elements for which `predicate` holds.
    #[must_use]
    pub fn filter(&self, mut predicate: impl FnMut(&T) -> bool) -> Self {
        self.inner
            .read(|items| items.iter().filter(|&item| predicate(item)).cloned().collect())
    }

    /// Combine the elements pairwise with `f`, starting from `initial` or,
    /// if absent, from the first element.
    ///
    /// # Errors
    /// [`ContainerError::EmptyReduction`] if the sequence is empty and no
    /// initial value is given.
    pub fn reduce(
        &self,
        f: impl FnMut(T, T) -> T,
        initial: Option<T>,
    ) -> Result<T, ContainerError> {
        reduce_items(KIND, self.to_vec(), initial, f)
    }

    /// New sequence holding the elements of `self` followed by `other`.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut items = self.to_vec();
        items.extend(other.to_vec());
        Self::from_store(items)
    }

    /// New sequence holding the elements repeated `times` times.
    ///
    /// # Errors
    /// [`ContainerError::TypeMismatch`] if `times` is not a valid count or
    /// the result would not fit in memory.
    pub fn repeat<N: TryInto<usize>>(&self, times: N) -> Result<Self, ContainerError> {
        let times = repeat_count(times)?;
        self.inner.read(|items| repeated(items, times)).map(Self::from_store)
    }

    /// Repeat the elements in place `times` times.
    ///
    /// # Errors
    /// [`ContainerError::TypeMismatch`] if `times` is not a valid count,
    /// [`ContainerError::Frozen`] if the sequence is frozen.
    pub fn repeat_in_place<N: TryInto<usize>>(&self, times: N) -> Result<(), ContainerError> {
        let times = repeat_count(times)?;
        self.inner
            .try_mutate(|items| {
                *items = repeated(items, times)?;
                Ok(())
            })
            .map(drop)
    }
}

fn repeated<T: Clone>(items: &[T], times: usize) -> Result<Vec<T>, ContainerError> {
    let too_large =
        || ContainerError::type_mismatch("repeat", format!("count {times} is too large"));
    let total = items.len().checked_mul(times).ok_or_else(too_large)?;
    if total == 0 {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    out.try_reserve_exact(total).map_err(|_| too_large())?;
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    Ok(out)
}

fn repeat_count<N: TryInto<usize>>(times: N) -> Result<usize, ContainerError> {
    times.try_into().map_err(|_| {
        ContainerError::type_mismatch("repeat", "count must be a non-negative integer")
    })
}

fn index_not_found(index: usize) -> ContainerError {
    ContainerError::not_found(KIND, format!("index {index}"))
}

fn value_not_found() -> ContainerError {
    ContainerError::not_found(KIND, "value")
}

fn checked_range(
    range: &impl RangeBounds<usize>,
    len: usize,
) -> Result<Range<usize>, ContainerError> {
    let start = match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&end) => end.saturating_add(1),
        Bound::Excluded(&end) => end,
        Bound::Unbounded => len,
    };
    if start > end || end > len {
        return Err(ContainerError::not_found(KIND, format!("range {start}..{end}")));
    }
    Ok(start..end)
}

impl<T> Default for ConcurrentSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for ConcurrentSequence<T> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl<T> FromIterator<T> for ConcurrentSequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_store(iter.into_iter().collect())
    }
}

impl<T> From<Vec<T>> for ConcurrentSequence<T> {
    fn from(store: Vec<T>) -> Self {
        Self::from_store(store)
    }
}

impl<T, const N: usize> From<[T; N]> for ConcurrentSequence<T> {
    fn from(items: [T; N]) -> Self {
        Self::from_store(Vec::from(items))
    }
}

impl<T: PartialEq> PartialEq for ConcurrentSequence<T> {
    fn eq(&self, other: &Self) -> bool {
        if core::ptr::eq(self, other) {
            return true;
        }
        self.inner
            .read(|lhs| other.inner.read_lockless(|rhs| lhs == rhs))
    }
}

impl<T: PartialEq> PartialEq<[T]> for ConcurrentSequence<T> {
    fn eq(&self, other: &[T]) -> bool {
        self.inner.read(|items| items.as_slice() == other)
    }
}

impl<T: PartialEq> PartialEq<Vec<T>> for ConcurrentSequence<T> {
    fn eq(&self, other: &Vec<T>) -> bool {
        self == other.as_slice()
    }
}

impl<T: PartialEq, const N: usize> PartialEq<[T; N]> for ConcurrentSequence<T> {
    fn eq(&self, other: &[T; N]) -> bool {
        self == other.as_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for ConcurrentSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner
            .read(|items| f.debug_tuple(self.inner.kind()).field(items).finish())
    }
}
