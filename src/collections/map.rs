use crate::{
    collections::{ContainerError, Scoped, guarded::Guarded, reduce_items},
    types::IndexMap,
};
use core::{
    fmt,
    hash::{BuildHasher, Hash},
};
use indexmap::Equivalent;
use rustc_hash::FxBuildHasher;
use std::collections::HashMap as StdHashMap;

const KIND: &str = "ConcurrentMap";

/// Thread-safe, insertion-ordered dictionary.
///
/// Reads take a shared lock and return clones; every mutation takes the
/// exclusive lock. The map can be frozen (mutations fail with
/// [`ContainerError::Frozen`]) and disposed (everything silently becomes a
/// no-op on an empty map).
pub struct ConcurrentMap<K, V> {
    inner: Guarded<IndexMap<K, V>>,
}

impl<K, V> ConcurrentMap<K, V> {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::from_store(IndexMap::default())
    }

    /// Create an empty map with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_store(IndexMap::with_capacity_and_hasher(capacity, FxBuildHasher))
    }

    fn from_store(store: IndexMap<K, V>) -> Self {
        Self {
            inner: Guarded::new(KIND, store),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.read(IndexMap::len)
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.read(IndexMap::is_empty)
    }

    /// Make every subsequent mutation fail until [`Self::unfreeze`].
    pub fn freeze(&self) {
        self.inner.freeze();
    }

    /// Allow mutation again.
    pub fn unfreeze(&self) {
        self.inner.unfreeze();
    }

    /// Whether the map is currently frozen.
    pub fn is_frozen(&self) -> bool {
        self.inner.is_frozen()
    }

    /// Whether [`Self::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Clear the map and turn every further mutation into a no-op.
    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Exclusive access to the backing `IndexMap` for the lifetime of the
    /// returned guard. The map is disposed when the guard is dropped.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the map is frozen.
    pub fn scoped(&self) -> Result<Scoped<'_, IndexMap<K, V>>, ContainerError> {
        self.inner.scoped()
    }

    /// Run `f` against the backing store under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&IndexMap<K, V>) -> R) -> R {
        self.inner.read(f)
    }

    /// Run `f` against the backing store under the exclusive lock, so that it
    /// observes and mutates one consistent snapshot.
    ///
    /// Returns `Ok(None)` if the map is disposed. `f` must not call back into
    /// this map.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the map is frozen.
    pub fn batch_update<R>(
        &self,
        f: impl FnOnce(&mut IndexMap<K, V>) -> R,
    ) -> Result<Option<R>, ContainerError> {
        self.inner.mutate(f)
    }

    /// Remove every entry.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the map is frozen.
    pub fn clear(&self) -> Result<(), ContainerError> {
        self.inner.mutate(IndexMap::clear).map(drop)
    }

    /// Accumulate over `(key, value)` pairs starting from `init`.
    pub fn fold<A>(&self, init: A, mut f: impl FnMut(A, (&K, &V)) -> A) -> A {
        self.inner.read(|map| map.iter().fold(init, |acc, entry| f(acc, entry)))
    }
}

impl<K: Hash + Eq, V> ConcurrentMap<K, V> {
    /// Remove and return the most recently inserted entry.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the map is frozen.
    pub fn pop(&self) -> Result<Option<(K, V)>, ContainerError> {
        Ok(self.inner.mutate(|map| map.pop())?.flatten())
    }

    /// Whether `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.inner.read(|map| map.contains_key(key))
    }

    /// Insert or overwrite `key`, returning the previous value.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the map is frozen.
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>, ContainerError> {
        Ok(self.inner.mutate(|map| map.insert(key, value))?.flatten())
    }

    /// Remove `key`, returning its value if it was present.
    ///
    /// Preserves the insertion order of the remaining entries.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the map is frozen.
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>, ContainerError>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        Ok(self.inner.mutate(|map| map.shift_remove(key))?.flatten())
    }

    /// Insert every pair from `entries`, overwriting existing keys.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the map is frozen.
    pub fn update(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<(), ContainerError> {
        self.inner.mutate(|map| map.extend(entries)).map(drop)
    }

    /// Build a new map from every entry through `f`.
    pub fn map<K2, V2>(&self, mut f: impl FnMut(&K, &V) -> (K2, V2)) -> ConcurrentMap<K2, V2>
    where
        K2: Hash + Eq,
    {
        self.inner
            .read(|map| map.iter().map(|(key, value)| f(key, value)).collect())
    }
}

impl<K: Hash + Eq, V: Clone> ConcurrentMap<K, V> {
    /// Clone of the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.inner.read(|map| map.get(key).cloned())
    }

    /// Like [`Self::get`], but a missing key is an error.
    ///
    /// # Errors
    /// [`ContainerError::NotFound`] if `key` is absent.
    pub fn try_get<Q>(&self, key: &Q) -> Result<V, ContainerError>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.get(key)
            .ok_or_else(|| ContainerError::not_found(KIND, "key"))
    }

    /// Hot-path lookup that does not wait behind queued writers. The value
    /// may be momentarily stale relative to a concurrent writer.
    pub fn lockless_get<Q>(&self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.inner.read_lockless(|map| map.get(key).cloned())
    }

    /// Return the value under `key`, inserting `default()` first if absent.
    ///
    /// A disposed map hands back the default without storing it.
    ///
    /// # Errors
    /// [`ContainerError::Frozen`] if the map is frozen.
    pub fn get_or_insert_with(
        &self,
        key: K,
        default: impl FnOnce() -> V,
    ) -> Result<V, ContainerError> {
        let mut default = Some(default);
        let stored = self.inner.mutate(|map| {
            map.entry(key)
                .or_insert_with(|| {
                    (default.take().expect("ConcurrentMap::get_or_insert_with: [1]"))()
                })
                .clone()
        })?;
        Ok(match stored {
            Some(value) => value,
            None => (default.take().expect("ConcurrentMap::get_or_insert_with: [2]"))(),
        })
    }

    /// Snapshot of every value in insertion order.
    pub fn values(&self) -> Vec<V> {
        self.inner.read(|map| map.values().cloned().collect())
    }
}

impl<K: Hash + Eq + Clone, V: Clone> ConcurrentMap<K, V> {
    /// Snapshot of every key in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.inner.read(|map| map.keys().cloned().collect())
    }

    /// Snapshot of every entry in insertion order.
    pub fn items(&self) -> Vec<(K, V)> {
        self.inner
            .read(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Plain `IndexMap` snapshot.
    pub fn to_map(&self) -> IndexMap<K, V> {
        self.inner.read(Clone::clone)
    }

    /// New, unfrozen map with a clone of every entry.
    ///
    /// Values are duplicated through their `Clone` impl: owned data is copied
    /// deeply, `Arc`-shared data stays shared.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self::from_store(self.to_map())
    }

    /// New map keeping the entries for which `predicate` holds.
    #[must_use]
    pub fn filter(&self, mut predicate: impl FnMut(&K, &V) -> bool) -> Self {
        self.inner.read(|map| {
            map.iter()
                .filter(|&(k, v)| predicate(k, v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    /// Combine every entry pairwise with `f`, starting from `initial` or, if
    /// absent, from the first entry.
    ///
    /// # Errors
    /// [`ContainerError::EmptyReduction`] if the map is empty and no initial
    /// value is given.
    pub fn reduce(
        &self,
        f: impl FnMut((K, V), (K, V)) -> (K, V),
        initial: Option<(K, V)>,
    ) -> Result<(K, V), ContainerError> {
        reduce_items(KIND, self.items(), initial, f)
    }
}

impl<K, V> Default for ConcurrentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Clone for ConcurrentMap<K, V> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, V)> for ConcurrentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_store(iter.into_iter().collect())
    }
}

impl<K, V> From<IndexMap<K, V>> for ConcurrentMap<K, V> {
    fn from(store: IndexMap<K, V>) -> Self {
        Self::from_store(store)
    }
}

impl<K: Hash + Eq, V, const N: usize> From<[(K, V); N]> for ConcurrentMap<K, V> {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for ConcurrentMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if core::ptr::eq(self, other) {
            return true;
        }
        self.inner
            .read(|lhs| other.inner.read_lockless(|rhs| lhs == rhs))
    }
}

impl<K: Hash + Eq, V: PartialEq, S: BuildHasher> PartialEq<StdHashMap<K, V, S>>
    for ConcurrentMap<K, V>
{
    fn eq(&self, other: &StdHashMap<K, V, S>) -> bool {
        self.inner.read(|map| {
            map.len() == other.len()
                && map
                    .iter()
                    .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
        })
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ConcurrentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner
            .read(|map| f.debug_tuple(self.inner.kind()).field(map).finish())
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    fn sample() -> ConcurrentMap<&'static str, i32> {
        ConcurrentMap::from([("a", 1), ("b", 2), ("c", 3)])
    }

    #[test]
    fn get_and_try_get() {
        let map = sample();
        assert_eq!(map.get("a"), Some(1));
        assert_eq!(map.lockless_get("b"), Some(2));
        assert_eq!(map.get("z"), None);
        assert!(map.try_get("z").unwrap_err().is_not_found());
    }

    #[test]
    fn pop_takes_last_inserted_entry() {
        let map = sample();
        assert_eq!(map.pop().unwrap(), Some(("c", 3)));
        assert_eq!(map.keys(), vec!["a", "b"]);
        map.clear().unwrap();
        assert_eq!(map.pop().unwrap(), None);
    }

    #[test]
    fn remove_keeps_order() {
        let map = sample();
        assert_eq!(map.remove("a").unwrap(), Some(1));
        assert_eq!(map.remove("a").unwrap(), None);
        assert_eq!(map.keys(), vec!["b", "c"]);
    }

    #[test]
    fn get_or_insert_with_behaves_like_setdefault() {
        let map = sample();
        assert_eq!(map.get_or_insert_with("a", || 100).unwrap(), 1);
        assert_eq!(map.get_or_insert_with("d", || 42).unwrap(), 42);
        assert_eq!(map.get("d"), Some(42));

        map.dispose();
        assert_eq!(map.get_or_insert_with("e", || 7).unwrap(), 7);
        assert!(!map.contains_key("e"));
    }

    #[test]
    fn reduce_with_and_without_initial() {
        let map = sample();
        let (_, total) = map
            .reduce(|(k, acc), (_, v)| (k, acc + v), Some(("sum", 0)))
            .unwrap();
        assert_eq!(total, 6);
        assert_eq!(map.fold(0, |acc, (_, v)| acc + v), 6);

        let empty = ConcurrentMap::<&str, i32>::new();
        assert_eq!(
            empty.reduce(|a, _| a, None),
            Err(ContainerError::EmptyReduction { container: KIND })
        );
    }

    #[test]
    fn compares_with_std_map() {
        let map = sample();
        let std_map: StdHashMap<_, _> = [("c", 3), ("b", 2), ("a", 1)].into_iter().collect();
        assert!(map == std_map);
        assert!(map == ConcurrentMap::from([("c", 3), ("a", 1), ("b", 2)]));
    }

    #[test]
    fn debug_names_the_container() {
        let map = ConcurrentMap::from([("a", 1)]);
        assert_eq!(format!("{map:?}"), r#"ConcurrentMap({"a": 1})"#);
    }
}
