use crate::{
    collections::ContainerError,
    sync::{AtomicBool, Ordering, RwLock, RwLockWriteGuard},
};
use core::ops::{Deref, DerefMut};
use tracing::{debug, warn};

/// Lock, freeze flag and dispose flag shared by every container kind.
///
/// Mutators acquire the write lock first and only then inspect the flags, so
/// a `freeze` or `dispose` racing with a mutation is observed consistently:
/// either the mutation lands before the flag flips or it is rejected.
pub(crate) struct Guarded<S> {
    store: RwLock<S>,
    frozen: AtomicBool,
    disposed: AtomicBool,
    kind: &'static str,
}

impl<S: Default> Guarded<S> {
    pub(crate) fn new(kind: &'static str, store: S) -> Self {
        Self {
            store: RwLock::new(store),
            frozen: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            kind,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.kind
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.store.read())
    }

    /// Shared read that does not queue behind pending writers.
    pub(crate) fn read_lockless<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.store.read_recursive())
    }

    /// Run `f` under the write lock.
    ///
    /// Returns `Ok(None)` without calling `f` once the container is disposed.
    pub(crate) fn mutate<R>(
        &self,
        f: impl FnOnce(&mut S) -> R,
    ) -> Result<Option<R>, ContainerError> {
        let mut store = self.store.write();
        if self.disposed.load(Ordering::Acquire) {
            return Ok(None);
        }
        if self.frozen.load(Ordering::Acquire) {
            return Err(ContainerError::frozen(self.kind));
        }
        Ok(Some(f(&mut store)))
    }

    pub(crate) fn try_mutate<R>(
        &self,
        f: impl FnOnce(&mut S) -> Result<R, ContainerError>,
    ) -> Result<Option<R>, ContainerError> {
        self.mutate(f)?.transpose()
    }

    pub(crate) fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub(crate) fn unfreeze(&self) {
        self.frozen.store(false, Ordering::Release);
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn dispose(&self) {
        let mut store = self.store.write();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        *store = S::default();
        debug!(container = self.kind, "disposed");
    }

    pub(crate) fn scoped(&self) -> Result<Scoped<'_, S>, ContainerError> {
        let store = self.store.write();
        if self.frozen.load(Ordering::Acquire) && !self.disposed.load(Ordering::Acquire) {
            return Err(ContainerError::frozen(self.kind));
        }
        warn!(
            container = self.kind,
            "scoped access hands out the raw store; the container is disposed when the scope ends"
        );
        Ok(Scoped { owner: self, store })
    }
}

/// Exclusive, scope-bound access to a container's backing store.
///
/// Dereferences to the raw store. Dropping the guard, whether on normal exit
/// or while unwinding, disposes the container it came from.
pub struct Scoped<'a, S: Default> {
    owner: &'a Guarded<S>,
    store: RwLockWriteGuard<'a, S>,
}

impl<S: Default> Deref for Scoped<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.store
    }
}

impl<S: Default> DerefMut for Scoped<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

impl<S: Default> Drop for Scoped<'_, S> {
    fn drop(&mut self) {
        *self.store = S::default();
        if !self.owner.disposed.swap(true, Ordering::AcqRel) {
            debug!(container = self.owner.kind, "disposed on scope exit");
        }
    }
}
