#[cfg(feature = "loom")]
mod imp {
    use crate::graph::Node;
    use core::fmt;
    use std::sync::Arc;
    pub(crate) use loom::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };

    use loom::sync::{MutexGuard, RwLockReadGuard};
    pub(crate) use loom::sync::RwLockWriteGuard;

    pub(crate) type LayerSlots<'a> = Arc<[Arc<Node>]>;

    /// `parking_lot`-shaped facade over the `loom` lock so callers never see
    /// poisoning.
    pub(crate) struct RwLock<T>(loom::sync::RwLock<T>);

    impl<T> RwLock<T> {
        pub(crate) fn new(val: T) -> Self {
            Self(loom::sync::RwLock::new(val))
        }

        pub(crate) fn read(&self) -> RwLockReadGuard<'_, T> {
            self.0.read().unwrap()
        }

        pub(crate) fn read_recursive(&self) -> RwLockReadGuard<'_, T> {
            self.read()
        }

        pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
            self.0.write().unwrap()
        }
    }

    impl<T> fmt::Debug for RwLock<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("RwLock { .. }")
        }
    }

    pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(val: T) -> Self {
            Self(loom::sync::Mutex::new(val))
        }

        pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
            self.0.lock().unwrap()
        }
    }

    impl<T> fmt::Debug for Mutex<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("Mutex { .. }")
        }
    }

    pub(crate) fn join<A, B, RA, RB>(lhs: A, rhs: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send + 'static,
        B: FnOnce() -> RB + Send + 'static,
        RA: Send + 'static,
        RB: Send + 'static,
    {
        let lhs = thread::spawn(lhs);
        let rhs = thread::spawn(rhs);
        (lhs.join().unwrap(), rhs.join().unwrap())
    }
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use core::sync::atomic::{AtomicBool, Ordering};
    use crate::graph::Node;
    pub(crate) use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
    use std::sync::Arc;

    pub(crate) type LayerSlots<'a> = &'a [Arc<Node>];

    pub(crate) fn join<A, B, RA, RB>(lhs: A, rhs: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        rayon::join(lhs, rhs)
    }
}

pub(crate) use imp::*;
