//! Lock helpers that recover from poisoning.
//!
//! Every table guarded here is left consistent between statements, so a
//! panic in another holder does not invalidate it.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquires a mutex lock, recovering from poisoned state if necessary.
pub(crate) fn lock_or_recover<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Acquires a shared read lock, recovering from poisoned state if necessary.
pub(crate) fn read_or_recover<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        log::warn!("registry lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Acquires an exclusive write lock, recovering from poisoned state if necessary.
pub(crate) fn write_or_recover<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        log::warn!("registry lock was poisoned, recovering");
        poisoned.into_inner()
    })
}
