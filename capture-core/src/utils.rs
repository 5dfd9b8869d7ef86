use std::sync::{Mutex, MutexGuard, PoisonError};

// Locking never fails: a poisoned guard is taken over as-is.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
