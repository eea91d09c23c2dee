//! Buffer primitives for the realtime → consumer handoff.
//!
//! Both buffer types implement the same swap protocol: the producer side
//! only ever performs non-blocking lock attempts and drops whole blocks
//! under backpressure, while the consumer side may block and is responsible
//! for resolving swaps that were deferred while it held the read region.

mod channels;
mod double;

pub use channels::{ChannelReadGuard, ChannelSwapBuffer};
pub use double::{BlockReadGuard, BlockWriteGuard, DoubleBuffer, SwapNotifyFn};

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Blocking lock that shrugs off poisoning. A panic inside one of the short
/// critical sections here leaves plain sample data behind, never a broken
/// protocol state, so continuing with the inner value is sound.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Non-blocking lock attempt that treats a poisoned mutex as acquired.
pub(crate) fn try_lock_unpoisoned<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}
