//! Single-writer/single-reader double buffer with a non-blocking writer.
//!
//! Two equally sized sample regions alternate between the "write" and
//! "read" roles. The producer fills the back region (possibly across
//! several calls), then commits it; committing swaps the two `Vec`s by
//! exchanging their (ptr, len, cap) triples — the regions are rebound, never
//! copied. If the consumer holds the read region at commit time, the swap is
//! deferred: the completed block stays parked in the back region and the
//! consumer performs the swap when it releases. Until then every new write
//! attempt fails, so under sustained consumer slowness whole blocks are
//! dropped, never corrupted.
//!
//! # Threading contract
//!
//! Exactly one producer thread may call [`DoubleBuffer::try_write`] /
//! [`BlockWriteGuard::commit`], and exactly one consumer thread may call
//! [`DoubleBuffer::read`]. The producer path never blocks; the consumer path
//! may. [`DoubleBuffer::reallocate`] blocks on both locks and must only be
//! called from non-realtime threads.

use super::{lock_unpoisoned, try_lock_unpoisoned};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Hook fired synchronously after every front/back swap. Runs on the
/// producer thread for direct swaps and on the consumer thread for deferred
/// ones, so it must return immediately: no blocking, no allocation, and no
/// re-entry into [`DoubleBuffer::read`].
pub type SwapNotifyFn = Box<dyn Fn() + Send + Sync>;

struct BackRegion<T> {
    data: Vec<T>,
    /// Set when a commit found the consumer mid-read. The completed block
    /// stays reserved in `data` and `try_write` fails until the consumer
    /// resolves the swap on release.
    swap_pending: bool,
}

/// A swappable pair of sample regions implementing the core handoff
/// protocol.
pub struct DoubleBuffer<T> {
    front: Mutex<Vec<T>>,
    back: Mutex<BackRegion<T>>,
    /// Capacity the consumer contract currently expects. Applied lazily to
    /// the front region on read release, eagerly to both on `reallocate`.
    expected_len: AtomicUsize,
    /// Write cycles rejected because the previous block was still in
    /// flight. Exposed for observability; dropping is expected behavior.
    dropped_blocks: AtomicU64,
    on_swap: OnceLock<SwapNotifyFn>,
}

impl<T: Copy + Default> DoubleBuffer<T> {
    /// Creates a buffer with both regions sized to `len` zeroed elements.
    pub fn new(len: usize) -> Self {
        Self {
            front: Mutex::new(vec![T::default(); len]),
            back: Mutex::new(BackRegion {
                data: vec![T::default(); len],
                swap_pending: false,
            }),
            expected_len: AtomicUsize::new(len),
            dropped_blocks: AtomicU64::new(0),
            on_swap: OnceLock::new(),
        }
    }

    /// Attempts to reserve the write region. Returns `None` without blocking
    /// when the region is still in use or a finished block is awaiting its
    /// deferred swap; the producer must drop this cycle's data.
    pub fn try_write(&self) -> Option<BlockWriteGuard<'_, T>> {
        match try_lock_unpoisoned(&self.back) {
            Some(back) if !back.swap_pending => Some(BlockWriteGuard { buffer: self, back }),
            _ => {
                self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Acquires the read region, blocking until any in-flight write-side
    /// swap attempt has finished. Dropping the guard releases the region and
    /// resolves a deferred swap if one is pending.
    pub fn read(&self) -> BlockReadGuard<'_, T> {
        BlockReadGuard {
            buffer: self,
            front: lock_unpoisoned(&self.front),
        }
    }

    /// Resizes both regions to `new_len` zeroed elements under both locks
    /// and clears any pending swap. Blocking; never call from the producer
    /// thread while streaming.
    pub fn reallocate(&self, new_len: usize) {
        // Same front → back order the reader uses in its release path.
        let mut front = lock_unpoisoned(&self.front);
        let mut back = lock_unpoisoned(&self.back);
        front.clear();
        front.resize(new_len, T::default());
        back.data.clear();
        back.data.resize(new_len, T::default());
        back.swap_pending = false;
        self.expected_len.store(new_len, Ordering::Release);
    }

    /// Announces a new expected region size without reallocating. The
    /// consumer applies it to the front region when it next releases a read,
    /// after which swaps propagate it to the write side.
    pub fn set_expected_len(&self, new_len: usize) {
        self.expected_len.store(new_len, Ordering::Release);
    }

    /// The region size the consumer contract currently expects.
    pub fn expected_len(&self) -> usize {
        self.expected_len.load(Ordering::Acquire)
    }

    /// Number of write cycles rejected because the previous block had not
    /// been handed over yet.
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks.load(Ordering::Relaxed)
    }

    /// Installs the swap notification hook. May be set exactly once, before
    /// realtime streaming starts; returns `false` if a hook is already
    /// installed.
    pub fn set_on_swap(&self, hook: SwapNotifyFn) -> bool {
        self.on_swap.set(hook).is_ok()
    }

    fn notify_swap(&self) {
        if let Some(hook) = self.on_swap.get() {
            hook();
        }
    }
}

/// Exclusive handle to the write region, handed out by
/// [`DoubleBuffer::try_write`].
///
/// Dropping the guard without [`commit`](Self::commit) releases the region
/// while keeping its contents, so a collector can fill one block across
/// several producer callbacks.
pub struct BlockWriteGuard<'a, T> {
    buffer: &'a DoubleBuffer<T>,
    back: MutexGuard<'a, BackRegion<T>>,
}

impl<T: Copy + Default> BlockWriteGuard<'_, T> {
    /// Publishes the finished block. If the consumer is not mid-read the
    /// regions swap immediately (the common, contention-free path) and the
    /// notification fires; otherwise the swap is deferred to the consumer's
    /// release and the write region stays reserved.
    ///
    /// Returns `true` if the swap happened immediately.
    pub fn commit(mut self) -> bool {
        let swapped = match try_lock_unpoisoned(&self.buffer.front) {
            Some(mut front) => {
                std::mem::swap(&mut *front, &mut self.back.data);
                true
            }
            None => {
                self.back.swap_pending = true;
                false
            }
        };
        let buffer = self.buffer;
        drop(self);
        if swapped {
            buffer.notify_swap();
        }
        swapped
    }
}

impl<T> Deref for BlockWriteGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.back.data
    }
}

impl<T> DerefMut for BlockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.back.data
    }
}

/// Shared handle to the read region, handed out by [`DoubleBuffer::read`].
///
/// The region stays valid and unchanged for the lifetime of the guard. On
/// drop the front region is resized to the currently expected length if
/// necessary, a deferred swap is resolved, and the region is released —
/// guaranteed on every path, including panics of the consumer.
pub struct BlockReadGuard<'a, T: Copy + Default> {
    buffer: &'a DoubleBuffer<T>,
    front: MutexGuard<'a, Vec<T>>,
}

impl<T: Copy + Default> Deref for BlockReadGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.front
    }
}

impl<T: Copy + Default> Drop for BlockReadGuard<'_, T> {
    fn drop(&mut self) {
        let expected = self.buffer.expected_len.load(Ordering::Acquire);
        if self.front.len() != expected {
            self.front.clear();
            self.front.resize(expected, T::default());
        }
        // The producer only ever try-locks `back`, so blocking here while
        // still holding `front` cannot deadlock.
        let mut back = lock_unpoisoned(&self.buffer.back);
        if back.swap_pending {
            std::mem::swap(&mut *self.front, &mut back.data);
            back.swap_pending = false;
            drop(back);
            self.buffer.notify_swap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_round_trip() {
        let buf = DoubleBuffer::<f32>::new(4);
        let mut w = buf.try_write().expect("write region free");
        w.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert!(w.commit());

        let r = buf.read();
        assert_eq!(&*r, &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_partial_write_persists_without_commit() {
        let buf = DoubleBuffer::<f32>::new(2);
        {
            let mut w = buf.try_write().unwrap();
            w[0] = 7.0;
        }
        let w = buf.try_write().unwrap();
        assert_eq!(w[0], 7.0);
    }

    #[test]
    fn test_deferred_swap_resolved_on_read_release() {
        let buf = DoubleBuffer::<u32>::new(1);

        let r = buf.read();
        let mut w = buf.try_write().unwrap();
        w[0] = 42;
        // Reader is pinned: commit must defer, not block.
        assert!(!w.commit());
        // The reserved block blocks further writes.
        assert!(buf.try_write().is_none());
        assert_eq!(buf.dropped_blocks(), 1);
        drop(r);

        // Once the reader released, the swapped data is visible and the
        // write region is free again.
        let r = buf.read();
        assert_eq!(r[0], 42);
        drop(r);
        assert!(buf.try_write().is_some());
    }

    #[test]
    fn test_reallocate_clears_pending_state() {
        let buf = DoubleBuffer::<f32>::new(2);
        {
            let r = buf.read();
            let w = buf.try_write().unwrap();
            assert!(!w.commit());
            drop(r);
        }
        buf.reallocate(8);
        assert_eq!(buf.expected_len(), 8);
        let w = buf.try_write().expect("pending flag cleared");
        assert_eq!(w.len(), 8);
        drop(w);
        assert_eq!(buf.read().len(), 8);
    }

    #[test]
    fn test_expected_len_applied_on_read_release() {
        let buf = DoubleBuffer::<f32>::new(2);
        buf.set_expected_len(6);
        {
            let r = buf.read();
            assert_eq!(r.len(), 2);
        }
        assert_eq!(buf.read().len(), 6);
    }

    #[test]
    fn test_notification_fires_on_both_swap_paths() {
        let fired = Arc::new(AtomicUsize::new(0));
        let buf = DoubleBuffer::<f32>::new(1);
        let fired2 = Arc::clone(&fired);
        assert!(buf.set_on_swap(Box::new(move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        })));

        // Direct swap path.
        buf.try_write().unwrap().commit();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Deferred swap path: fires from the reader's release.
        let r = buf.read();
        assert!(!buf.try_write().unwrap().commit());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        drop(r);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_second_hook_rejected() {
        let buf = DoubleBuffer::<f32>::new(1);
        assert!(buf.set_on_swap(Box::new(|| {})));
        assert!(!buf.set_on_swap(Box::new(|| {})));
    }

    // Single-threaded model of the protocol: apply a random operation
    // sequence and check that delivered blocks are always uniform (never a
    // mix of two writes) and arrive in production order.
    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            WriteCommit,
            WriteAbort,
            Read,
            ReadHoldingWrite,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::WriteCommit),
                Just(Op::WriteAbort),
                Just(Op::Read),
                Just(Op::ReadHoldingWrite),
            ]
        }

        proptest! {
            #[test]
            fn test_blocks_uniform_and_ordered(ops in prop::collection::vec(op_strategy(), 1..64)) {
                let buf = DoubleBuffer::<u64>::new(16);
                let mut next_tag = 1u64;
                let mut last_seen = 0u64;

                for op in ops {
                    match op {
                        Op::WriteCommit => {
                            if let Some(mut w) = buf.try_write() {
                                w.fill(next_tag);
                                w.commit();
                                next_tag += 1;
                            }
                        }
                        Op::WriteAbort => {
                            if let Some(mut w) = buf.try_write() {
                                w[0] = u64::MAX;
                                // dropped without commit, must never surface
                            }
                        }
                        Op::Read => {
                            let r = buf.read();
                            let first = r[0];
                            prop_assert!(r.iter().all(|&v| v == first), "torn block");
                            prop_assert!(first != u64::MAX, "aborted write surfaced");
                            prop_assert!(first >= last_seen, "blocks reordered");
                            last_seen = first;
                        }
                        Op::ReadHoldingWrite => {
                            let r = buf.read();
                            if let Some(mut w) = buf.try_write() {
                                w.fill(next_tag);
                                w.commit();
                                next_tag += 1;
                            }
                            let first = r[0];
                            prop_assert!(r.iter().all(|&v| v == first), "torn block");
                            drop(r);
                        }
                    }
                }
            }
        }
    }
}
