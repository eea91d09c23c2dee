//! Multi-channel swap buffer for producers that emit sub-block chunks.
//!
//! Same deferred-swap protocol as [`DoubleBuffer`](super::DoubleBuffer), but
//! the write region is a flat arena of `channel_count × channel_len` samples
//! with a per-channel cursor, so a block can be assembled from chunks
//! smaller than one output block. Unlike `DoubleBuffer`, a new write
//! overwrites a finished block that the consumer has not picked up yet: the
//! display always gets the freshest complete frame.

use super::{lock_unpoisoned, try_lock_unpoisoned};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

struct Arena<T> {
    data: Vec<T>,
    num_channels: usize,
}

struct WriteArena<T> {
    arena: Arena<T>,
    /// Samples per channel still missing before the block is complete.
    remaining: usize,
    swap_pending: bool,
}

/// A single-writer/single-reader multi-channel double buffer supporting
/// incremental fills and bulk overwrites.
///
/// The per-channel capacity is fixed at construction; the channel count can
/// be changed with [`set_channel_count`](Self::set_channel_count), which is
/// documented lossy and must only happen during setup, never mid-stream.
pub struct ChannelSwapBuffer<T> {
    channel_len: usize,
    front: Mutex<Arena<T>>,
    back: Mutex<WriteArena<T>>,
    dropped_writes: AtomicU64,
}

impl<T: Copy + Default> ChannelSwapBuffer<T> {
    /// Creates a buffer of `num_channels` channels with `channel_len`
    /// samples each, zero-initialized.
    pub fn new(channel_len: usize, num_channels: usize) -> Self {
        let len = channel_len * num_channels;
        Self {
            channel_len,
            front: Mutex::new(Arena {
                data: vec![T::default(); len],
                num_channels,
            }),
            back: Mutex::new(WriteArena {
                arena: Arena {
                    data: vec![T::default(); len],
                    num_channels,
                },
                remaining: channel_len,
                swap_pending: false,
            }),
            dropped_writes: AtomicU64::new(0),
        }
    }

    /// Samples per channel.
    pub fn channel_len(&self) -> usize {
        self.channel_len
    }

    /// Writes one complete block, one slice per channel. Channels shorter
    /// than the buffer are zero-padded; `channels[i].len()` must not exceed
    /// the per-channel capacity. Replaces an undelivered pending block and
    /// resets any partially assembled chunks. Non-blocking: a no-op while a
    /// reallocation holds the write side.
    pub fn write_full(&self, channels: &[&[T]]) {
        let Some(mut back) = try_lock_unpoisoned(&self.back) else {
            self.dropped_writes.fetch_add(1, Ordering::Relaxed);
            return;
        };
        back.swap_pending = false;
        debug_assert_eq!(channels.len(), back.arena.num_channels);

        let num_channels = back.arena.num_channels.min(channels.len());
        for ch in 0..num_channels {
            let src = channels[ch];
            debug_assert!(src.len() <= self.channel_len);
            let n = src.len().min(self.channel_len);
            let dst = &mut back.arena.data[ch * self.channel_len..][..self.channel_len];
            dst[..n].copy_from_slice(&src[..n]);
            dst[n..].fill(T::default());
        }

        self.swap_or_defer(&mut back);
        back.remaining = self.channel_len;
    }

    /// Appends a chunk, one slice per channel, at the current cursor. Once
    /// the block is complete it is handed off (directly or deferred) and the
    /// cursor resets; surplus samples beyond the remaining capacity are
    /// silently discarded — there is no wraparound.
    ///
    /// Returns `true` when this chunk completed a block.
    pub fn append_chunk(&self, channels: &[&[T]]) -> bool {
        let Some(mut back) = try_lock_unpoisoned(&self.back) else {
            self.dropped_writes.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        back.swap_pending = false;
        debug_assert_eq!(channels.len(), back.arena.num_channels);

        let available = channels.first().map_or(0, |ch| ch.len());
        debug_assert!(channels.iter().all(|ch| ch.len() == available));

        let start = self.channel_len - back.remaining;
        let n = available.min(back.remaining);
        let num_channels = back.arena.num_channels.min(channels.len());
        for ch in 0..num_channels {
            let dst_base = ch * self.channel_len + start;
            back.arena.data[dst_base..dst_base + n].copy_from_slice(&channels[ch][..n]);
        }
        back.remaining -= n;

        if back.remaining == 0 {
            self.swap_or_defer(&mut back);
            back.remaining = self.channel_len;
            return true;
        }
        false
    }

    /// Acquires the read region, blocking until a concurrent reallocation
    /// finishes. Dropping the guard resolves a deferred swap.
    pub fn read(&self) -> ChannelReadGuard<'_, T> {
        ChannelReadGuard {
            buffer: self,
            front: lock_unpoisoned(&self.front),
        }
    }

    /// Reallocates both arenas for a new channel count under both locks.
    /// All data in flight is discarded and the chunk cursor resets; only
    /// call during setup, never mid-stream.
    pub fn set_channel_count(&self, num_channels: usize) {
        let len = self.channel_len * num_channels;
        // Same front → back order the reader's release path uses.
        let mut front = lock_unpoisoned(&self.front);
        let mut back = lock_unpoisoned(&self.back);
        front.data.clear();
        front.data.resize(len, T::default());
        front.num_channels = num_channels;
        back.arena.data.clear();
        back.arena.data.resize(len, T::default());
        back.arena.num_channels = num_channels;
        back.remaining = self.channel_len;
        back.swap_pending = false;
    }

    /// Current number of channels.
    pub fn num_channels(&self) -> usize {
        lock_unpoisoned(&self.front).num_channels
    }

    /// Writes rejected because a reallocation held the write side.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes.load(Ordering::Relaxed)
    }

    fn swap_or_defer(&self, back: &mut WriteArena<T>) {
        match try_lock_unpoisoned(&self.front) {
            Some(mut front) => {
                debug_assert_eq!(front.num_channels, back.arena.num_channels);
                std::mem::swap(&mut front.data, &mut back.arena.data);
            }
            None => back.swap_pending = true,
        }
    }
}

/// Scoped access to the read arena. The channel slices stay valid until the
/// guard is dropped; dropping resolves a deferred swap and releases.
pub struct ChannelReadGuard<'a, T: Copy + Default> {
    buffer: &'a ChannelSwapBuffer<T>,
    front: MutexGuard<'a, Arena<T>>,
}

impl<T: Copy + Default> ChannelReadGuard<'_, T> {
    /// Samples of one channel.
    pub fn channel(&self, idx: usize) -> &[T] {
        let len = self.buffer.channel_len;
        &self.front.data[idx * len..][..len]
    }

    /// Number of channels in the arena.
    pub fn num_channels(&self) -> usize {
        self.front.num_channels
    }
}

impl<T: Copy + Default> Drop for ChannelReadGuard<'_, T> {
    fn drop(&mut self) {
        let mut back = lock_unpoisoned(&self.buffer.back);
        if back.swap_pending {
            std::mem::swap(&mut self.front.data, &mut back.arena.data);
            back.swap_pending = false;
        }
    }
}
