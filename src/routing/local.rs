//! In-process directory: collectors and targets living in the same binary.

use super::{DataSource, DisplayTarget, RealtimeSink, SettingValue};
use crate::collector::DataCollector;
use crate::error::{Result, RoutingError};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Arc, PoisonError, RwLock, Weak};

struct Slot {
    target: Arc<dyn DisplayTarget>,
    collector: Option<Arc<dyn DataCollector>>,
}

/// Directly connected [`RealtimeSink`] and [`DataSource`] for applications
/// where the producer and the consumer share one binary.
///
/// Register all targets first, then the matching collectors; registration
/// pairs them by identifier. Block-ready notifications are forwarded to the
/// consumer as slot indices over a bounded channel: the producer-side send
/// never blocks, and a full channel drops the notification — the consumer
/// will pick the block up on its next poll anyway.
pub struct LocalSinkAndSource {
    weak_self: Weak<LocalSinkAndSource>,
    slots: RwLock<Vec<Slot>>,
    ready_tx: Sender<usize>,
}

impl LocalSinkAndSource {
    /// Creates the directory plus the consumer-side receiver for
    /// block-ready slot indices. `notify_capacity` bounds the queue;
    /// a handful of entries per collector is plenty since each collector
    /// can only have one undelivered block at a time.
    pub fn new(notify_capacity: usize) -> (Arc<Self>, Receiver<usize>) {
        let (ready_tx, ready_rx) = bounded(notify_capacity);
        let sink = Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            slots: RwLock::new(Vec::new()),
            ready_tx,
        });
        (sink, ready_rx)
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, Vec<Slot>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RealtimeSink for LocalSinkAndSource {
    fn register_collector(&self, collector: Arc<dyn DataCollector>) -> Result<()> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot_idx = slots
            .iter()
            .position(|slot| slot.target.id() == collector.id())
            .ok_or_else(|| RoutingError::UnknownTarget(collector.id().to_string()))?;
        if slots[slot_idx].collector.is_some() {
            return Err(RoutingError::SlotOccupied(collector.id().to_string()));
        }

        collector
            .core()
            .connect(slot_idx, self.weak_self.clone() as Weak<dyn RealtimeSink>)?;
        slots[slot_idx].collector = Some(Arc::clone(&collector));
        drop(slots);

        // Bring the freshly paired target in sync.
        collector.publish_settings();
        tracing::info!(collector = %collector.id(), slot = slot_idx, "collector registered");
        Ok(())
    }

    fn apply_setting_to_target(&self, slot: usize, setting: &str, value: &SettingValue) {
        if let Some(slot) = self.read_slots().get(slot) {
            slot.target.apply_setting_from_collector(setting, value);
        }
    }

    fn block_ready(&self, slot: usize) {
        // Realtime path: lossy, non-blocking.
        let _ = self.ready_tx.try_send(slot);
    }
}

impl DataSource for LocalSinkAndSource {
    fn register_target(&self, target: Arc<dyn DisplayTarget>) -> usize {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.push(Slot {
            target,
            collector: None,
        });
        let slot_idx = slots.len() - 1;
        tracing::info!(target = %slots[slot_idx].target.id(), slot = slot_idx, "target registered");
        slot_idx
    }

    fn read_block(&self, slot: usize, f: &mut dyn FnMut(&[f32])) {
        // Clone the collector handle out so the registry lock is not held
        // while the closure runs.
        let collector = self
            .read_slots()
            .get(slot)
            .and_then(|slot| slot.collector.clone());
        if let Some(collector) = collector {
            let block = collector.read();
            f(&block);
        }
    }

    fn collector_for(&self, slot: usize) -> Option<Arc<dyn DataCollector>> {
        self.read_slots()
            .get(slot)
            .and_then(|slot| slot.collector.clone())
    }

    fn apply_setting_to_collector(&self, slot: usize, setting: &str, value: &SettingValue) {
        let collector = self
            .read_slots()
            .get(slot)
            .and_then(|slot| slot.collector.clone());
        if let Some(collector) = collector {
            collector.apply_setting_from_target(setting, value);
        }
    }
}
