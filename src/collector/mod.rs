//! Collector base: ownership of the double buffer, sink wiring and the
//! consumer-facing read contract shared by the concrete collectors.

pub mod oscilloscope;
pub mod spectrum;

pub use oscilloscope::OscilloscopeCollector;
pub use spectrum::SpectrumCollector;

use crate::buffer::{BlockReadGuard, DoubleBuffer};
use crate::error::{Result, RoutingError};
use crate::routing::{RealtimeSink, SettingValue};
use std::sync::{OnceLock, Weak};

struct SinkLink {
    slot: usize,
    sink: Weak<dyn RealtimeSink>,
}

/// State every collector owns: the identifier used for pairing, the double
/// buffer carrying finished blocks, and the one-shot link to the sink set at
/// registration time.
pub struct CollectorCore {
    id: String,
    buffer: DoubleBuffer<f32>,
    link: OnceLock<SinkLink>,
}

impl CollectorCore {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            buffer: DoubleBuffer::new(0),
            link: OnceLock::new(),
        }
    }

    /// Identifier matched against the consumer-side target.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The swap buffer carrying finished blocks to the consumer.
    pub fn buffer(&self) -> &DoubleBuffer<f32> {
        &self.buffer
    }

    /// Wires this collector to its sink. Called once by the sink during
    /// registration, before realtime streaming starts: stores the consumer
    /// slot and routes the buffer's swap notification to
    /// [`RealtimeSink::block_ready`].
    pub fn connect(&self, slot: usize, sink: Weak<dyn RealtimeSink>) -> Result<()> {
        self.link
            .set(SinkLink {
                slot,
                sink: sink.clone(),
            })
            .map_err(|_| RoutingError::AlreadyConnected(self.id.clone()))?;
        self.buffer.set_on_swap(Box::new(move || {
            if let Some(sink) = sink.upgrade() {
                sink.block_ready(slot);
            }
        }));
        tracing::debug!(collector = %self.id, slot, "collector connected to sink");
        Ok(())
    }

    /// Relays one settings value to the paired target. A no-op before
    /// registration or after the sink was dropped.
    pub fn push_setting(&self, setting: &str, value: &SettingValue) {
        if let Some(link) = self.link.get() {
            if let Some(sink) = link.sink.upgrade() {
                sink.apply_setting_to_target(link.slot, setting, value);
            }
        }
    }
}

/// The abstraction the directory service works against: one realtime data
/// channel delivering fixed-size blocks plus a bidirectional settings relay.
///
/// # Threading contract
///
/// One producer thread drives the concrete collector's `push`; one consumer
/// thread drives [`read`](Self::read). No third thread may join either role;
/// that is a documented precondition, not defended against at runtime.
pub trait DataCollector: Send + Sync {
    /// Shared collector state. The sink uses this for wiring.
    fn core(&self) -> &CollectorCore;

    /// Pairing identifier.
    fn id(&self) -> &str {
        self.core().id()
    }

    /// Acquires the most recent completed block. Blocks briefly if a swap is
    /// in flight. The region stays valid until the guard drops; repeated
    /// reads without an intervening swap return the same data.
    fn read(&self) -> BlockReadGuard<'_, f32> {
        self.core().buffer().read()
    }

    /// Number of samples one completed block is expected to hold under the
    /// current configuration.
    fn expected_block_len(&self) -> usize {
        self.core().buffer().expected_len()
    }

    /// Producer pushes rejected under backpressure so far.
    fn dropped_blocks(&self) -> u64 {
        self.core().buffer().dropped_blocks()
    }

    /// Receives an out-of-band settings value from the paired target. Runs
    /// on the consumer/config thread, never the producer thread.
    fn apply_setting_from_target(&self, _setting: &str, _value: &SettingValue) {}

    /// Pushes every relayed setting to the paired target, bringing a freshly
    /// connected (or reconnected) consumer in sync.
    fn publish_settings(&self) {}
}
