//! Directory service pairing collectors with their visualization targets.
//!
//! Collectors and targets find each other by identifier string. The sink
//! side lives next to the realtime producer; the source side lives next to
//! the consumer. Both are traits so the transport between them can vary —
//! [`LocalSinkAndSource`] is the in-process implementation for applications
//! where producer and consumer share one binary.
//!
//! Out-of-band settings (sample rate, channel names, FFT order, ...) travel
//! in both directions as an open string-keyed [`SettingValue`] protocol; the
//! crate does not define a wire format.

mod local;

pub use local::LocalSinkAndSource;

use crate::collector::DataCollector;
use crate::error::Result;
use std::sync::Arc;

/// A dynamically typed settings value exchanged between a collector and its
/// target.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    StrList(Vec<String>),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(v) => Some(*v),
            SettingValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::StrList(v) => Some(v),
            _ => None,
        }
    }
}

/// Producer-side connection from collectors to a visualization target set.
///
/// Implementations assign each collector a consumer-slot index at
/// registration and wire themselves into the collector's swap notification.
pub trait RealtimeSink: Send + Sync {
    /// Pairs a collector with the target sharing its identifier. The
    /// collector must stay registered for the sink's whole lifetime.
    fn register_collector(&self, collector: Arc<dyn DataCollector>) -> Result<()>;

    /// Relays a settings value from the collector to its paired target.
    /// Called from non-realtime configuration paths.
    fn apply_setting_to_target(&self, slot: usize, setting: &str, value: &SettingValue);

    /// Called synchronously on the producer thread once per completed
    /// block. Implementations must return immediately: no blocking, no
    /// allocation.
    fn block_ready(&self, slot: usize);
}

/// Consumer-side endpoint that receives data blocks and settings.
pub trait DisplayTarget: Send + Sync {
    /// Identifier matched against the collector side.
    fn id(&self) -> &str;

    /// Receives an out-of-band settings value from the paired collector.
    fn apply_setting_from_collector(&self, _setting: &str, _value: &SettingValue) {}
}

/// Consumer-side access to the directory: read blocks and push settings back
/// to the collectors.
pub trait DataSource: Send + Sync {
    /// Registers a target and returns its consumer-slot index. Must be
    /// called before registering the collector with the same identifier.
    fn register_target(&self, target: Arc<dyn DisplayTarget>) -> usize;

    /// Reads the most recent block of the collector paired with `slot`. The
    /// closure runs with the read region held; it must not re-enter the
    /// source. Blocks briefly if a swap is in flight; a slot without a
    /// collector is a no-op.
    fn read_block(&self, slot: usize, f: &mut dyn FnMut(&[f32]));

    /// The collector paired with `slot`, for consumers that want to drive
    /// [`DataCollector::read`] themselves.
    fn collector_for(&self, slot: usize) -> Option<Arc<dyn DataCollector>>;

    /// Relays a settings value from the target back to its collector.
    fn apply_setting_to_collector(&self, slot: usize, setting: &str, value: &SettingValue);
}
