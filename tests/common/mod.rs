//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

use scopelink::collector::DataCollector;
use scopelink::routing::{DisplayTarget, SettingValue};
use std::collections::HashMap;
use std::sync::{Mutex, Once};
use std::time::Duration;

/// Install the tracing subscriber once per test binary; honors RUST_LOG
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Timeout for cross-thread notification waits
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// One period of a sine at `amplitude`, `period` samples long, repeated to
/// fill `len` samples.
pub fn sine_samples(len: usize, period: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            amplitude * (std::f32::consts::TAU * (i % period) as f32 / period as f32).sin()
        })
        .collect()
}

/// Display target that records every setting relayed from its collector.
pub struct RecordingTarget {
    id: String,
    pub settings: Mutex<HashMap<String, SettingValue>>,
}

impl RecordingTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            settings: Mutex::new(HashMap::new()),
        }
    }

    pub fn setting(&self, key: &str) -> Option<SettingValue> {
        self.settings.lock().unwrap().get(key).cloned()
    }
}

impl DisplayTarget for RecordingTarget {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply_setting_from_collector(&self, key: &str, value: &SettingValue) {
        self.settings
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
    }
}

/// Drains a collector's current front block into a `Vec`.
pub fn snapshot_block(collector: &dyn DataCollector) -> Vec<f32> {
    collector.read().to_vec()
}
