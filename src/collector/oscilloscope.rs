//! Time-domain collector with optional rising-edge triggering.

use super::{CollectorCore, DataCollector};
use crate::buffer::try_lock_unpoisoned;
use crate::routing::SettingValue;
use std::sync::Mutex;

/// Setting keys relayed between an [`OscilloscopeCollector`] and its target.
pub mod keys {
    pub const TIME_VIEWED: &str = "time_viewed";
    pub const IS_TRIGGERED: &str = "is_triggered";
    pub const SAMPLE_PERIOD: &str = "sample_period";
    pub const NUM_SAMPLES: &str = "num_samples";
    pub const NUM_CHANNELS: &str = "num_channels";
    pub const CHANNEL_NAMES: &str = "channel_names";
}

struct ScopeState {
    num_channels: usize,
    channel_names: Vec<String>,
    /// Start offset of each channel inside the flat block.
    channel_offsets: Vec<usize>,

    /// Seconds per sample; `None` until the sample rate was set.
    sample_period: Option<f64>,
    time_viewed: f64,
    samples_expected: usize,
    samples_in_block: usize,
    expected_block_len: usize,

    trigger_enabled: bool,
    trigger_channel: usize,
    /// Rising edge already found in the block being assembled; reset once
    /// per block.
    triggered: bool,
}

impl ScopeState {
    fn reset_block(&mut self) {
        self.samples_in_block = 0;
        self.triggered = false;
    }
}

/// Accumulates multi-channel samples into fixed-size time-domain blocks,
/// optionally aligned to the first rising zero-crossing on a designated
/// trigger channel.
///
/// Block layout: `num_channels` runs of `samples_expected` samples each,
/// channel 0 first. One block spans `time_viewed` seconds; no data is
/// emitted until both sample rate and channels were configured.
pub struct OscilloscopeCollector {
    core: CollectorCore,
    state: Mutex<ScopeState>,
}

impl OscilloscopeCollector {
    /// Creates a collector pairing with the target of the same identifier.
    /// Defaults: no channels, 10 ms viewed, triggering off.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            core: CollectorCore::new(id),
            state: Mutex::new(ScopeState {
                num_channels: 0,
                channel_names: Vec::new(),
                channel_offsets: Vec::new(),
                sample_period: None,
                time_viewed: 0.01,
                samples_expected: 0,
                samples_in_block: 0,
                expected_block_len: 0,
                trigger_enabled: false,
                trigger_channel: 0,
                triggered: false,
            }),
        }
    }

    /// Sets the channel count and display names. Reallocates the block
    /// buffer; not realtime-safe.
    pub fn set_channels(&self, num_channels: usize, channel_names: Vec<String>) {
        let mut st = self.lock_state();
        st.num_channels = num_channels;
        st.channel_names = channel_names;
        self.publish_channels(&st);
        self.recalculate_memory(&mut st);
    }

    /// Sets the sample rate driving the samples-per-block calculation. Must
    /// be called before [`set_time_viewed`](Self::set_time_viewed).
    pub fn set_sample_rate(&self, sample_rate_hz: f64) {
        debug_assert!(sample_rate_hz > 0.0);
        let mut st = self.lock_state();
        st.sample_period = Some(1.0 / sample_rate_hz);
        self.recalculate_num_samples(&mut st);
    }

    /// Sets the timeframe one block spans. Changes the block size, so the
    /// buffer is reallocated; not realtime-safe.
    pub fn set_time_viewed(&self, time_viewed_secs: f64) {
        debug_assert!(time_viewed_secs > 0.0);
        let mut st = self.lock_state();
        st.time_viewed = time_viewed_secs;
        self.recalculate_num_samples(&mut st);
    }

    /// Enables or disables rising-edge triggering on `trigger_channel`.
    /// While enabled, block capture starts at the first rising zero-crossing
    /// on that channel, which keeps periodic signals stationary on screen.
    pub fn enable_triggering(&self, enabled: bool, trigger_channel: usize) {
        let mut st = self.lock_state();
        debug_assert!(!enabled || trigger_channel < st.num_channels.max(1));
        st.trigger_enabled = enabled;
        st.trigger_channel = trigger_channel;
        self.core
            .push_setting(keys::IS_TRIGGERED, &SettingValue::Bool(enabled));
    }

    /// Pushes one batch of producer samples, one slice per channel, all of
    /// equal length. Realtime-safe: never blocks, never allocates. The whole
    /// batch is dropped when the previous block has not been swapped out yet
    /// or a reconfiguration is in flight; a shape mismatch emits one
    /// all-zero block instead (the consumer renders a flat line rather than
    /// stale data).
    pub fn push(&self, channels: &[&[f32]]) {
        let Some(mut st) = try_lock_unpoisoned(&self.state) else {
            return;
        };
        let Some(mut block) = self.core.buffer().try_write() else {
            return;
        };

        if channels.len() != st.num_channels || block.len() != st.expected_block_len {
            block.fill(0.0);
            block.commit();
            st.reset_block();
            return;
        }

        let samples_in = channels.first().map_or(0, |ch| ch.len());
        debug_assert!(channels.iter().all(|ch| ch.len() == samples_in));

        if st.trigger_enabled && !st.triggered {
            let trigger = channels[st.trigger_channel];
            for i in 1..samples_in {
                if trigger[i - 1] <= 0.0 && trigger[i] > 0.0 {
                    st.triggered = true;
                    let available = samples_in - i;
                    let n = available.min(st.samples_expected);
                    for (ch, src) in channels.iter().enumerate() {
                        let offset = st.channel_offsets[ch];
                        block[offset..offset + n].copy_from_slice(&src[i..i + n]);
                    }
                    st.samples_in_block = n;
                    break;
                }
            }
            // No rising edge in this batch: the block stays empty and waits
            // for the next push.
        } else {
            let n = samples_in.min(st.samples_expected - st.samples_in_block);
            for (ch, src) in channels.iter().enumerate() {
                let offset = st.channel_offsets[ch] + st.samples_in_block;
                block[offset..offset + n].copy_from_slice(&src[..n]);
            }
            st.samples_in_block += n;
        }

        if st.samples_in_block == st.samples_expected && st.samples_expected > 0 {
            block.commit();
            st.reset_block();
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ScopeState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn recalculate_num_samples(&self, st: &mut ScopeState) {
        // Sample rate first, then time viewed.
        debug_assert!(st.sample_period.is_some());
        st.samples_expected = match st.sample_period {
            Some(period) => (st.time_viewed / period).round() as usize,
            None => 0,
        };
        st.samples_in_block = 0;
        self.publish_timebase(st);
        self.recalculate_memory(st);
    }

    fn recalculate_memory(&self, st: &mut ScopeState) {
        st.expected_block_len = st.num_channels * st.samples_expected;
        st.channel_offsets = (0..st.num_channels)
            .map(|ch| ch * st.samples_expected)
            .collect();
        self.core.buffer().reallocate(st.expected_block_len);
        tracing::debug!(
            collector = %self.core.id(),
            channels = st.num_channels,
            samples = st.samples_expected,
            "oscilloscope block layout reallocated"
        );
    }

    fn publish_timebase(&self, st: &ScopeState) {
        if let Some(period) = st.sample_period {
            self.core
                .push_setting(keys::SAMPLE_PERIOD, &SettingValue::Float(period));
        }
        self.core
            .push_setting(keys::TIME_VIEWED, &SettingValue::Float(st.time_viewed));
        self.core.push_setting(
            keys::NUM_SAMPLES,
            &SettingValue::Int(st.samples_expected as i64),
        );
    }

    fn publish_channels(&self, st: &ScopeState) {
        self.core.push_setting(
            keys::NUM_CHANNELS,
            &SettingValue::Int(st.num_channels as i64),
        );
        self.core.push_setting(
            keys::CHANNEL_NAMES,
            &SettingValue::StrList(st.channel_names.clone()),
        );
    }
}

impl DataCollector for OscilloscopeCollector {
    fn core(&self) -> &CollectorCore {
        &self.core
    }

    fn apply_setting_from_target(&self, setting: &str, value: &SettingValue) {
        match setting {
            keys::TIME_VIEWED => {
                if let Some(secs) = value.as_float() {
                    self.set_time_viewed(secs);
                }
            }
            keys::IS_TRIGGERED => {
                if let Some(enabled) = value.as_bool() {
                    let channel = self.lock_state().trigger_channel;
                    self.enable_triggering(enabled, channel);
                }
            }
            _ => {}
        }
    }

    fn publish_settings(&self) {
        let st = self.lock_state();
        self.publish_timebase(&st);
        self.publish_channels(&st);
        self.core
            .push_setting(keys::IS_TRIGGERED, &SettingValue::Bool(st.trigger_enabled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured_scope(channels: usize, samples_per_block: usize) -> OscilloscopeCollector {
        let scope = OscilloscopeCollector::new("scope");
        let names = (0..channels).map(|i| format!("ch{i}")).collect();
        scope.set_channels(channels, names);
        scope.set_sample_rate(1000.0);
        // time_viewed = n samples at 1 kHz
        scope.set_time_viewed(samples_per_block as f64 / 1000.0);
        scope
    }

    #[test]
    fn test_single_push_fills_block() {
        let scope = configured_scope(2, 4);
        scope.push(&[&[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0]]);

        let r = scope.read();
        assert_eq!(&*r, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_block_accumulates_across_pushes() {
        let scope = configured_scope(1, 4);
        scope.push(&[&[1.0, 2.0]]);
        scope.push(&[&[3.0, 4.0]]);

        let r = scope.read();
        assert_eq!(&*r, &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_channel_mismatch_emits_zero_block() {
        let scope = configured_scope(2, 4);
        scope.push(&[&[1.0, 2.0, 3.0, 4.0]]); // one channel instead of two

        let r = scope.read();
        assert_eq!(r.len(), 8);
        assert!(r.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_trigger_aligns_block_to_rising_edge() {
        let scope = configured_scope(2, 5);
        scope.enable_triggering(true, 0);

        // Channel 0 crosses from -1 to +1 at index 5 of a 10-sample push.
        let ch0 = [-1.0, -1.0, -1.0, -1.0, -1.0, 1.0, 0.5, 0.25, 0.125, 0.0625];
        let ch1 = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        scope.push(&[&ch0, &ch1]);

        let r = scope.read();
        // First emitted sample is input index 5, not index 0.
        assert_eq!(r[0], 1.0);
        assert_eq!(&r[0..5], &ch0[5..10]);
        assert_eq!(&r[5..10], &ch1[5..10]);
    }

    #[test]
    fn test_no_edge_keeps_block_empty() {
        let scope = configured_scope(1, 4);
        scope.enable_triggering(true, 0);

        scope.push(&[&[-1.0, -0.5, -0.25, -0.125]]);
        // Nothing captured yet; the edge arrives in the next push and the
        // block starts there.
        scope.push(&[&[-0.1, 0.5, 0.6, 0.7, 0.8]]);

        let r = scope.read();
        assert_eq!(&*r, &[0.5, 0.6, 0.7, 0.8]);
    }

    #[test]
    fn test_triggered_block_continues_across_pushes() {
        let scope = configured_scope(1, 4);
        scope.enable_triggering(true, 0);

        // Edge near the end of the push: only two samples available.
        scope.push(&[&[-1.0, 2.0, 3.0]]);
        // Continuation is copied as-is; no re-trigger mid-block even though
        // another rising edge appears.
        scope.push(&[&[-5.0, 6.0]]);

        let r = scope.read();
        assert_eq!(&*r, &[2.0, 3.0, -5.0, 6.0]);
    }

    #[test]
    fn test_backpressure_drops_whole_pushes() {
        let scope = configured_scope(1, 2);
        scope.push(&[&[1.0, 2.0]]);

        // Pin the reader so the next commit defers, then push twice.
        let r = scope.read();
        scope.push(&[&[3.0, 4.0]]); // commits, deferred
        scope.push(&[&[5.0, 6.0]]); // dropped entirely
        assert_eq!(r.len(), 2);
        drop(r);

        let r = scope.read();
        assert_eq!(&*r, &[3.0, 4.0]);
        assert_eq!(scope.dropped_blocks(), 1);
    }

    #[test]
    fn test_surplus_samples_discarded_at_block_boundary() {
        let scope = configured_scope(1, 4);
        scope.push(&[&[1.0, 2.0, 3.0, 4.0, 99.0, 99.0]]);

        let r = scope.read();
        assert_eq!(&*r, &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_settings_reach_target_via_sink() {
        use crate::routing::{DataSource, DisplayTarget, LocalSinkAndSource, RealtimeSink};
        use std::sync::{Arc, Mutex as StdMutex};

        struct RecordingTarget {
            seen: StdMutex<Vec<(String, SettingValue)>>,
        }
        impl DisplayTarget for RecordingTarget {
            fn id(&self) -> &str {
                "scope"
            }
            fn apply_setting_from_collector(&self, setting: &str, value: &SettingValue) {
                self.seen
                    .lock()
                    .unwrap()
                    .push((setting.to_string(), value.clone()));
            }
        }

        let (sink, _ready) = LocalSinkAndSource::new(8);
        let target = Arc::new(RecordingTarget {
            seen: StdMutex::new(Vec::new()),
        });
        sink.register_target(target.clone());

        let scope = Arc::new(OscilloscopeCollector::new("scope"));
        sink.register_collector(scope.clone()).unwrap();

        scope.set_channels(2, vec!["I".into(), "Q".into()]);
        let seen = target.seen.lock().unwrap();
        assert!(seen
            .iter()
            .any(|(k, v)| k == keys::NUM_CHANNELS && v.as_int() == Some(2)));
        assert!(seen.iter().any(|(k, _)| k == keys::CHANNEL_NAMES));
    }
}
