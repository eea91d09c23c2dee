//! Frequency-domain collector: windowed per-channel FFT with magnitude
//! averaging over a fixed number of frames.

use super::{CollectorCore, DataCollector};
use crate::analysis::WindowFunction;
use crate::buffer::try_lock_unpoisoned;
use crate::routing::SettingValue;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, Mutex};

/// Setting keys relayed between a [`SpectrumCollector`] and its target.
pub mod keys {
    pub const NUM_CHANNELS: &str = "num_channels";
    pub const CHANNEL_NAMES: &str = "channel_names";
    pub const START_FREQUENCY: &str = "start_frequency";
    pub const END_FREQUENCY: &str = "end_frequency";
    pub const FFT_ORDER: &str = "fft_order";
}

/// FFT order used when the sample rate is set before any explicit order:
/// 2^11 = 2048 samples per frame.
pub const DEFAULT_FFT_ORDER: usize = 11;

/// Magnitude spectra summed per emitted block.
pub const DEFAULT_AVERAGING_DEPTH: usize = 3;

/// Everything the producer path touches, guarded by one mutex that doubles
/// as the reconfiguration guard: `push` try-locks it, the setters block on
/// it, so a reconfiguration in flight makes the producer drop samples
/// instead of waiting.
struct SpectrumState {
    planner: FftPlanner<f32>,
    fft: Option<Arc<dyn Fft<f32>>>,
    fft_order: usize,
    fft_len: usize,
    window_fn: WindowFunction,
    window: Vec<f32>,

    sample_rate: f64,
    start_frequency: f64,

    num_channels: usize,
    channel_names: Vec<String>,
    channel_offsets: Vec<usize>,
    total_len: usize,

    /// Per-channel accumulation of incoming samples as zero-imaginary
    /// complex values, `fft_len` per channel.
    sample_buf: Vec<Complex<f32>>,
    /// Per-channel transform output.
    spectral_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    cursor: usize,
    frames_accumulated: usize,
    averaging_depth: usize,
}

/// Collects samples, runs a windowed forward FFT per channel once 2^order
/// samples arrived, and averages magnitude spectra over
/// [`DEFAULT_AVERAGING_DEPTH`] frames before emitting one block.
///
/// Block layout: `num_channels` runs of `fft_len` magnitudes, channel 0
/// first, scaled by `2 / (fft_len × depth)` so a full-scale sine shows its
/// amplitude in its bin. Unlike the oscilloscope collector, a channel-count
/// mismatch discards the push silently instead of emitting a zero block.
pub struct SpectrumCollector {
    core: CollectorCore,
    processing: Mutex<SpectrumState>,
}

impl SpectrumCollector {
    /// Creates a collector pairing with the target of the same identifier.
    /// No data is emitted until the sample rate was set.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            core: CollectorCore::new(id),
            processing: Mutex::new(SpectrumState {
                planner: FftPlanner::new(),
                fft: None,
                fft_order: 0,
                fft_len: 0,
                window_fn: WindowFunction::default(),
                window: Vec::new(),
                sample_rate: 0.0,
                start_frequency: 0.0,
                num_channels: 0,
                channel_names: Vec::new(),
                channel_offsets: Vec::new(),
                total_len: 0,
                sample_buf: Vec::new(),
                spectral_buf: Vec::new(),
                scratch: Vec::new(),
                cursor: 0,
                frames_accumulated: 0,
                averaging_depth: DEFAULT_AVERAGING_DEPTH,
            }),
        }
    }

    /// Sets the channel count and display names. Reallocates all buffers;
    /// not realtime-safe.
    pub fn set_channels(&self, num_channels: usize, channel_names: Vec<String>) {
        let mut st = self.lock_processing();
        st.num_channels = num_channels;
        st.channel_names = channel_names;
        self.publish_channels(&st);
        self.recalculate_memory(&mut st);
    }

    /// Sets the FFT order (frame length 2^order). Higher orders trade
    /// latency for frequency resolution. Blocks on the reconfiguration
    /// guard; not realtime-safe.
    pub fn set_fft_order(&self, fft_order: usize) {
        let mut st = self.lock_processing();
        self.apply_fft_order(&mut st, fft_order);
    }

    /// Sets the sample rate, and the start frequency for data mixed down
    /// from RF (pass `0.0` for baseband). Falls back to
    /// [`DEFAULT_FFT_ORDER`] if no order was configured yet, since setting
    /// the sample rate is what arms processing.
    pub fn set_sample_rate(&self, sample_rate_hz: f64, start_frequency_hz: f64) {
        debug_assert!(sample_rate_hz > 0.0);
        let mut st = self.lock_processing();
        if st.fft_order == 0 {
            self.apply_fft_order(&mut st, DEFAULT_FFT_ORDER);
        }
        st.sample_rate = sample_rate_hz;
        st.start_frequency = start_frequency_hz;
        self.publish_frequency_span(&st);
    }

    /// Selects the window applied before the transform. Default is Hamming.
    pub fn set_window_function(&self, window_fn: WindowFunction) {
        let mut st = self.lock_processing();
        st.window_fn = window_fn;
        st.window = window_fn.generate_f32(st.fft_len);
    }

    /// Pushes one batch of producer samples, one slice per channel.
    /// Realtime-safe: never blocks, never allocates. The batch is discarded
    /// silently when the channel count mismatches, no FFT order is
    /// configured yet, or a reconfiguration holds the guard.
    pub fn push(&self, channels: &[&[f32]]) {
        let Some(mut st) = try_lock_unpoisoned(&self.processing) else {
            return;
        };
        if channels.len() != st.num_channels || st.fft.is_none() {
            return;
        }

        let samples_in = channels.first().map_or(0, |ch| ch.len());
        debug_assert!(channels.iter().all(|ch| ch.len() == samples_in));

        let n = samples_in.min(st.fft_len - st.cursor);
        {
            let SpectrumState {
                channel_offsets,
                sample_buf,
                cursor,
                ..
            } = &mut *st;
            for (ch, src) in channels.iter().enumerate() {
                let base = channel_offsets[ch] + *cursor;
                for (slot, &sample) in sample_buf[base..base + n].iter_mut().zip(src.iter()) {
                    *slot = Complex::new(sample, 0.0);
                }
            }
        }
        st.cursor += n;

        // Samples beyond the frame boundary are discarded; the next frame
        // starts with the next push.
        if st.cursor >= st.fft_len {
            self.process_frame(&mut st);
        }
    }

    fn lock_processing(&self) -> std::sync::MutexGuard<'_, SpectrumState> {
        self.processing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// One full frame accumulated: window, transform and fold the magnitudes
    /// into the current average. Runs on the producer thread under the
    /// reconfiguration guard.
    fn process_frame(&self, st: &mut SpectrumState) {
        st.cursor = 0;
        {
            let SpectrumState {
                fft,
                window,
                channel_offsets,
                sample_buf,
                spectral_buf,
                scratch,
                fft_len,
                ..
            } = &mut *st;
            let Some(fft) = fft else { return };
            for &offset in channel_offsets.iter() {
                for i in 0..*fft_len {
                    spectral_buf[offset + i] = sample_buf[offset + i] * window[i];
                }
                fft.process_with_scratch(&mut spectral_buf[offset..offset + *fft_len], scratch);
            }
        }

        let Some(mut block) = self.core.buffer().try_write() else {
            // Previous block still undelivered; this frame is lost.
            return;
        };

        if block.len() != st.total_len {
            // A resize raced the averaging cycle. Hand the stale block back
            // instead of writing past its bounds and start a fresh average.
            block.commit();
            st.frames_accumulated = 0;
            return;
        }

        if st.frames_accumulated == 0 {
            block.fill(0.0);
        }
        for (acc, spectral) in block.iter_mut().zip(st.spectral_buf.iter()) {
            *acc += spectral.norm();
        }
        st.frames_accumulated += 1;

        if st.frames_accumulated == st.averaging_depth {
            let scale = 2.0 / (st.fft_len as f32 * st.averaging_depth as f32);
            for acc in block.iter_mut() {
                *acc *= scale;
            }
            block.commit();
            st.frames_accumulated = 0;
        }
    }

    fn apply_fft_order(&self, st: &mut SpectrumState, fft_order: usize) {
        st.fft_order = fft_order;
        st.fft_len = 1 << fft_order;
        let fft = st.planner.plan_fft_forward(st.fft_len);
        st.scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        st.window = st.window_fn.generate_f32(st.fft_len);
        st.fft = Some(fft);
        self.recalculate_memory(st);
        self.core
            .push_setting(keys::FFT_ORDER, &SettingValue::Int(fft_order as i64));
    }

    fn recalculate_memory(&self, st: &mut SpectrumState) {
        st.total_len = st.num_channels * st.fft_len;
        st.channel_offsets = (0..st.num_channels).map(|ch| ch * st.fft_len).collect();
        st.sample_buf = vec![Complex::default(); st.total_len];
        st.spectral_buf = vec![Complex::default(); st.total_len];
        st.cursor = 0;
        st.frames_accumulated = 0;
        self.core.buffer().reallocate(st.total_len);
        tracing::debug!(
            collector = %self.core.id(),
            channels = st.num_channels,
            fft_len = st.fft_len,
            "spectrum buffers reallocated"
        );
    }

    fn publish_channels(&self, st: &SpectrumState) {
        self.core.push_setting(
            keys::NUM_CHANNELS,
            &SettingValue::Int(st.num_channels as i64),
        );
        self.core.push_setting(
            keys::CHANNEL_NAMES,
            &SettingValue::StrList(st.channel_names.clone()),
        );
    }

    fn publish_frequency_span(&self, st: &SpectrumState) {
        // Set the sample rate before publishing the span.
        debug_assert!(st.sample_rate > 0.0);
        self.core.push_setting(
            keys::START_FREQUENCY,
            &SettingValue::Float(st.start_frequency),
        );
        self.core.push_setting(
            keys::END_FREQUENCY,
            &SettingValue::Float(st.start_frequency + st.sample_rate),
        );
    }
}

impl DataCollector for SpectrumCollector {
    fn core(&self) -> &CollectorCore {
        &self.core
    }

    fn apply_setting_from_target(&self, setting: &str, value: &SettingValue) {
        if setting == keys::FFT_ORDER {
            if let Some(order) = value.as_int() {
                self.set_fft_order(order as usize);
            }
        }
    }

    fn publish_settings(&self) {
        let st = self.lock_processing();
        self.publish_channels(&st);
        if st.sample_rate > 0.0 {
            self.publish_frequency_span(&st);
        }
        self.core.push_setting(
            keys::FFT_ORDER,
            &SettingValue::Int(st.fft_order as i64),
        );
    }
}
