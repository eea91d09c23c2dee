//! Signal-analysis helpers shared by the spectrum collector and its
//! consumers: window functions and frequency-axis utilities.

mod window;

pub use window::WindowFunction;

/// Center frequency of every FFT bin for a given configuration.
///
/// `start_frequency` shifts the axis for data that was mixed down from RF
/// before analysis; pass `0.0` for baseband signals.
pub fn bin_frequencies(fft_len: usize, sample_rate: f64, start_frequency: f64) -> Vec<f64> {
    let resolution = sample_rate / fft_len as f64;
    (0..fft_len)
        .map(|bin| start_frequency + bin as f64 * resolution)
        .collect()
}
