//! Window functions for FFT preprocessing.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function applied to time-domain samples before the forward FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    /// Rectangular window (no windowing)
    Rectangular,
    /// Hann window (good general purpose)
    Hann,
    /// Hamming window (reduced side lobes)
    #[default]
    Hamming,
    /// Blackman window (very low side lobes)
    Blackman,
}

impl WindowFunction {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            WindowFunction::Rectangular => "Rectangular",
            WindowFunction::Hann => "Hann",
            WindowFunction::Hamming => "Hamming",
            WindowFunction::Blackman => "Blackman",
        }
    }

    /// Get all window functions
    pub fn all() -> &'static [WindowFunction] {
        &[
            WindowFunction::Rectangular,
            WindowFunction::Hann,
            WindowFunction::Hamming,
            WindowFunction::Blackman,
        ]
    }

    /// Compute window coefficient at position i out of n samples
    pub fn coefficient(&self, i: usize, n: usize) -> f64 {
        let n_f = n as f64;
        let i_f = i as f64;

        match self {
            WindowFunction::Rectangular => 1.0,
            WindowFunction::Hann => 0.5 * (1.0 - (2.0 * PI * i_f / n_f).cos()),
            WindowFunction::Hamming => 0.54 - 0.46 * (2.0 * PI * i_f / n_f).cos(),
            WindowFunction::Blackman => {
                // Clamp to 0.0: the formula is exactly 0 at endpoints but
                // floating-point representation of 0.42 and 0.08 can produce -ε.
                (0.42 - 0.5 * (2.0 * PI * i_f / n_f).cos() + 0.08 * (4.0 * PI * i_f / n_f).cos())
                    .max(0.0)
            }
        }
    }

    /// Generate window coefficients for n samples
    pub fn generate(&self, n: usize) -> Vec<f64> {
        (0..n).map(|i| self.coefficient(i, n)).collect()
    }

    /// Generate single-precision coefficients, matching the sample format of
    /// the realtime path.
    pub fn generate_f32(&self, n: usize) -> Vec<f32> {
        (0..n).map(|i| self.coefficient(i, n) as f32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangular_is_unity() {
        assert!(WindowFunction::Rectangular
            .generate(16)
            .iter()
            .all(|&c| c == 1.0));
    }

    #[test]
    fn test_hamming_endpoints() {
        let w = WindowFunction::Hamming.generate(64);
        // Periodic Hamming: 0.08 at the left edge, peak of 1.0 at n/2.
        assert!((w[0] - 0.08).abs() < 1e-12);
        assert!((w[32] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hann_is_nonnegative() {
        assert!(WindowFunction::Hann.generate(128).iter().all(|&c| c >= 0.0));
    }

    #[test]
    fn test_blackman_clamped_at_edges() {
        let w = WindowFunction::Blackman.generate(32);
        assert!(w[0] >= 0.0);
        assert!(w.iter().all(|&c| c >= 0.0 && c <= 1.0));
    }

    #[test]
    fn test_generate_f32_matches_f64() {
        let w64 = WindowFunction::Hamming.generate(8);
        let w32 = WindowFunction::Hamming.generate_f32(8);
        for (a, b) in w64.iter().zip(&w32) {
            assert!((*a as f32 - b).abs() < 1e-7);
        }
    }
}
