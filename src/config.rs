//! Serializable setup descriptions for the two collectors.
//!
//! Applications persist these alongside their own settings (TOML or JSON)
//! and rebuild the collectors at startup. Building applies every setter in
//! the required order (sample rate before timebase), so a config is also
//! the convenient way to construct a ready-to-stream collector.

use crate::analysis::WindowFunction;
use crate::collector::{OscilloscopeCollector, SpectrumCollector};
use serde::{Deserialize, Serialize};

/// Setup of one [`OscilloscopeCollector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Identifier pairing the collector with its target.
    pub id: String,
    pub channel_names: Vec<String>,
    /// `None` leaves the collector unarmed until the stream source reports
    /// its rate.
    pub sample_rate_hz: Option<f64>,
    pub time_viewed_secs: f64,
    pub trigger_enabled: bool,
    pub trigger_channel: usize,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            id: "oscilloscope".to_string(),
            channel_names: Vec::new(),
            sample_rate_hz: None,
            time_viewed_secs: 0.01,
            trigger_enabled: false,
            trigger_channel: 0,
        }
    }
}

impl ScopeConfig {
    /// Builds a collector configured per this description.
    pub fn build(&self) -> OscilloscopeCollector {
        let scope = OscilloscopeCollector::new(self.id.clone());
        scope.set_channels(self.channel_names.len(), self.channel_names.clone());
        if let Some(rate) = self.sample_rate_hz {
            scope.set_sample_rate(rate);
            scope.set_time_viewed(self.time_viewed_secs);
        }
        if self.trigger_enabled {
            scope.enable_triggering(true, self.trigger_channel);
        }
        scope
    }
}

/// Setup of one [`SpectrumCollector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Identifier pairing the collector with its target.
    pub id: String,
    pub channel_names: Vec<String>,
    /// `None` leaves the collector unarmed until the stream source reports
    /// its rate.
    pub sample_rate_hz: Option<f64>,
    /// Frequency-axis offset for data mixed down from RF.
    pub start_frequency_hz: f64,
    /// Frame length is `2^fft_order` samples.
    pub fft_order: usize,
    pub window: WindowFunction,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            id: "spectrum".to_string(),
            channel_names: Vec::new(),
            sample_rate_hz: None,
            start_frequency_hz: 0.0,
            fft_order: crate::collector::spectrum::DEFAULT_FFT_ORDER,
            window: WindowFunction::default(),
        }
    }
}

impl SpectrumConfig {
    /// Builds a collector configured per this description.
    pub fn build(&self) -> SpectrumCollector {
        let spectrum = SpectrumCollector::new(self.id.clone());
        spectrum.set_channels(self.channel_names.len(), self.channel_names.clone());
        spectrum.set_window_function(self.window);
        spectrum.set_fft_order(self.fft_order);
        if let Some(rate) = self.sample_rate_hz {
            spectrum.set_sample_rate(rate, self.start_frequency_hz);
        }
        spectrum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::DataCollector;

    #[test]
    fn test_scope_config_round_trips_toml() {
        let config = ScopeConfig {
            id: "scope-main".into(),
            channel_names: vec!["I".into(), "Q".into()],
            sample_rate_hz: Some(48_000.0),
            time_viewed_secs: 0.005,
            trigger_enabled: true,
            trigger_channel: 1,
        };
        let text = toml::to_string(&config).unwrap();
        let parsed: ScopeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.id, "scope-main");
        assert_eq!(parsed.channel_names.len(), 2);
        assert!(parsed.trigger_enabled);
    }

    #[test]
    fn test_build_scope_applies_block_geometry() {
        let scope = ScopeConfig {
            channel_names: vec!["ch0".into()],
            sample_rate_hz: Some(1000.0),
            time_viewed_secs: 0.004,
            ..Default::default()
        }
        .build();
        assert_eq!(scope.expected_block_len(), 4);
    }

    #[test]
    fn test_spectrum_defaults_deserialize_from_empty() {
        let config: SpectrumConfig = toml::from_str("").unwrap();
        assert_eq!(config.id, "spectrum");
        assert_eq!(config.window, WindowFunction::Hamming);

        let spectrum = config.build();
        assert_eq!(spectrum.expected_block_len(), 0); // no channels yet
    }

    #[test]
    fn test_build_spectrum_applies_fft_order() {
        let spectrum = SpectrumConfig {
            channel_names: vec!["ch0".into()],
            sample_rate_hz: Some(8000.0),
            fft_order: 5,
            ..Default::default()
        }
        .build();
        assert_eq!(spectrum.expected_block_len(), 32);
    }
}
