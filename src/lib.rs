//! Lock-light transfer of audio and RF sample blocks from realtime
//! processing threads to visualization consumers.
//!
//! The crate is organized around a swap-based handoff rather than a ring
//! buffer: the producer fills a back block and exchanges it wholesale with
//! the consumer's front block, so neither side ever copies sample data
//! across the boundary. The producer side is strictly non-blocking and
//! allocation-free; under backpressure whole blocks are dropped, never
//! torn.
//!
//! # Architecture
//!
//! - [`buffer`] — the swap primitives. [`DoubleBuffer`] implements the
//!   two-block protocol with a deferred swap for the case where the
//!   consumer is mid-read; [`ChannelSwapBuffer`] layers a multi-channel
//!   arena with chunked accumulation on top of the same idea.
//! - [`collector`] — producer-facing capture stages.
//!   [`OscilloscopeCollector`] assembles fixed-duration time-domain blocks
//!   with optional rising-edge triggering; [`SpectrumCollector`] runs a
//!   windowed FFT per frame and averages magnitude spectra before
//!   emitting.
//! - [`analysis`] — window functions and frequency-axis helpers shared by
//!   the spectrum path and its consumers.
//! - [`routing`] — the directory pairing collectors with display targets
//!   by identifier, plus the in-process [`LocalSinkAndSource`]
//!   implementation and the [`SettingValue`] relay for configuration
//!   exchange in both directions.
//! - [`config`] — serializable collector descriptions for persisting a
//!   setup.
//!
//! # Example
//!
//! ```
//! use scopelink::collector::{DataCollector, OscilloscopeCollector};
//! use std::sync::Arc;
//!
//! let scope = Arc::new(OscilloscopeCollector::new("demo"));
//! scope.set_channels(1, vec!["ch0".into()]);
//! scope.set_sample_rate(1000.0);
//! scope.set_time_viewed(0.004);
//!
//! // Realtime thread: push chunks, never blocked.
//! scope.push(&[&[0.0, 0.25, 0.5, 0.75]]);
//!
//! // GUI thread: read the completed block.
//! let block = scope.read();
//! assert_eq!(&block[..], &[0.0, 0.25, 0.5, 0.75]);
//! ```

pub mod analysis;
pub mod buffer;
pub mod collector;
pub mod config;
pub mod error;
pub mod routing;

pub use analysis::WindowFunction;
pub use buffer::{ChannelSwapBuffer, DoubleBuffer};
pub use collector::{DataCollector, OscilloscopeCollector, SpectrumCollector};
pub use config::{ScopeConfig, SpectrumConfig};
pub use error::{Result, RoutingError};
pub use routing::{DataSource, DisplayTarget, LocalSinkAndSource, RealtimeSink, SettingValue};
