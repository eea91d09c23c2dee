//! Error handling for the scopelink transfer core.
//!
//! Only the non-realtime surfaces (registration, configuration) return
//! errors. Nothing on the producer push path is ever surfaced as a `Result`:
//! backpressure and shape mismatches are resolved locally inside the
//! collectors so the realtime thread never branches into error machinery.

use thiserror::Error;

/// Errors raised by the routing/directory service and collector wiring.
#[derive(Error, Debug)]
pub enum RoutingError {
    /// No visualization target with a matching identifier was registered
    /// before the collector.
    #[error("no visualization target registered with identifier `{0}`")]
    UnknownTarget(String),

    /// The matching target already has a collector attached.
    #[error("target `{0}` already has a data collector attached")]
    SlotOccupied(String),

    /// The collector was already registered with a sink. A collector can be
    /// connected exactly once for its lifetime.
    #[error("collector `{0}` is already connected to a sink")]
    AlreadyConnected(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RoutingError>;
