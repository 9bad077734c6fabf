//! FinSight Observability Library
//!
//! Provides the shared tracing setup used by FinSight services.
//!
//! # Features
//! - Structured logging with a consistent schema across services
//! - JSON output for production, pretty output for development
//! - `RUST_LOG`-compatible level filtering

pub mod init;

pub use init::*;

// Re-export tracing for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level};
