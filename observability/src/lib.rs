//! RAQE Observability Library
//!
//! Provides unified logging and tracing infrastructure for the RAQE engine
//! and its collaborators.
//!
//! # Features
//! - Structured JSON or pretty logging with a consistent schema
//! - Domain event logging for pipeline-stage outcomes
//! - Sensitive-data redaction before log emission
//! - Logging convenience macros

pub mod domain_events;
pub mod init;
pub mod macros;
pub mod redact;

pub use domain_events::*;
pub use init::*;
pub use redact::redact;

// Re-export tracing for convenience
pub use tracing::instrument;
pub use tracing::{debug, error, info, span, trace, warn, Instrument, Level};
