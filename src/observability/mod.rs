//! Observability module
//!
//! Logging, metrics, and the structured event stream used to follow a
//! sequence while it runs (or to audit a rehearsal afterwards).

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter, RunSummary, StopReason};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
