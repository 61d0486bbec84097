//! Sender — runs named confirmation sequences.
//!
//! A sequence owns a bundle source and a confirmer: it takes the next
//! bundle to confirm, drives it through the confirmation task, folds the
//! bundle's initial attachment cost into every confirmer update, and
//! publishes the result as [`SenderUpdate`]s to the log, the metrics
//! registry, and an optional downstream channel.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod sequence;
pub mod source;
pub mod update;

pub use config::{SenderConfig, SequenceParams};
pub use error::SenderError;
pub use logging::{init_logging, LogFormat};
pub use metrics::SenderMetrics;
pub use sequence::{Gateways, Sequence};
pub use source::{bundle_channel, synthetic_source, BundleSource, FirstBundle};
pub use update::{SenderUpdate, SenderUpdateKind};
