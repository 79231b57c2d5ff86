//! # DevLab Cleanup
//!
//! Background reclamation for DevLab sandboxes.
//!
//! [`CleanupWorker`] wakes on a fixed interval, reclaims scenarios older than
//! the configured maximum age and removes managed containers that no record
//! references. It runs beside the lifecycle manager without coordinating
//! with it, and stops when its [`CancellationToken`] is cancelled.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod config;
pub mod report;
pub mod worker;

pub use config::WorkerConfig;
pub use report::{CycleReport, SweepReport};
pub use worker::CleanupWorker;
