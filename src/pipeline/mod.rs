//! # Pipeline Coordinator
//!
//! Runs decode, sequencing and encode off the caller's thread and reports a
//! single terminal result per job.

pub mod coordinator;
pub mod state;

pub use coordinator::{BoomerangCoordinator, BoomerangJob, BoomerangOptions, CancellationToken};
pub use state::PipelineState;
