//! Cached value snapshots, jittering, and the refresh orchestrator.

pub mod jitter;
pub mod result;
pub mod supplier;
