//! Testing utilities for evidenceflow pipelines.
//!
//! This module provides fixture stages with fixed output, failures, stop
//! requests and call recording.

mod mocks;

pub use mocks::{FailingStage, RecordingStage, StaticStage, StopStage};
