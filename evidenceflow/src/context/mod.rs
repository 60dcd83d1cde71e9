//! Per-request execution state.
//!
//! This module provides the [`ExecutionContext`], which owns the evidence,
//! stage results and faults of one run through a pipeline.

#[cfg(test)]
mod context_tests;
mod execution;

pub use execution::ExecutionContext;
