//! Pipeline building and metadata indexing.
//!
//! This module provides:
//! - The pipeline builder and settings
//! - The immutable stage chain shared by execution contexts
//! - The cross-stage property metadata index

mod builder;
mod index;
mod runtime;
mod settings;

pub use builder::PipelineBuilder;
pub use index::{IndexEntry, IndexHit, PropertyMetadataIndex};
pub use runtime::Pipeline;
pub use settings::PipelineSettings;
