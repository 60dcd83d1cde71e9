//! Core domain model types for evidenceflow.
//!
//! This module contains the fundamental types shared by stages and contexts:
//! - Present/absent property values
//! - Property descriptors and schemas
//! - Per-stage result objects

mod element_data;
mod property_value;
pub mod schema;

pub use element_data::ElementData;
pub use property_value::PropertyValue;
pub use schema::{PropertyDescriptor, PropertySchema, SchemaCell};
