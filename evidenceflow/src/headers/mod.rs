//! Response header synthesis.
//!
//! Stages contribute to response headers through properties named
//! `SetHeader<Component><HeaderName>`. This module derives header names from
//! those properties, aggregates their values over a processed context, and
//! provides [`SetHeaderStage`] to publish the result.

mod naming;
mod stage;
mod synthesizer;

pub use naming::{
    is_set_header_property, response_header_name, SET_HEADER_MARKER, SET_HEADER_PREFIX,
};
pub use stage::{SetHeaderStage, RESPONSE_HEADERS_PROPERTY, SET_HEADERS_KEY};
pub use synthesizer::{header_properties, property_value, HeaderProperties, HeaderSynthesizer};
