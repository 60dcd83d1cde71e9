//! # Evidenceflow
//!
//! A request-scoped pipeline that turns evidence into properties.
//!
//! Evidenceflow runs an ordered chain of stages over one request at a time:
//!
//! - **Evidence gating**: each context only stores evidence some stage reads
//! - **Execution contexts**: a single-use state machine with per-stage fault
//!   isolation and an early-stop flag
//! - **Metadata index**: look up produced properties by schema tags across
//!   all stages
//! - **Header synthesis**: derive response headers from `SetHeader*`
//!   properties
//!
//! ## Quick Start
//!
//! ```rust
//! use evidenceflow::prelude::*;
//! use std::sync::Arc;
//!
//! let device = FnStage::new("device", |ctx| {
//!     let data = ElementData::new("device").with("ismobile", PropertyValue::json(true));
//!     ctx.set_element_data(data)?;
//!     Ok(())
//! })
//! .with_evidence_keys(["header.user-agent"]);
//!
//! let pipeline = PipelineBuilder::new()
//!     .add(Arc::new(device))
//!     .add(Arc::new(SetHeaderStage::new()))
//!     .build()?;
//!
//! let mut ctx = pipeline.create_context();
//! ctx.evidence_mut().set("header.user-agent", "Mozilla/5.0");
//! ctx.run()?;
//!
//! assert!(ctx.get("device")?.value("ismobile")?.as_bool().unwrap_or_default());
//! # Ok::<(), FlowError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod core;
pub mod errors;
pub mod evidence;
pub mod headers;
pub mod logging;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::ExecutionContext;
    pub use crate::core::{
        ElementData, PropertyDescriptor, PropertySchema, PropertyValue, SchemaCell,
    };
    pub use crate::errors::{FlowError, StageFault};
    pub use crate::evidence::{
        BasicListEvidenceKeyFilter, EvidenceKeyFilter, EvidenceStore, PrefixEvidenceKeyFilter,
    };
    pub use crate::headers::{HeaderSynthesizer, SetHeaderStage};
    pub use crate::logging::{LogLevel, LogSink, Logger};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineSettings, PropertyMetadataIndex};
    pub use crate::stages::{FnStage, JsonBundlerStage, SequenceStage, Stage};
}
