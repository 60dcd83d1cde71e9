//! Stage trait and implementations.
//!
//! Stages are the units of work in an evidenceflow pipeline. Each stage has a
//! stable identity (its data key), declares the properties it produces and
//! the evidence it reads, and writes at most one [`ElementData`] per context.
//!
//! [`ElementData`]: crate::core::ElementData

mod json_bundler;
mod sequence;

pub use json_bundler::JsonBundlerStage;
pub use sequence::SequenceStage;

use crate::context::ExecutionContext;
use crate::core::PropertySchema;
use crate::evidence::{BasicListEvidenceKeyFilter, EvidenceKeyFilter};
use crate::pipeline::Pipeline;
use std::fmt::Debug;

/// Trait for pipeline stages.
pub trait Stage: Send + Sync + Debug {
    /// Returns the stage identity, used as the key for its results and faults.
    fn data_key(&self) -> &str;

    /// Returns the current property schema.
    ///
    /// May be empty at construction and grow later. After a change, call
    /// [`Pipeline::refresh_stage_schema`] so lookups by metadata see it.
    fn properties(&self) -> PropertySchema;

    /// Returns the filter describing which evidence this stage reads.
    fn evidence_key_filter(&self) -> &dyn EvidenceKeyFilter;

    /// Processes one execution context.
    ///
    /// Any error returned here is recorded against this stage and does not
    /// stop later stages from running.
    fn process(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()>;

    /// Called once when the stage is added to a pipeline.
    fn on_registration(&self, _pipeline: &Pipeline) {}
}

type ProcessFn = dyn Fn(&mut ExecutionContext) -> anyhow::Result<()> + Send + Sync;

/// A closure-backed stage.
pub struct FnStage {
    data_key: String,
    schema: PropertySchema,
    filter: BasicListEvidenceKeyFilter,
    func: Box<ProcessFn>,
}

impl FnStage {
    /// Creates a new function-based stage with no schema and no evidence.
    pub fn new<F>(data_key: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            data_key: data_key.into(),
            schema: PropertySchema::new(),
            filter: BasicListEvidenceKeyFilter::empty(),
            func: Box::new(func),
        }
    }

    /// Sets the declared schema.
    #[must_use]
    pub fn with_schema(mut self, schema: PropertySchema) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the evidence keys this stage reads.
    #[must_use]
    pub fn with_evidence_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter = BasicListEvidenceKeyFilter::new(keys);
        self
    }
}

impl Debug for FnStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("data_key", &self.data_key)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Stage for FnStage {
    fn data_key(&self) -> &str {
        &self.data_key
    }

    fn properties(&self) -> PropertySchema {
        self.schema.clone()
    }

    fn evidence_key_filter(&self) -> &dyn EvidenceKeyFilter {
        &self.filter
    }

    fn process(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        (self.func)(ctx)
    }
}
