//! Fixture stages for testing.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::ExecutionContext;
use crate::core::{ElementData, PropertyDescriptor, PropertySchema, PropertyValue, SchemaCell};
use crate::evidence::{BasicListEvidenceKeyFilter, EvidenceKeyFilter};
use crate::stages::Stage;

/// A stage that writes a fixed set of values.
#[derive(Debug)]
pub struct StaticStage {
    data_key: String,
    schema: SchemaCell,
    values: Vec<(String, PropertyValue)>,
    filter: BasicListEvidenceKeyFilter,
    calls: AtomicUsize,
}

impl StaticStage {
    /// Creates a stage that writes an empty result.
    #[must_use]
    pub fn new(data_key: impl Into<String>) -> Self {
        Self {
            data_key: data_key.into(),
            schema: SchemaCell::default(),
            values: Vec::new(),
            filter: BasicListEvidenceKeyFilter::empty(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Declares a property and the value the stage writes for it.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDescriptor, value: PropertyValue) -> Self {
        let name = property.name.clone();
        self.schema.update(|schema| schema.insert(property));
        self.values.push((name, value));
        self
    }

    /// Writes a value without declaring it in the schema.
    #[must_use]
    pub fn with_undeclared_value(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.values.push((name.into(), value));
        self
    }

    /// Sets the evidence keys the stage reads.
    #[must_use]
    pub fn with_evidence_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter = BasicListEvidenceKeyFilter::new(keys);
        self
    }

    /// Returns the schema holder, for late schema changes.
    #[must_use]
    pub const fn schema(&self) -> &SchemaCell {
        &self.schema
    }

    /// Returns how many times the stage was processed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Stage for StaticStage {
    fn data_key(&self) -> &str {
        &self.data_key
    }

    fn properties(&self) -> PropertySchema {
        self.schema.snapshot()
    }

    fn evidence_key_filter(&self) -> &dyn EvidenceKeyFilter {
        &self.filter
    }

    fn process(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let data = ElementData::from_values(&self.data_key, self.values.iter().cloned());
        ctx.set_element_data(data)?;
        Ok(())
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    data_key: String,
    error: String,
    filter: BasicListEvidenceKeyFilter,
    calls: AtomicUsize,
}

impl FailingStage {
    /// Creates a failing stage.
    #[must_use]
    pub fn new(data_key: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            data_key: data_key.into(),
            error: error.into(),
            filter: BasicListEvidenceKeyFilter::empty(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times the stage was processed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Stage for FailingStage {
    fn data_key(&self) -> &str {
        &self.data_key
    }

    fn properties(&self) -> PropertySchema {
        PropertySchema::new()
    }

    fn evidence_key_filter(&self) -> &dyn EvidenceKeyFilter {
        &self.filter
    }

    fn process(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("{}", self.error)
    }
}

/// A stage that asks the context to stop.
#[derive(Debug)]
pub struct StopStage {
    data_key: String,
    filter: BasicListEvidenceKeyFilter,
}

impl StopStage {
    /// Creates a stop stage.
    #[must_use]
    pub fn new(data_key: impl Into<String>) -> Self {
        Self {
            data_key: data_key.into(),
            filter: BasicListEvidenceKeyFilter::empty(),
        }
    }
}

impl Stage for StopStage {
    fn data_key(&self) -> &str {
        &self.data_key
    }

    fn properties(&self) -> PropertySchema {
        PropertySchema::new()
    }

    fn evidence_key_filter(&self) -> &dyn EvidenceKeyFilter {
        &self.filter
    }

    fn process(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        ctx.stop();
        Ok(())
    }
}

/// A stage that records what it saw of the context.
#[derive(Debug)]
pub struct RecordingStage {
    data_key: String,
    filter: BasicListEvidenceKeyFilter,
    seen_stopped: Mutex<Vec<bool>>,
    seen_evidence: Mutex<Vec<Vec<String>>>,
}

impl RecordingStage {
    /// Creates a recording stage reading the given evidence keys.
    pub fn new<I, S>(data_key: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            data_key: data_key.into(),
            filter: BasicListEvidenceKeyFilter::new(keys),
            seen_stopped: Mutex::new(Vec::new()),
            seen_evidence: Mutex::new(Vec::new()),
        }
    }

    /// Returns the `is_stopped` flag observed on each call.
    #[must_use]
    pub fn seen_stopped(&self) -> Vec<bool> {
        self.seen_stopped.lock().clone()
    }

    /// Returns the evidence keys visible to this stage on each call.
    #[must_use]
    pub fn seen_evidence(&self) -> Vec<Vec<String>> {
        self.seen_evidence.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.seen_stopped.lock().len()
    }
}

impl Stage for RecordingStage {
    fn data_key(&self) -> &str {
        &self.data_key
    }

    fn properties(&self) -> PropertySchema {
        PropertySchema::new()
    }

    fn evidence_key_filter(&self) -> &dyn EvidenceKeyFilter {
        &self.filter
    }

    fn process(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.seen_stopped.lock().push(ctx.is_stopped());
        let keys = ctx
            .evidence_for(self)
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        self.seen_evidence.lock().push(keys);
        Ok(())
    }
}
