//! Per-request execution context.

use crate::core::{ElementData, PropertyValue};
use crate::errors::{FlowError, StageFault};
use crate::evidence::EvidenceStore;
use crate::logging::LogLevel;
use crate::pipeline::Pipeline;
use crate::stages::Stage;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// Run state for one logical request.
///
/// A context is created by [`Pipeline::create_context`], filled with evidence
/// by the caller, and processed exactly once by [`run`](Self::run). Results and
/// faults stay readable afterwards.
#[derive(Debug)]
pub struct ExecutionContext {
    pipeline: Arc<Pipeline>,
    evidence: EvidenceStore,
    data: HashMap<String, ElementData>,
    faults: HashMap<String, StageFault>,
    stopped: bool,
    processed: bool,
}

impl ExecutionContext {
    pub(crate) fn new(pipeline: Arc<Pipeline>, evidence: EvidenceStore) -> Self {
        Self {
            pipeline,
            evidence,
            data: HashMap::new(),
            faults: HashMap::new(),
            stopped: false,
            processed: false,
        }
    }

    /// Returns the pipeline that created this context.
    #[must_use]
    pub const fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Returns the evidence store.
    #[must_use]
    pub const fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    /// Returns the evidence store for writing.
    pub fn evidence_mut(&mut self) -> &mut EvidenceStore {
        &mut self.evidence
    }

    /// Runs every stage in registration order.
    ///
    /// A stage fault is recorded and logged, and the next stage still runs.
    /// Once all stages ran, or a stage called [`stop`](Self::stop), the
    /// context is marked processed.
    ///
    /// # Errors
    ///
    /// Unless the pipeline suppresses process exceptions, returns the fault of
    /// the first failing stage in registration order. Running an already
    /// processed context runs no stage and records a fault under the
    /// `"global"` key. That fault is returned only when no stage failed in
    /// the earlier run.
    pub fn run(&mut self) -> Result<(), FlowError> {
        let span = tracing::debug_span!("execution_context.run", stages = self.pipeline.stages().len());
        let _guard = span.enter();

        let raised = if self.processed {
            let global = StageFault::already_processed();
            self.set_fault(global.clone());
            Some(self.first_stage_fault().cloned().unwrap_or(global))
        } else {
            self.process_stages();
            self.processed = true;
            self.first_stage_fault().cloned()
        };

        match raised {
            Some(fault) if !self.pipeline.suppresses_process_exceptions() => Err(fault.into()),
            _ => Ok(()),
        }
    }

    fn process_stages(&mut self) {
        let pipeline = Arc::clone(&self.pipeline);
        for stage in pipeline.stages() {
            if self.stopped {
                tracing::debug!(stage = stage.data_key(), "Processing stopped, skipping remaining stages");
                break;
            }

            let key = stage.data_key();
            let started = Instant::now();
            match stage.process(self) {
                Ok(()) => {
                    tracing::debug!(
                        stage = key,
                        duration_ms = started.elapsed().as_secs_f64() * 1000.0,
                        "Stage processed"
                    );
                }
                Err(err) => self.set_fault(StageFault::from_error(key, &err)),
            }
        }
    }

    fn set_fault(&mut self, fault: StageFault) {
        tracing::warn!(stage = %fault.stage, error = %fault.message, "Stage fault recorded");
        self.pipeline.log(
            LogLevel::Error,
            format!(
                "Error occurred during processing of {}. \n{}",
                fault.stage, fault.message
            ),
        );
        self.faults.insert(fault.stage.clone(), fault);
    }

    fn first_stage_fault(&self) -> Option<&StageFault> {
        self.pipeline
            .stages()
            .iter()
            .find_map(|stage| self.faults.get(stage.data_key()))
    }

    /// Asks the run loop to end after the current stage.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Returns true if a stage asked to stop processing.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Returns true once `run()` has completed.
    #[must_use]
    pub const fn is_processed(&self) -> bool {
        self.processed
    }

    /// Returns every recorded fault keyed by stage identity or `"global"`.
    #[must_use]
    pub const fn faults(&self) -> &HashMap<String, StageFault> {
        &self.faults
    }

    /// Returns the fault recorded for a key.
    #[must_use]
    pub fn fault(&self, key: &str) -> Option<&StageFault> {
        self.faults.get(key)
    }

    /// Returns true if any fault was recorded.
    #[must_use]
    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }

    /// Stores a stage's result.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::DataConflict`] if the stage already wrote data to
    /// this context.
    pub fn set_element_data(&mut self, data: ElementData) -> Result<(), FlowError> {
        if self.data.contains_key(data.stage()) {
            return Err(FlowError::DataConflict {
                key: data.stage().to_string(),
            });
        }
        self.data.insert(data.stage().to_string(), data);
        Ok(())
    }

    /// Gets a stage's result.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NoElementData`] while no stage has written data,
    /// and [`FlowError::UnknownElementData`] when others have but this one
    /// has not.
    pub fn get(&self, key: &str) -> Result<&ElementData, FlowError> {
        if let Some(data) = self.data.get(key) {
            return Ok(data);
        }

        if self.data.is_empty() {
            return Err(FlowError::NoElementData {
                key: key.to_string(),
            });
        }

        Err(FlowError::UnknownElementData {
            key: key.to_string(),
            available: self.element_data_keys(),
        })
    }

    /// Gets the result of a stage object.
    pub fn get_from_stage(&self, stage: &dyn Stage) -> Result<&ElementData, FlowError> {
        self.get(stage.data_key())
    }

    /// Gets one property of one stage's result.
    pub fn value(&self, stage: &str, property: &str) -> Result<&PropertyValue, FlowError> {
        self.get(stage)?.get(property)
    }

    /// Returns true if the stage has written data.
    #[must_use]
    pub fn has_element_data(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the identities with data, in registration order.
    #[must_use]
    pub fn element_data_keys(&self) -> Vec<String> {
        let position = |key: &str| self.pipeline.position(key).unwrap_or(usize::MAX);
        let mut keys: Vec<String> = self.data.keys().cloned().collect();
        keys.sort_by(|a, b| (position(a), a).cmp(&(position(b), b)));
        keys
    }

    /// Returns every property tagged `meta_key = meta_value` that a stage has
    /// produced in this context, keyed by lower-cased property name.
    ///
    /// Properties whose stage has not run, or that the stage did not
    /// actually produce, are left out.
    #[must_use]
    pub fn get_where(&self, meta_key: &str, meta_value: &str) -> BTreeMap<String, PropertyValue> {
        self.pipeline
            .index()
            .query(meta_key, meta_value)
            .into_iter()
            .filter_map(|hit| {
                let data = self.data.get(&hit.stage)?;
                data.get(&hit.property)
                    .ok()
                    .map(|value| (hit.property, value.clone()))
            })
            .collect()
    }

    /// Returns the evidence entries at least one stage reads.
    #[must_use]
    pub fn requested_evidence(&self) -> Vec<(&str, &serde_json::Value)> {
        let filter = self.pipeline.evidence_key_filter();
        self.evidence.filtered(filter.as_ref())
    }

    /// Returns the evidence entries a given stage reads.
    #[must_use]
    pub fn evidence_for(&self, stage: &dyn Stage) -> Vec<(&str, &serde_json::Value)> {
        self.evidence.filtered(stage.evidence_key_filter())
    }
}
