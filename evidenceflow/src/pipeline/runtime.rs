//! The immutable stage chain shared by execution contexts.

use super::{PipelineSettings, PropertyMetadataIndex};
use crate::context::ExecutionContext;
use crate::errors::FlowError;
use crate::evidence::{EvidenceKeyFilter, EvidenceStore};
use crate::logging::{LogLevel, Logger};
use crate::stages::Stage;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// An ordered chain of stages plus the metadata index over their schemas.
///
/// Built through [`PipelineBuilder`](super::PipelineBuilder) and shared as
/// `Arc<Pipeline>` by every context it creates.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    positions: HashMap<String, usize>,
    index: PropertyMetadataIndex,
    logger: Logger,
    settings: PipelineSettings,
    evidence_filter: Arc<PipelineEvidenceFilter>,
}

impl Pipeline {
    pub(super) fn new(
        stages: Vec<Arc<dyn Stage>>,
        logger: Logger,
        settings: PipelineSettings,
    ) -> Result<Arc<Self>, FlowError> {
        let mut positions = HashMap::with_capacity(stages.len());
        for (idx, stage) in stages.iter().enumerate() {
            let key = stage.data_key().to_string();
            if positions.insert(key.clone(), idx).is_some() {
                return Err(FlowError::DuplicateStage { key });
            }
        }

        let pipeline = Arc::new(Self {
            evidence_filter: Arc::new(PipelineEvidenceFilter {
                stages: stages.clone(),
            }),
            stages,
            positions,
            index: PropertyMetadataIndex::new(),
            logger,
            settings,
        });

        for stage in &pipeline.stages {
            stage.on_registration(&pipeline);
            pipeline.index.rebuild(stage.data_key(), &stage.properties());
        }

        tracing::debug!(
            stages = ?pipeline.stage_keys(),
            suppress = pipeline.settings.suppress_process_exceptions,
            "Pipeline built"
        );

        Ok(pipeline)
    }

    /// Creates a fresh execution context for one request.
    ///
    /// The context's evidence store only accepts keys some stage reads.
    #[must_use]
    pub fn create_context(self: &Arc<Self>) -> ExecutionContext {
        let gate: Arc<dyn EvidenceKeyFilter> = self.evidence_filter.clone();
        ExecutionContext::new(Arc::clone(self), EvidenceStore::gated(gate))
    }

    /// Returns the stages in registration order.
    #[must_use]
    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    /// Returns stage identities in registration order.
    #[must_use]
    pub fn stage_keys(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.data_key()).collect()
    }

    /// Gets a stage by identity.
    #[must_use]
    pub fn stage(&self, key: &str) -> Option<&Arc<dyn Stage>> {
        self.positions.get(key).map(|&idx| &self.stages[idx])
    }

    /// Returns the registration position of a stage.
    #[must_use]
    pub fn position(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Returns the property metadata index.
    #[must_use]
    pub const fn index(&self) -> &PropertyMetadataIndex {
        &self.index
    }

    /// Returns the logger.
    #[must_use]
    pub const fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Returns true if `run()` keeps stage faults to the context.
    #[must_use]
    pub const fn suppresses_process_exceptions(&self) -> bool {
        self.settings.suppress_process_exceptions
    }

    /// Logs through the pipeline logger.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.logger.log(level, message);
    }

    /// Re-indexes a stage after its schema changed.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownStage`] if the stage is not registered.
    pub fn refresh_stage_schema(&self, key: &str) -> Result<(), FlowError> {
        let stage = self.stage(key).ok_or_else(|| FlowError::UnknownStage {
            key: key.to_string(),
        })?;
        self.index.rebuild(key, &stage.properties());
        self.log(
            LogLevel::Debug,
            format!("Property metadata refreshed for {key}"),
        );
        Ok(())
    }

    /// Returns the union of all stages' evidence filters.
    #[must_use]
    pub fn evidence_key_filter(&self) -> Arc<dyn EvidenceKeyFilter> {
        self.evidence_filter.clone()
    }

    /// Returns true if any stage reads the evidence key.
    #[must_use]
    pub fn accepts_evidence(&self, key: &str) -> bool {
        self.evidence_filter.filter_evidence_key(key)
    }

    /// Returns the union of keys the stages name explicitly, sorted.
    #[must_use]
    pub fn declared_evidence_keys(&self) -> Vec<String> {
        self.evidence_filter.declared_keys()
    }
}

/// Accepts a key if any stage's filter accepts it.
#[derive(Debug)]
struct PipelineEvidenceFilter {
    stages: Vec<Arc<dyn Stage>>,
}

impl EvidenceKeyFilter for PipelineEvidenceFilter {
    fn filter_evidence_key(&self, key: &str) -> bool {
        self.stages
            .iter()
            .any(|s| s.evidence_key_filter().filter_evidence_key(key))
    }

    fn declared_keys(&self) -> Vec<String> {
        let keys: BTreeSet<String> = self
            .stages
            .iter()
            .flat_map(|s| s.evidence_key_filter().declared_keys())
            .collect();
        keys.into_iter().collect()
    }
}
