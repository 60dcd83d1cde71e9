//! Pipeline builder.

use super::{Pipeline, PipelineSettings};
use crate::errors::FlowError;
use crate::logging::Logger;
use crate::stages::Stage;
use std::sync::Arc;

/// Builder for creating pipelines.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
    logger: Option<Logger>,
    settings: PipelineSettings,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage. Stages run in the order they are added.
    #[must_use]
    pub fn add(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends several stages.
    #[must_use]
    pub fn add_all<I>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Stage>>,
    {
        self.stages.extend(stages);
        self
    }

    /// Sets the logger. Overrides the level from the settings.
    #[must_use]
    pub fn add_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Applies settings.
    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets whether `run()` keeps stage faults to the context.
    #[must_use]
    pub fn suppress_process_exceptions(mut self, suppress: bool) -> Self {
        self.settings.suppress_process_exceptions = suppress;
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the pipeline, registering and indexing every stage.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::DuplicateStage`] if two stages share an identity.
    pub fn build(self) -> Result<Arc<Pipeline>, FlowError> {
        let logger = self
            .logger
            .unwrap_or_else(|| Logger::tracing(self.settings.log_level));
        Pipeline::new(self.stages, logger, self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use crate::testing::StaticStage;

    fn stage(key: &str) -> Arc<dyn Stage> {
        Arc::new(StaticStage::new(key))
    }

    #[test]
    fn test_builder_creation() {
        let builder = PipelineBuilder::new();
        assert_eq!(builder.stage_count(), 0);
    }

    #[test]
    fn test_builder_keeps_order() {
        let pipeline = PipelineBuilder::new()
            .add(stage("b"))
            .add_all([stage("a"), stage("c")])
            .build()
            .unwrap();

        assert_eq!(pipeline.stage_keys(), vec!["b", "a", "c"]);
        assert_eq!(pipeline.position("c"), Some(2));
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let err = PipelineBuilder::new()
            .add(stage("a"))
            .add(stage("a"))
            .build()
            .unwrap_err();

        assert!(matches!(err, FlowError::DuplicateStage { ref key } if key == "a"));
    }

    #[test]
    fn test_empty_pipeline_is_allowed() {
        let pipeline = PipelineBuilder::new().build().unwrap();
        let mut ctx = pipeline.create_context();
        assert!(ctx.run().is_ok());
    }

    #[test]
    fn test_settings_drive_default_logger() {
        let settings = PipelineSettings::new()
            .with_log_level(LogLevel::Information)
            .with_suppress_process_exceptions(true);
        let pipeline = PipelineBuilder::new().with_settings(settings).build().unwrap();

        assert_eq!(pipeline.logger().min_level(), LogLevel::Information);
        assert!(pipeline.suppresses_process_exceptions());
    }

    #[test]
    fn test_explicit_flag_overrides_settings() {
        let pipeline = PipelineBuilder::new()
            .with_settings(PipelineSettings::new().with_suppress_process_exceptions(true))
            .suppress_process_exceptions(false)
            .build()
            .unwrap();

        assert!(!pipeline.suppresses_process_exceptions());
    }
}
