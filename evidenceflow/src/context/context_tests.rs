//! Tests for the execution context state machine.

#[cfg(test)]
mod tests {
    use crate::context::ExecutionContext;
    use crate::core::{ElementData, PropertyDescriptor, PropertyValue};
    use crate::errors::{FlowError, GLOBAL_FAULT_KEY};
    use crate::logging::{LogLevel, Logger, MemoryLogSink};
    use crate::pipeline::{Pipeline, PipelineBuilder};
    use crate::stages::Stage;
    use crate::testing::{FailingStage, RecordingStage, StaticStage, StopStage};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn build(stages: Vec<Arc<dyn Stage>>, suppress: bool) -> (Arc<Pipeline>, Arc<MemoryLogSink>) {
        let sink = Arc::new(MemoryLogSink::new());
        let pipeline = PipelineBuilder::new()
            .add_all(stages)
            .add_logger(Logger::new(LogLevel::Debug, sink.clone()))
            .suppress_process_exceptions(suppress)
            .build()
            .unwrap();
        (pipeline, sink)
    }

    fn context(stages: Vec<Arc<dyn Stage>>) -> ExecutionContext {
        build(stages, false).0.create_context()
    }

    #[test]
    fn test_new_context_is_not_processed() {
        let ctx = context(vec![]);
        assert!(!ctx.is_processed());
        assert!(!ctx.is_stopped());
        assert!(!ctx.has_faults());
    }

    #[test]
    fn test_run_marks_processed() {
        let stage = Arc::new(StaticStage::new("a"));
        let mut ctx = context(vec![stage.clone()]);

        ctx.run().unwrap();

        assert!(ctx.is_processed());
        assert_eq!(stage.call_count(), 1);
        assert!(ctx.has_element_data("a"));
    }

    #[test]
    fn test_second_run_records_global_fault() {
        let stage = Arc::new(StaticStage::new("a"));
        let (pipeline, sink) = build(vec![stage.clone()], false);
        let mut ctx = pipeline.create_context();

        ctx.run().unwrap();
        let err = ctx.run().unwrap_err();

        assert_eq!(stage.call_count(), 1);
        let fault = err.as_stage_fault().unwrap();
        assert!(fault.is_global());
        assert!(ctx.fault(GLOBAL_FAULT_KEY).is_some());
        assert_eq!(sink.entries_at(LogLevel::Error).len(), 1);
    }

    #[test]
    fn test_second_run_raises_earlier_stage_fault_first() {
        let (pipeline, _) = build(
            vec![
                Arc::new(StaticStage::new("a")),
                Arc::new(FailingStage::new("b", "boom")),
            ],
            false,
        );
        let mut ctx = pipeline.create_context();

        let first = ctx.run().unwrap_err();
        let second = ctx.run().unwrap_err();

        assert_eq!(first.as_stage_fault().unwrap().stage, "b");
        assert_eq!(second.as_stage_fault().unwrap().stage, "b");
        assert!(ctx.fault(GLOBAL_FAULT_KEY).is_some());
        assert_eq!(ctx.faults().len(), 2);
    }

    #[test]
    fn test_second_run_suppressed_still_records_fault() {
        let (pipeline, _) = build(vec![Arc::new(StaticStage::new("a"))], true);
        let mut ctx = pipeline.create_context();

        ctx.run().unwrap();
        ctx.run().unwrap();

        assert!(ctx.fault(GLOBAL_FAULT_KEY).is_some());
    }

    #[test]
    fn test_fault_does_not_stop_later_stages() {
        let failing = Arc::new(FailingStage::new("a", "boom"));
        let later = Arc::new(StaticStage::new("b"));
        let (pipeline, sink) = build(vec![failing.clone(), later.clone()], false);
        let mut ctx = pipeline.create_context();

        let err = ctx.run().unwrap_err();

        assert_eq!(err.to_string(), "Error occurred during processing of a: boom");
        assert_eq!(later.call_count(), 1);
        assert!(ctx.has_element_data("b"));
        assert!(ctx.is_processed());
        let errors = sink.entries_at(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Error occurred during processing of a. \nboom");
    }

    #[test]
    fn test_suppressed_faults_stay_on_context() {
        let (pipeline, _) = build(
            vec![
                Arc::new(FailingStage::new("a", "boom")),
                Arc::new(StaticStage::new("b")),
            ],
            true,
        );
        let mut ctx = pipeline.create_context();

        assert!(ctx.run().is_ok());
        assert_eq!(ctx.faults().len(), 1);
        assert_eq!(ctx.fault("a").unwrap().message, "boom");
        assert!(ctx.has_element_data("b"));
    }

    #[test]
    fn test_first_fault_in_registration_order_is_raised() {
        let mut ctx = context(vec![
            Arc::new(StaticStage::new("ok")),
            Arc::new(FailingStage::new("first", "one")),
            Arc::new(FailingStage::new("second", "two")),
        ]);

        let err = ctx.run().unwrap_err();

        assert_eq!(err.as_stage_fault().unwrap().stage, "first");
        assert_eq!(ctx.faults().len(), 2);
    }

    #[test]
    fn test_stop_skips_remaining_stages() {
        let before = Arc::new(RecordingStage::new("before", Vec::<String>::new()));
        let after = Arc::new(RecordingStage::new("after", Vec::<String>::new()));
        let mut ctx = context(vec![
            before.clone(),
            Arc::new(StopStage::new("stop")),
            after.clone(),
        ]);

        ctx.run().unwrap();

        assert_eq!(before.seen_stopped(), vec![false]);
        assert_eq!(after.call_count(), 0);
        assert!(ctx.is_stopped());
        assert!(ctx.is_processed());
    }

    #[test]
    fn test_get_before_any_data() {
        let ctx = context(vec![Arc::new(StaticStage::new("a"))]);
        let err = ctx.get("a").unwrap_err();
        assert!(matches!(err, FlowError::NoElementData { ref key } if key == "a"));
    }

    #[test]
    fn test_get_unknown_lists_available_keys() {
        let mut ctx = context(vec![
            Arc::new(StaticStage::new("b")),
            Arc::new(StaticStage::new("a")),
        ]);
        ctx.run().unwrap();

        let err = ctx.get("missing").unwrap_err();

        match err {
            FlowError::UnknownElementData { key, available } => {
                assert_eq!(key, "missing");
                assert_eq!(available, vec!["b".to_string(), "a".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_value_reads_one_property() {
        let stage = StaticStage::new("device")
            .with_property(PropertyDescriptor::new("IsMobile"), PropertyValue::json(true));
        let mut ctx = context(vec![Arc::new(stage)]);
        ctx.run().unwrap();

        assert_eq!(ctx.value("device", "ismobile").unwrap().value().unwrap(), &json!(true));
        assert!(matches!(
            ctx.value("device", "other"),
            Err(FlowError::PropertyNotFound { .. })
        ));
    }

    #[test]
    fn test_set_element_data_twice_conflicts() {
        let mut ctx = context(vec![]);
        ctx.set_element_data(ElementData::new("x")).unwrap();

        let err = ctx.set_element_data(ElementData::new("x")).unwrap_err();

        assert!(matches!(err, FlowError::DataConflict { ref key } if key == "x"));
    }

    #[test]
    fn test_get_where_returns_tagged_values() {
        let stage = StaticStage::new("numbers")
            .with_property(
                PropertyDescriptor::new("integer").with_meta("type", "int"),
                PropertyValue::json(5),
            )
            .with_property(
                PropertyDescriptor::new("text").with_meta("type", "string"),
                PropertyValue::json("five"),
            );
        let mut ctx = context(vec![Arc::new(stage)]);
        ctx.run().unwrap();

        let found = ctx.get_where("type", "int");

        assert_eq!(found.len(), 1);
        assert_eq!(found["integer"], PropertyValue::json(5));
    }

    #[test]
    fn test_get_where_skips_unproduced_values() {
        let stage = StaticStage::new("partial")
            .with_property(
                PropertyDescriptor::new("produced").with_meta("category", "device"),
                PropertyValue::json("yes"),
            )
            .with_undeclared_value("extra", PropertyValue::json("no tag"));
        stage.schema().update(|schema| {
            schema.insert(PropertyDescriptor::new("declared").with_meta("category", "device"));
        });
        let mut ctx = context(vec![Arc::new(stage)]);
        ctx.run().unwrap();

        let found = ctx.get_where("category", "device");

        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["produced"]);
    }

    #[test]
    fn test_get_where_skips_stages_that_did_not_run() {
        let tagged = StaticStage::new("late").with_property(
            PropertyDescriptor::new("value").with_meta("category", "x"),
            PropertyValue::json(1),
        );
        let mut ctx = context(vec![Arc::new(StopStage::new("stop")), Arc::new(tagged)]);
        ctx.run().unwrap();

        assert!(ctx.get_where("category", "x").is_empty());
    }

    #[test]
    fn test_context_only_accepts_requested_evidence() {
        let mut ctx = context(vec![
            Arc::new(StaticStage::new("a").with_evidence_keys(["header.user-agent"])),
            Arc::new(StaticStage::new("b").with_evidence_keys(["query.sequence"])),
        ]);

        assert!(ctx.evidence_mut().set("Header.User-Agent", "agent"));
        assert!(ctx.evidence_mut().set("query.sequence", 3));
        assert!(!ctx.evidence_mut().set("cookie.id", "ignored"));

        assert_eq!(ctx.evidence().len(), 2);
        assert_eq!(ctx.requested_evidence().len(), 2);
    }

    #[test]
    fn test_evidence_for_uses_stage_filter() {
        let recorder = Arc::new(RecordingStage::new("rec", ["header.accept"]));
        let mut ctx = context(vec![
            recorder.clone(),
            Arc::new(StaticStage::new("other").with_evidence_keys(["query.x"])),
        ]);
        ctx.evidence_mut().set("header.accept", "*/*");
        ctx.evidence_mut().set("query.x", "1");

        ctx.run().unwrap();

        assert_eq!(recorder.seen_evidence(), vec![vec!["header.accept".to_string()]]);
    }

    #[test]
    fn test_element_data_keys_follow_registration_order() {
        let mut ctx = context(vec![
            Arc::new(StaticStage::new("z")),
            Arc::new(StaticStage::new("m")),
        ]);
        ctx.run().unwrap();

        assert_eq!(ctx.element_data_keys(), vec!["z".to_string(), "m".to_string()]);
    }
}
