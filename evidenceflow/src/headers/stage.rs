//! Stage that publishes the response header map.

use super::synthesizer::HeaderSynthesizer;
use crate::context::ExecutionContext;
use crate::core::{ElementData, PropertyDescriptor, PropertySchema, PropertyValue};
use crate::evidence::{BasicListEvidenceKeyFilter, EvidenceKeyFilter};
use crate::stages::Stage;
use parking_lot::RwLock;
use std::sync::Arc;

/// Identity of the header stage.
pub const SET_HEADERS_KEY: &str = "set-headers";

/// Property holding the header map.
pub const RESPONSE_HEADERS_PROPERTY: &str = "responseheaderdictionary";

/// Writes the synthesized response headers as a JSON object.
///
/// Header-contributing properties are discovered from the pipeline on the
/// first run and cached until [`reset_cache`](Self::reset_cache).
#[derive(Debug)]
pub struct SetHeaderStage {
    filter: BasicListEvidenceKeyFilter,
    synthesizer: RwLock<Option<Arc<HeaderSynthesizer>>>,
}

impl Default for SetHeaderStage {
    fn default() -> Self {
        Self::new()
    }
}

impl SetHeaderStage {
    /// Creates a header stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: BasicListEvidenceKeyFilter::empty(),
            synthesizer: RwLock::new(None),
        }
    }

    /// Drops the cached property scan so the next run rescans the pipeline.
    pub fn reset_cache(&self) {
        *self.synthesizer.write() = None;
    }

    /// Returns true if a property scan is cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.synthesizer.read().is_some()
    }

    fn synthesizer(&self, ctx: &ExecutionContext) -> Arc<HeaderSynthesizer> {
        if let Some(cached) = self.synthesizer.read().as_ref() {
            return Arc::clone(cached);
        }

        let mut slot = self.synthesizer.write();
        Arc::clone(slot.get_or_insert_with(|| {
            let synth = HeaderSynthesizer::from_pipeline(ctx.pipeline());
            tracing::debug!(stages = synth.sources().len(), "Header properties scanned");
            Arc::new(synth)
        }))
    }
}

impl Stage for SetHeaderStage {
    fn data_key(&self) -> &str {
        SET_HEADERS_KEY
    }

    fn properties(&self) -> PropertySchema {
        PropertySchema::new().with_property(
            PropertyDescriptor::new(RESPONSE_HEADERS_PROPERTY).with_meta("type", "object"),
        )
    }

    fn evidence_key_filter(&self) -> &dyn EvidenceKeyFilter {
        &self.filter
    }

    fn process(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let headers = self.synthesizer(ctx).synthesize(ctx)?;
        let value = serde_json::to_value(headers)?;
        let data = ElementData::new(SET_HEADERS_KEY)
            .with(RESPONSE_HEADERS_PROPERTY, PropertyValue::present(value));
        ctx.set_element_data(data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;
    use crate::testing::StaticStage;
    use serde_json::json;

    fn device_stage() -> Arc<StaticStage> {
        Arc::new(
            StaticStage::new("device")
                .with_property(
                    PropertyDescriptor::new("SetHeaderBrowserAcceptCH"),
                    PropertyValue::json("Sec-CH-UA"),
                )
                .with_property(
                    PropertyDescriptor::new("SetHeaderPlatformAcceptCH"),
                    PropertyValue::json("Sec-CH-UA-Platform"),
                ),
        )
    }

    #[test]
    fn test_writes_header_dictionary() {
        let headers = Arc::new(SetHeaderStage::new());
        let pipeline = PipelineBuilder::new()
            .add(device_stage())
            .add(headers.clone())
            .build()
            .unwrap();
        let mut ctx = pipeline.create_context();

        ctx.run().unwrap();

        let value = ctx.value(SET_HEADERS_KEY, RESPONSE_HEADERS_PROPERTY).unwrap();
        assert_eq!(
            value.value().unwrap(),
            &json!({"AcceptCH": "Sec-CH-UA,Sec-CH-UA-Platform"})
        );
        assert!(headers.is_cached());
    }

    #[test]
    fn test_cache_survives_schema_change_until_reset() {
        let device = device_stage();
        let headers = Arc::new(SetHeaderStage::new());
        let pipeline = PipelineBuilder::new()
            .add(device.clone())
            .add(headers.clone())
            .build()
            .unwrap();
        pipeline.create_context().run().unwrap();

        device.schema().update(|schema| {
            schema.insert(PropertyDescriptor::new("SetHeaderBrowserCriticalCH"));
        });

        let mut ctx = pipeline.create_context();
        ctx.run().unwrap();
        let value = ctx.value(SET_HEADERS_KEY, RESPONSE_HEADERS_PROPERTY).unwrap();
        assert!(value.value().unwrap().get("CriticalCH").is_none());

        headers.reset_cache();
        assert!(!headers.is_cached());

        let mut ctx = pipeline.create_context();
        ctx.run().unwrap();
        let value = ctx.value(SET_HEADERS_KEY, RESPONSE_HEADERS_PROPERTY).unwrap();
        assert_eq!(value.value().unwrap()["CriticalCH"], json!(""));
    }

    #[test]
    fn test_malformed_header_property_faults_stage() {
        let bad = StaticStage::new("bad").with_property(
            PropertyDescriptor::new("SetHeaderlowercase"),
            PropertyValue::json("x"),
        );
        let pipeline = PipelineBuilder::new()
            .add(Arc::new(bad))
            .add(Arc::new(SetHeaderStage::new()))
            .suppress_process_exceptions(true)
            .build()
            .unwrap();
        let mut ctx = pipeline.create_context();

        ctx.run().unwrap();

        let fault = ctx.fault(SET_HEADERS_KEY).unwrap();
        assert!(fault.message.contains("SetHeaderlowercase"));
        assert!(!ctx.has_element_data(SET_HEADERS_KEY));
    }
}
