//! Stage that bundles every earlier result into one JSON document.

use crate::context::ExecutionContext;
use crate::core::{ElementData, PropertyDescriptor, PropertySchema, PropertyValue};
use crate::errors::FlowError;
use crate::evidence::{BasicListEvidenceKeyFilter, EvidenceKeyFilter};
use crate::stages::Stage;
use serde_json::{Map, Value};

/// Suffix of the entry that explains a null property.
const NULL_REASON_SUFFIX: &str = "nullreason";

/// Serializes the results produced so far into `{stage: {property: value}}`.
///
/// Absent values are written as `null` with a sibling `<property>nullreason`
/// entry. The stage's own result is never included.
#[derive(Debug)]
pub struct JsonBundlerStage {
    filter: BasicListEvidenceKeyFilter,
}

impl Default for JsonBundlerStage {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonBundlerStage {
    /// Identity of the bundler stage.
    pub const DATA_KEY: &'static str = "jsonbundler";

    /// Creates a bundler stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: BasicListEvidenceKeyFilter::empty(),
        }
    }

    /// Builds the bundle for a context.
    #[must_use]
    pub fn bundle(ctx: &ExecutionContext) -> Value {
        let mut bundle = Map::new();
        for key in ctx.element_data_keys() {
            if key == Self::DATA_KEY {
                continue;
            }
            if let Ok(data) = ctx.get(&key) {
                bundle.insert(key, Value::Object(element_json(data)));
            }
        }
        Value::Object(bundle)
    }
}

fn element_json(data: &ElementData) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, value) in data.as_dictionary() {
        match value {
            PropertyValue::Present(v) => {
                out.insert(name.clone(), v.clone());
            }
            PropertyValue::Absent { reason } => {
                let reason = FlowError::no_value(reason.clone()).to_string();
                out.insert(name.clone(), Value::Null);
                out.insert(format!("{name}{NULL_REASON_SUFFIX}"), Value::String(reason));
            }
        }
    }
    out
}

impl Stage for JsonBundlerStage {
    fn data_key(&self) -> &str {
        Self::DATA_KEY
    }

    fn properties(&self) -> PropertySchema {
        PropertySchema::new()
            .with_property(PropertyDescriptor::new("json").with_meta("type", "object"))
    }

    fn evidence_key_filter(&self) -> &dyn EvidenceKeyFilter {
        &self.filter
    }

    fn process(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let bundle = Self::bundle(ctx);
        let data = ElementData::new(Self::DATA_KEY).with("json", PropertyValue::present(bundle));
        ctx.set_element_data(data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;
    use crate::testing::StaticStage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_bundles_earlier_results() {
        let device = StaticStage::new("device")
            .with_property(PropertyDescriptor::new("IsMobile"), PropertyValue::json(true))
            .with_property(
                PropertyDescriptor::new("Model"),
                PropertyValue::absent("Unknown device"),
            );
        let pipeline = PipelineBuilder::new()
            .add(Arc::new(device))
            .add(Arc::new(JsonBundlerStage::new()))
            .build()
            .unwrap();
        let mut ctx = pipeline.create_context();

        ctx.run().unwrap();

        let json = ctx.value(JsonBundlerStage::DATA_KEY, "json").unwrap();
        assert_eq!(
            json.value().unwrap(),
            &json!({
                "device": {
                    "ismobile": true,
                    "model": null,
                    "modelnullreason": "Unknown device"
                }
            })
        );
    }

    #[test]
    fn test_absent_without_reason_uses_default_message() {
        let data = ElementData::new("x").with("missing", PropertyValue::no_value());
        let out = element_json(&data);

        assert_eq!(out["missing"], Value::Null);
        assert_eq!(out["missingnullreason"], json!("Property value is not available"));
    }

    #[test]
    fn test_empty_context_bundles_to_empty_object() {
        let pipeline = PipelineBuilder::new()
            .add(Arc::new(JsonBundlerStage::new()))
            .build()
            .unwrap();
        let ctx = pipeline.create_context();

        assert_eq!(JsonBundlerStage::bundle(&ctx), json!({}));
    }
}
