//! Response header aggregation over a processed context.

use super::naming::{is_set_header_property, response_header_name};
use crate::context::ExecutionContext;
use crate::errors::FlowError;
use crate::pipeline::Pipeline;
use std::collections::BTreeMap;

/// Values that mean "no usable header value".
const SENTINELS: [&str; 2] = ["Unknown", "noValue"];

/// Header-contributing property names grouped by stage identity, in
/// registration order then declaration order.
pub type HeaderProperties = Vec<(String, Vec<String>)>;

/// Collects every header-contributing property across the pipeline's stages.
///
/// Stages without such properties are left out.
#[must_use]
pub fn header_properties(pipeline: &Pipeline) -> HeaderProperties {
    pipeline
        .stages()
        .iter()
        .filter_map(|stage| {
            let names: Vec<String> = stage
                .properties()
                .iter()
                .filter(|p| is_set_header_property(&p.name))
                .map(|p| p.name.clone())
                .collect();
            (!names.is_empty()).then(|| (stage.data_key().to_string(), names))
        })
        .collect()
}

/// Returns the header contribution of one stage property.
///
/// The result is empty when the stage produced nothing, the property is
/// missing or absent, or the value is `"Unknown"` or `"noValue"`.
#[must_use]
pub fn property_value(ctx: &ExecutionContext, stage: &str, property: &str) -> String {
    let Ok(value) = ctx.value(stage, property) else {
        return String::new();
    };
    match value.as_option() {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) if SENTINELS.contains(&s.as_str()) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Builds the response header map from header-contributing properties.
#[derive(Debug, Clone, Default)]
pub struct HeaderSynthesizer {
    sources: HeaderProperties,
}

impl HeaderSynthesizer {
    /// Creates a synthesizer over an explicit property list.
    #[must_use]
    pub fn new(sources: HeaderProperties) -> Self {
        Self { sources }
    }

    /// Creates a synthesizer over every header property in the pipeline.
    #[must_use]
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        Self::new(header_properties(pipeline))
    }

    /// Returns the scanned properties.
    #[must_use]
    pub fn sources(&self) -> &HeaderProperties {
        &self.sources
    }

    /// Aggregates header values from the context.
    ///
    /// Contributions to the same header are joined with `,` in scan order and
    /// empty contributions are skipped. A header whose contributions are all
    /// empty maps to `""`. The returned headers are ordered by name, which is
    /// also the key order of the `serde_json` object `SetHeaderStage` writes.
    ///
    /// # Errors
    ///
    /// Returns the name derivation error of the first malformed property.
    pub fn synthesize(&self, ctx: &ExecutionContext) -> Result<BTreeMap<String, String>, FlowError> {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();

        for (stage, properties) in &self.sources {
            for property in properties {
                let header = response_header_name(property)?;
                let value = property_value(ctx, stage, property);

                let aggregate = headers.entry(header).or_default();
                if aggregate.is_empty() {
                    *aggregate = value;
                } else if !value.is_empty() {
                    aggregate.push(',');
                    aggregate.push_str(&value);
                }
            }
        }

        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PropertyDescriptor, PropertyValue};
    use crate::pipeline::PipelineBuilder;
    use crate::stages::Stage;
    use crate::testing::StaticStage;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn header_stage(key: &str, values: &[(&str, PropertyValue)]) -> Arc<dyn Stage> {
        let stage = values.iter().fold(StaticStage::new(key), |stage, (name, value)| {
            stage.with_property(PropertyDescriptor::new(*name), value.clone())
        });
        Arc::new(stage)
    }

    fn run(stages: Vec<Arc<dyn Stage>>) -> (HeaderSynthesizer, ExecutionContext) {
        let pipeline = PipelineBuilder::new().add_all(stages).build().unwrap();
        let mut ctx = pipeline.create_context();
        ctx.run().unwrap();
        (HeaderSynthesizer::from_pipeline(&pipeline), ctx)
    }

    #[test]
    fn test_header_properties_grouped_by_stage() {
        let pipeline = PipelineBuilder::new()
            .add(header_stage(
                "device",
                &[
                    ("SetHeaderBrowserAcceptCH", PropertyValue::json("a")),
                    ("BrowserName", PropertyValue::json("x")),
                ],
            ))
            .add(header_stage("plain", &[("Name", PropertyValue::json("y"))]))
            .add(header_stage(
                "hardware",
                &[("SetHeaderHardwareAcceptCH", PropertyValue::json("b"))],
            ))
            .build()
            .unwrap();

        assert_eq!(
            header_properties(&pipeline),
            vec![
                ("device".to_string(), vec!["SetHeaderBrowserAcceptCH".to_string()]),
                ("hardware".to_string(), vec!["SetHeaderHardwareAcceptCH".to_string()]),
            ]
        );
    }

    #[test]
    fn test_contributions_are_joined() {
        let (synth, ctx) = run(vec![header_stage(
            "device",
            &[
                ("SetHeaderBrowserAcceptCH", PropertyValue::json("Sec-CH-UA")),
                ("SetHeaderPlatformAcceptCH", PropertyValue::json("Sec-CH-UA-Platform")),
            ],
        )]);

        let headers = synth.synthesize(&ctx).unwrap();

        assert_eq!(headers["AcceptCH"], "Sec-CH-UA,Sec-CH-UA-Platform");
    }

    #[test]
    fn test_contributions_from_two_stages_follow_registration_order() {
        let (synth, ctx) = run(vec![
            header_stage("first", &[("SetHeaderBrowserAcceptCH", PropertyValue::json("x"))]),
            header_stage("second", &[("SetHeaderHardwareAcceptCH", PropertyValue::json("y"))]),
        ]);

        assert_eq!(synth.synthesize(&ctx).unwrap()["AcceptCH"], "x,y");
    }

    #[test]
    fn test_unknown_from_first_stage_leaves_no_leading_comma() {
        let (synth, ctx) = run(vec![
            header_stage(
                "first",
                &[("SetHeaderBrowserAcceptCH", PropertyValue::json("Unknown"))],
            ),
            header_stage("second", &[("SetHeaderHardwareAcceptCH", PropertyValue::json("y"))]),
        ]);

        assert_eq!(synth.synthesize(&ctx).unwrap()["AcceptCH"], "y");
    }

    #[test]
    fn test_headers_are_ordered_by_name() {
        let (synth, ctx) = run(vec![header_stage(
            "device",
            &[
                ("SetHeaderBrowserViewportWidth", PropertyValue::json("1")),
                ("SetHeaderBrowserAcceptCH", PropertyValue::json("2")),
                ("SetHeaderBrowserCriticalCH", PropertyValue::json("3")),
            ],
        )]);

        let headers = synth.synthesize(&ctx).unwrap();

        assert_eq!(
            headers.keys().collect::<Vec<_>>(),
            vec!["AcceptCH", "CriticalCH", "ViewportWidth"]
        );
    }

    #[test]
    fn test_empty_contributions_leave_no_stray_commas() {
        let (synth, ctx) = run(vec![header_stage(
            "device",
            &[
                ("SetHeaderBrowserAcceptCH", PropertyValue::json("Unknown")),
                ("SetHeaderHardwareAcceptCH", PropertyValue::json("a")),
                ("SetHeaderPlatformAcceptCH", PropertyValue::absent("not found")),
                ("SetHeaderDeviceAcceptCH", PropertyValue::json("noValue")),
                ("SetHeaderOtherAcceptCH", PropertyValue::json("b")),
            ],
        )]);

        let headers = synth.synthesize(&ctx).unwrap();

        assert_eq!(headers["AcceptCH"], "a,b");
    }

    #[test]
    fn test_header_with_only_empty_values_is_kept() {
        let (synth, ctx) = run(vec![header_stage(
            "device",
            &[
                ("SetHeaderBrowserAcceptCH", PropertyValue::json("Unknown")),
                ("SetHeaderBrowserCriticalCH", PropertyValue::json("x")),
            ],
        )]);

        let headers = synth.synthesize(&ctx).unwrap();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers["AcceptCH"], "");
        assert_eq!(headers["CriticalCH"], "x");
    }

    #[test]
    fn test_missing_stage_data_contributes_nothing() {
        let pipeline = PipelineBuilder::new()
            .add(header_stage(
                "device",
                &[("SetHeaderBrowserAcceptCH", PropertyValue::json("a"))],
            ))
            .build()
            .unwrap();
        let ctx = pipeline.create_context();

        let headers = HeaderSynthesizer::from_pipeline(&pipeline)
            .synthesize(&ctx)
            .unwrap();

        assert_eq!(headers["AcceptCH"], "");
    }

    #[test]
    fn test_non_string_values_render_as_json() {
        let (synth, ctx) = run(vec![header_stage(
            "device",
            &[("SetHeaderBrowserMaxAge", PropertyValue::json(600))],
        )]);

        assert_eq!(property_value(&ctx, "device", "SetHeaderBrowserMaxAge"), "600");
        assert_eq!(synth.synthesize(&ctx).unwrap()["MaxAge"], "600");
    }

    #[test]
    fn test_malformed_property_fails() {
        let (synth, ctx) = run(vec![header_stage(
            "device",
            &[("setheaderbrowseracceptch", PropertyValue::json("a"))],
        )]);

        assert!(matches!(
            synth.synthesize(&ctx),
            Err(FlowError::NotSetHeaderProperty { .. })
        ));
    }
}
