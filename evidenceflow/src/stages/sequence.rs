//! Session and sequence tracking stage.

use crate::context::ExecutionContext;
use crate::core::{ElementData, PropertyDescriptor, PropertySchema, PropertyValue};
use crate::evidence::{BasicListEvidenceKeyFilter, EvidenceKeyFilter};
use crate::stages::Stage;
use serde_json::Value;
use uuid::Uuid;

/// Evidence key carrying the session id.
pub const SESSION_ID_EVIDENCE: &str = "query.session-id";

/// Evidence key carrying the request sequence number.
pub const SEQUENCE_EVIDENCE: &str = "query.sequence";

/// Assigns a session id to new sessions and counts requests within one.
///
/// A request without a session id gets a fresh UUID and sequence 1. A request
/// carrying a session id has its sequence incremented; a missing or
/// unparsable sequence counts as 1. Both values are written back to the
/// evidence and published as `session_id` and `sequence`.
#[derive(Debug)]
pub struct SequenceStage {
    filter: BasicListEvidenceKeyFilter,
}

impl Default for SequenceStage {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceStage {
    /// Identity of the sequence stage.
    pub const DATA_KEY: &'static str = "sequence";

    /// Creates a sequence stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: BasicListEvidenceKeyFilter::new([SESSION_ID_EVIDENCE, SEQUENCE_EVIDENCE]),
        }
    }
}

fn parse_sequence(value: Option<&Value>) -> i64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|&n| n != 0).unwrap_or(1)
}

impl Stage for SequenceStage {
    fn data_key(&self) -> &str {
        Self::DATA_KEY
    }

    fn properties(&self) -> PropertySchema {
        PropertySchema::new()
            .with_property(PropertyDescriptor::new("session_id").with_meta("type", "string"))
            .with_property(PropertyDescriptor::new("sequence").with_meta("type", "int"))
    }

    fn evidence_key_filter(&self) -> &dyn EvidenceKeyFilter {
        &self.filter
    }

    fn process(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let existing = ctx
            .evidence()
            .get_str(SESSION_ID_EVIDENCE)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let (session_id, sequence) = match existing {
            Some(id) => {
                let current = parse_sequence(ctx.evidence().get(SEQUENCE_EVIDENCE));
                (id, current + 1)
            }
            None => (Uuid::new_v4().to_string(), 1),
        };

        tracing::trace!(session_id = %session_id, sequence, "Sequence assigned");

        let evidence = ctx.evidence_mut();
        evidence.set(SESSION_ID_EVIDENCE, session_id.clone());
        evidence.set(SEQUENCE_EVIDENCE, sequence);

        let data = ElementData::new(Self::DATA_KEY)
            .with("session_id", PropertyValue::json(session_id))
            .with("sequence", PropertyValue::json(sequence));
        ctx.set_element_data(data)?;
        Ok(())
    }
}
