//! Mode-aware compatibility orchestrator
//!
//! Selects which prior versions to check and in which reader/writer
//! direction, delegates to the per-format checkers, and aggregates their
//! violations into a single result with direction-prefixed messages.

use schema_registry_core::CompatibilityLevel;
use schema_registry_parsers::ParsedSchema;
use tracing::debug;

use crate::formats;
use crate::violation::{Violation, ViolationKind};

/// A prior version of the subject, oldest first
#[derive(Debug, Clone)]
pub struct VersionedSchema {
    pub version: u32,
    pub parsed: ParsedSchema,
}

/// Aggregate outcome of a compatibility check
#[derive(Debug, Clone)]
pub struct CompatibilityResult {
    pub is_compatible: bool,
    pub messages: Vec<String>,
}

impl CompatibilityResult {
    pub fn compatible() -> Self {
        CompatibilityResult {
            is_compatible: true,
            messages: Vec::new(),
        }
    }
}

/// Format-polymorphic compatibility checker
#[derive(Debug, Default, Clone, Copy)]
pub struct CompatibilityChecker;

impl CompatibilityChecker {
    pub fn new() -> Self {
        CompatibilityChecker
    }

    /// Check `candidate` against `existing` (ordered oldest to newest)
    /// under `level`.
    pub fn check(
        &self,
        level: CompatibilityLevel,
        candidate: &ParsedSchema,
        existing: &[VersionedSchema],
    ) -> CompatibilityResult {
        if level == CompatibilityLevel::None || existing.is_empty() {
            return CompatibilityResult::compatible();
        }

        let to_check: &[VersionedSchema] = if level.is_transitive() {
            existing
        } else {
            &existing[existing.len() - 1..]
        };

        let mut messages = Vec::new();
        for prior in to_check {
            if level.checks_backward() {
                collect(
                    "BACKWARD",
                    prior.version,
                    can_read(candidate, &prior.parsed),
                    &mut messages,
                );
            }
            if level.checks_forward() {
                collect(
                    "FORWARD",
                    prior.version,
                    can_read(&prior.parsed, candidate),
                    &mut messages,
                );
            }
        }

        debug!(
            level = %level,
            checked = to_check.len(),
            incompatibilities = messages.len(),
            "compatibility check finished"
        );
        CompatibilityResult {
            is_compatible: messages.is_empty(),
            messages,
        }
    }
}

fn collect(direction: &str, version: u32, violations: Vec<Violation>, messages: &mut Vec<String>) {
    messages.extend(
        violations
            .iter()
            .filter(|v| v.is_breaking())
            .map(|v| format!("{direction} incompatibility with version {version}: {v}")),
    );
}

/// Can `reader` decode every document `writer` may produce?
fn can_read(reader: &ParsedSchema, writer: &ParsedSchema) -> Vec<Violation> {
    match (reader, writer) {
        (ParsedSchema::Avro(r), ParsedSchema::Avro(w)) => formats::avro::can_read(r, w),
        (ParsedSchema::Json(r), ParsedSchema::Json(w)) => formats::json_schema::can_read(r, w),
        (ParsedSchema::Protobuf(r), ParsedSchema::Protobuf(w)) => {
            formats::protobuf::can_read(r, w)
        }
        (reader, writer) => vec![Violation::breaking(
            ViolationKind::FormatChanged,
            "",
            format!(
                "schema type changed from {} to {}",
                writer.schema_type(),
                reader.schema_type()
            ),
        )],
    }
}
