//! Compatibility violation types

use serde::{Deserialize, Serialize};

/// What kind of evolution rule a violation broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    /// Candidate and prior version use different schema formats
    FormatChanged,
    /// Reader type cannot decode the writer type
    TypeChanged,
    /// Field present in the writer is gone from the reader
    FieldRemoved,
    /// Reader demands a field the writer may omit
    RequiredAdded,
    /// Existing optional field became required
    FieldMadeRequired,
    /// Bound, pattern, or similar constraint got tighter
    ConstraintTightened,
    /// Reader no longer covers a writer enum value
    EnumValueRemoved,
    /// No reader union branch accepts a writer branch
    UnionBranchUncovered,
    /// Named types disagree on their fullname
    NameMismatch,
    /// Fixed types disagree on size
    FixedSizeChanged,
    /// Whole message type missing from the reader
    MessageRemoved,
    /// Field changed oneof membership
    OneofChanged,
    /// Field renamed at the same tag (informational)
    FieldRenamed,
}

/// Severity of a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationSeverity {
    /// Breaks decoding; flips the aggregate result
    Breaking,
    /// Noteworthy but tolerated
    Warning,
}

/// A single rule violation found while comparing two schemas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Dotted path to the offending element; empty at the schema root
    pub path: String,
    pub severity: ViolationSeverity,
    pub description: String,
}

impl Violation {
    pub fn breaking(
        kind: ViolationKind,
        path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Violation {
            kind,
            path: path.into(),
            severity: ViolationSeverity::Breaking,
            description: description.into(),
        }
    }

    pub fn warning(
        kind: ViolationKind,
        path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Violation {
            kind,
            path: path.into(),
            severity: ViolationSeverity::Warning,
            description: description.into(),
        }
    }

    pub fn is_breaking(&self) -> bool {
        self.severity == ViolationSeverity::Breaking
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.description)
        } else {
            write!(f, "{} (at '{}')", self.description, self.path)
        }
    }
}

/// Join a parent path and a child segment
pub(crate) fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}
