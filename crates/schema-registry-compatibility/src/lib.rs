//! # Schema Registry Compatibility
//!
//! Format-polymorphic schema evolution checking.
//!
//! The orchestrator in [`checker`] implements the seven levels (`NONE`,
//! `BACKWARD`, `FORWARD`, `FULL`, each with a `_TRANSITIVE` variant); the
//! per-format rules live in [`formats`]. Every check is phrased as "can
//! the reader decode anything the writer may emit", with the orchestrator
//! choosing which schema plays which role.

pub mod checker;
pub mod formats;
pub mod violation;

pub use checker::{CompatibilityChecker, CompatibilityResult, VersionedSchema};
pub use violation::{Violation, ViolationKind, ViolationSeverity};
