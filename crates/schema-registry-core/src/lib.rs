//! # Schema Registry Core
//!
//! Shared vocabulary for the schema registry: record types, the typed
//! error taxonomy, schema formats, compatibility levels, operating modes,
//! context/qualified-subject handling, and pagination helpers.
//!
//! Everything here is transport-agnostic. The coordinator, storage, and
//! compatibility crates all speak in these types.

pub mod context;
pub mod error;
pub mod pagination;
pub mod schema;
pub mod types;

// Re-export commonly used types
pub use context::{QualifiedSubject, DEFAULT_CONTEXT, GLOBAL_CONTEXT};
pub use error::{ErrorKind, RegistryError, Result};
pub use pagination::Page;
pub use schema::{Config, NewSchema, Schema, SchemaReference, SubjectVersion};
pub use types::{CompatibilityLevel, Mode, SchemaId, SchemaType, VersionSpec};
