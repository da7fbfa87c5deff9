//! # Schema Registry
//!
//! The registry coordinator: the serialization point and transactional
//! brain of the service. It owns id and version allocation, fingerprint
//! deduplication, compatibility gating, the two-phase delete lifecycle,
//! import mode, and context routing, all on top of a pluggable
//! [`schema_registry_storage::SchemaStore`].
//!
//! Transports sit above this crate and map [`RegistryError`] kinds to
//! status codes; nothing here knows about HTTP.

mod locks;
mod references;
pub mod registry;
pub mod settings;
pub mod telemetry;

pub use registry::{ImportOutcome, ImportRequest, Registry, RegistryBuilder};
pub use settings::{RegistrySettings, StorageSettings};

// the vocabulary callers need alongside the coordinator
pub use schema_registry_compatibility::CompatibilityResult;
pub use schema_registry_core::{
    CompatibilityLevel, Config, ErrorKind, Mode, NewSchema, Page, RegistryError, Result, Schema,
    SchemaId, SchemaReference, SchemaType, SubjectVersion, VersionSpec,
};
pub use schema_registry_storage::{InMemoryStore, SchemaStore, SchemaStoreRef};
