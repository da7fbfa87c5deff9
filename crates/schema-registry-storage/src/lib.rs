//! # Schema Registry Storage
//!
//! The storage contract the coordinator depends on, plus the in-memory
//! reference implementation. Each trait method is atomic with respect to
//! its arguments; persistent backends must reproduce the semantics the
//! in-memory store exhibits.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use schema_registry_core::{Config, Mode, Result, Schema, SchemaId, SubjectVersion};

pub use memory::InMemoryStore;

/// Scope of a config or mode record: a whole context, or one subject
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub context: String,
    /// `None` addresses the context-global record
    pub subject: Option<String>,
}

impl Scope {
    pub fn global(context: impl Into<String>) -> Self {
        Scope {
            context: context.into(),
            subject: None,
        }
    }

    pub fn subject(context: impl Into<String>, subject: impl Into<String>) -> Self {
        Scope {
            context: context.into(),
            subject: Some(subject.into()),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "{}:{subject}", self.context),
            None => write!(f, "{}:<global>", self.context),
        }
    }
}

/// Atomic operations the registry coordinator requires of a backend
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Fetch a schema by id, soft-deleted rows included.
    ///
    /// # Errors
    /// - `SchemaNotFound` if the id is unknown in the context
    async fn schema_by_id(&self, context: &str, id: SchemaId) -> Result<Schema>;

    /// Fetch a schema row by coordinates, soft-deleted rows included.
    ///
    /// # Errors
    /// - `VersionNotFound` if the coordinate is unoccupied
    async fn schema_by_subject_version(
        &self,
        context: &str,
        subject: &str,
        version: u32,
    ) -> Result<Schema>;

    /// Fingerprint lookup within a subject, in any deleted state
    async fn schema_by_fingerprint(
        &self,
        context: &str,
        subject: &str,
        fingerprint: &str,
    ) -> Result<Option<Schema>>;

    /// Persist a new schema, atomically allocating its id
    /// (context max + 1) and version (subject max + 1, deleted rows
    /// included) at write time.
    ///
    /// The `id`, `version`, and `deleted` fields of `record` are ignored.
    ///
    /// # Errors
    /// - `SchemaExists` if the fingerprint is already present in the
    ///   subject (the coordinator normally dedups first; this guards the
    ///   race)
    async fn append_schema(&self, context: &str, record: Schema) -> Result<Schema>;

    /// Persist a schema under a caller-chosen id and version (import
    /// path). Idempotent when the exact same record is already stored.
    ///
    /// # Errors
    /// - `ImportIdConflict` if the id already holds a different schema
    ///   (other subject, or other fingerprint) anywhere in the context
    /// - `VersionConflict` if (subject, version) is occupied by a
    ///   different schema
    async fn insert_schema_with_id(&self, context: &str, record: Schema) -> Result<Schema>;

    /// Version numbers of a subject, ascending
    async fn list_versions(
        &self,
        context: &str,
        subject: &str,
        include_deleted: bool,
    ) -> Result<Vec<u32>>;

    /// Subject names in a context, sorted
    async fn list_subjects(&self, context: &str, include_deleted: bool) -> Result<Vec<String>>;

    /// Contexts holding at least one live schema, plus the default, sorted
    async fn list_contexts(&self) -> Result<Vec<String>>;

    /// Every (subject, version) coordinate the id is stored under
    async fn subject_versions_by_id(
        &self,
        context: &str,
        id: SchemaId,
        include_deleted: bool,
    ) -> Result<Vec<SubjectVersion>>;

    /// Flip the soft-delete tombstone of one version
    async fn set_deleted(
        &self,
        context: &str,
        subject: &str,
        version: u32,
        deleted: bool,
    ) -> Result<()>;

    /// Remove one version permanently. The two-phase rule (soft delete
    /// first, no inbound references) is enforced by the coordinator.
    async fn remove_version(&self, context: &str, subject: &str, version: u32) -> Result<()>;

    async fn config(&self, scope: &Scope) -> Result<Option<Config>>;

    async fn put_config(&self, scope: &Scope, config: Config) -> Result<()>;

    /// Returns the removed record, if any
    async fn delete_config(&self, scope: &Scope) -> Result<Option<Config>>;

    async fn mode(&self, scope: &Scope) -> Result<Option<Mode>>;

    /// `IMPORT` may only be entered when the scope holds no schema rows,
    /// unless `force` is set; enforced here so it is atomic with the
    /// emptiness check.
    async fn put_mode(&self, scope: &Scope, mode: Mode, force: bool) -> Result<()>;

    async fn delete_mode(&self, scope: &Scope) -> Result<Option<Mode>>;

    /// Coordinates of schemas whose references point at (subject, version)
    async fn referenced_by(
        &self,
        context: &str,
        subject: &str,
        version: u32,
    ) -> Result<Vec<SubjectVersion>>;

    /// Health probe
    async fn is_healthy(&self) -> Result<bool>;
}

/// Type alias for Arc-wrapped store handles
pub type SchemaStoreRef = Arc<dyn SchemaStore>;
