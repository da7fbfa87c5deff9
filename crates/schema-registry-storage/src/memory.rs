//! In-memory reference store
//!
//! A single coarse lock over indexed maps: rows by (subject, version),
//! an id index, and a (subject, fingerprint) index per context. This is
//! the executable specification of the semantics persistent backends
//! must preserve.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use schema_registry_core::{
    Config, Mode, RegistryError, Result, Schema, SchemaId, SubjectVersion, DEFAULT_CONTEXT,
};

use crate::{SchemaStore, Scope};

/// Reference implementation of [`SchemaStore`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    contexts: HashMap<String, ContextState>,
    configs: HashMap<Scope, Config>,
    modes: HashMap<Scope, Mode>,
}

#[derive(Debug, Default)]
struct ContextState {
    /// (subject, version) → record
    rows: BTreeMap<(String, u32), Schema>,
    /// id → the coordinate holding it
    by_id: BTreeMap<SchemaId, (String, u32)>,
    /// (subject, fingerprint) → coordinate, soft-deleted rows included
    by_fingerprint: HashMap<(String, String), (String, u32)>,
    /// highest version ever assigned per subject; survives permanent
    /// deletion so version numbers are never reused
    version_high_water: HashMap<String, u32>,
}

impl ContextState {
    fn next_id(&self) -> SchemaId {
        self.by_id.keys().next_back().map_or(1, |max| max + 1)
    }

    fn next_version(&self, subject: &str) -> u32 {
        self.version_high_water
            .get(subject)
            .map_or(1, |high| high + 1)
    }

    fn subject_rows(&self, subject: &str) -> Vec<&Schema> {
        self.rows
            .range((subject.to_string(), 0)..=(subject.to_string(), u32::MAX))
            .map(|(_, row)| row)
            .collect()
    }

    fn row(&self, subject: &str, version: u32) -> Option<&Schema> {
        self.rows.get(&(subject.to_string(), version))
    }

    fn insert_row(&mut self, record: Schema) {
        let coordinate = (record.subject.clone(), record.version);
        self.by_id.insert(record.id, coordinate.clone());
        self.by_fingerprint.insert(
            (record.subject.clone(), record.fingerprint.clone()),
            coordinate.clone(),
        );
        let high = self
            .version_high_water
            .entry(record.subject.clone())
            .or_insert(0);
        *high = (*high).max(record.version);
        self.rows.insert(coordinate, record);
    }

    fn has_rows(&self, subject: Option<&str>) -> bool {
        match subject {
            Some(subject) => !self.subject_rows(subject).is_empty(),
            None => !self.rows.is_empty(),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }
}

#[async_trait]
impl SchemaStore for InMemoryStore {
    async fn schema_by_id(&self, context: &str, id: SchemaId) -> Result<Schema> {
        let state = self.inner.read();
        state
            .contexts
            .get(context)
            .and_then(|ctx| ctx.by_id.get(&id))
            .and_then(|(subject, version)| {
                state
                    .contexts
                    .get(context)
                    .and_then(|ctx| ctx.row(subject, *version))
            })
            .cloned()
            .ok_or_else(|| RegistryError::SchemaNotFound(format!("id {id}")))
    }

    async fn schema_by_subject_version(
        &self,
        context: &str,
        subject: &str,
        version: u32,
    ) -> Result<Schema> {
        self.inner
            .read()
            .contexts
            .get(context)
            .and_then(|ctx| ctx.row(subject, version))
            .cloned()
            .ok_or_else(|| RegistryError::VersionNotFound {
                subject: subject.to_string(),
                version,
            })
    }

    async fn schema_by_fingerprint(
        &self,
        context: &str,
        subject: &str,
        fingerprint: &str,
    ) -> Result<Option<Schema>> {
        let state = self.inner.read();
        Ok(state.contexts.get(context).and_then(|ctx| {
            ctx.by_fingerprint
                .get(&(subject.to_string(), fingerprint.to_string()))
                .and_then(|(subject, version)| ctx.row(subject, *version))
                .cloned()
        }))
    }

    async fn append_schema(&self, context: &str, mut record: Schema) -> Result<Schema> {
        let mut state = self.inner.write();
        let ctx = state.contexts.entry(context.to_string()).or_default();

        let key = (record.subject.clone(), record.fingerprint.clone());
        if let Some((subject, version)) = ctx.by_fingerprint.get(&key) {
            let existing = ctx.row(subject, *version).cloned().ok_or_else(|| {
                RegistryError::Internal("fingerprint index points at a missing row".into())
            })?;
            return Err(RegistryError::SchemaExists {
                subject: existing.subject,
                id: existing.id,
            });
        }

        record.id = ctx.next_id();
        record.version = ctx.next_version(&record.subject);
        record.deleted = false;
        trace!(
            context,
            subject = %record.subject,
            id = record.id,
            version = record.version,
            "append schema"
        );
        ctx.insert_row(record.clone());
        Ok(record)
    }

    async fn insert_schema_with_id(&self, context: &str, mut record: Schema) -> Result<Schema> {
        let mut state = self.inner.write();
        let ctx = state.contexts.entry(context.to_string()).or_default();

        if let Some((subject, version)) = ctx.by_id.get(&record.id) {
            let existing = ctx.row(subject, *version).cloned().ok_or_else(|| {
                RegistryError::Internal("id index points at a missing row".into())
            })?;
            // the id index stores one schema per id: a different subject
            // or a different fingerprint is a different schema
            if existing.subject != record.subject || existing.fingerprint != record.fingerprint {
                return Err(RegistryError::ImportIdConflict(record.id));
            }
            return Ok(existing);
        }

        if let Some(existing) = ctx.row(&record.subject, record.version) {
            if existing.fingerprint == record.fingerprint && existing.id == record.id {
                return Ok(existing.clone());
            }
            return Err(RegistryError::VersionConflict {
                subject: record.subject,
                version: record.version,
            });
        }

        let key = (record.subject.clone(), record.fingerprint.clone());
        if let Some((subject, version)) = ctx.by_fingerprint.get(&key) {
            let existing = ctx.row(subject, *version).cloned().ok_or_else(|| {
                RegistryError::Internal("fingerprint index points at a missing row".into())
            })?;
            return Err(RegistryError::SchemaExists {
                subject: existing.subject,
                id: existing.id,
            });
        }

        record.deleted = false;
        trace!(
            context,
            subject = %record.subject,
            id = record.id,
            version = record.version,
            "insert schema with explicit id"
        );
        ctx.insert_row(record.clone());
        Ok(record)
    }

    async fn list_versions(
        &self,
        context: &str,
        subject: &str,
        include_deleted: bool,
    ) -> Result<Vec<u32>> {
        Ok(self
            .inner
            .read()
            .contexts
            .get(context)
            .map(|ctx| {
                ctx.subject_rows(subject)
                    .into_iter()
                    .filter(|row| include_deleted || !row.deleted)
                    .map(|row| row.version)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_subjects(&self, context: &str, include_deleted: bool) -> Result<Vec<String>> {
        let state = self.inner.read();
        let mut subjects: Vec<String> = state
            .contexts
            .get(context)
            .map(|ctx| {
                let mut names: Vec<String> = ctx
                    .rows
                    .values()
                    .filter(|row| include_deleted || !row.deleted)
                    .map(|row| row.subject.clone())
                    .collect();
                names.dedup();
                names
            })
            .unwrap_or_default();
        subjects.sort();
        subjects.dedup();
        Ok(subjects)
    }

    async fn list_contexts(&self) -> Result<Vec<String>> {
        let state = self.inner.read();
        let mut contexts: Vec<String> = state
            .contexts
            .iter()
            .filter(|(_, ctx)| ctx.rows.values().any(|row| !row.deleted))
            .map(|(name, _)| name.clone())
            .collect();
        if !contexts.iter().any(|c| c == DEFAULT_CONTEXT) {
            contexts.push(DEFAULT_CONTEXT.to_string());
        }
        contexts.sort();
        Ok(contexts)
    }

    async fn subject_versions_by_id(
        &self,
        context: &str,
        id: SchemaId,
        include_deleted: bool,
    ) -> Result<Vec<SubjectVersion>> {
        let state = self.inner.read();
        Ok(state
            .contexts
            .get(context)
            .and_then(|ctx| ctx.by_id.get(&id))
            .and_then(|(subject, version)| {
                state
                    .contexts
                    .get(context)
                    .and_then(|ctx| ctx.row(subject, *version))
            })
            .filter(|row| include_deleted || !row.deleted)
            .map(|row| {
                vec![SubjectVersion {
                    subject: row.subject.clone(),
                    version: row.version,
                }]
            })
            .unwrap_or_default())
    }

    async fn set_deleted(
        &self,
        context: &str,
        subject: &str,
        version: u32,
        deleted: bool,
    ) -> Result<()> {
        let mut state = self.inner.write();
        let row = state
            .contexts
            .get_mut(context)
            .and_then(|ctx| ctx.rows.get_mut(&(subject.to_string(), version)))
            .ok_or_else(|| RegistryError::VersionNotFound {
                subject: subject.to_string(),
                version,
            })?;
        row.deleted = deleted;
        Ok(())
    }

    async fn remove_version(&self, context: &str, subject: &str, version: u32) -> Result<()> {
        let mut state = self.inner.write();
        let ctx = state
            .contexts
            .get_mut(context)
            .ok_or_else(|| RegistryError::SubjectNotFound(subject.to_string()))?;
        let coordinate = (subject.to_string(), version);
        let row = ctx
            .rows
            .remove(&coordinate)
            .ok_or_else(|| RegistryError::VersionNotFound {
                subject: subject.to_string(),
                version,
            })?;
        if ctx.by_id.get(&row.id) == Some(&coordinate) {
            ctx.by_id.remove(&row.id);
        }
        let fp_key = (row.subject.clone(), row.fingerprint.clone());
        if ctx.by_fingerprint.get(&fp_key) == Some(&coordinate) {
            ctx.by_fingerprint.remove(&fp_key);
        }
        Ok(())
    }

    async fn config(&self, scope: &Scope) -> Result<Option<Config>> {
        Ok(self.inner.read().configs.get(scope).cloned())
    }

    async fn put_config(&self, scope: &Scope, config: Config) -> Result<()> {
        self.inner.write().configs.insert(scope.clone(), config);
        Ok(())
    }

    async fn delete_config(&self, scope: &Scope) -> Result<Option<Config>> {
        Ok(self.inner.write().configs.remove(scope))
    }

    async fn mode(&self, scope: &Scope) -> Result<Option<Mode>> {
        Ok(self.inner.read().modes.get(scope).cloned())
    }

    async fn put_mode(&self, scope: &Scope, mode: Mode, force: bool) -> Result<()> {
        let mut state = self.inner.write();
        if mode == Mode::Import && !force {
            let occupied = state
                .contexts
                .get(&scope.context)
                .is_some_and(|ctx| ctx.has_rows(scope.subject.as_deref()));
            if occupied {
                return Err(RegistryError::OperationNotPermitted(format!(
                    "cannot enter IMPORT mode on non-empty scope {scope} without force"
                )));
            }
        }
        state.modes.insert(scope.clone(), mode);
        Ok(())
    }

    async fn delete_mode(&self, scope: &Scope) -> Result<Option<Mode>> {
        Ok(self.inner.write().modes.remove(scope))
    }

    async fn referenced_by(
        &self,
        context: &str,
        subject: &str,
        version: u32,
    ) -> Result<Vec<SubjectVersion>> {
        let state = self.inner.read();
        Ok(state
            .contexts
            .get(context)
            .map(|ctx| {
                ctx.rows
                    .values()
                    .filter(|row| {
                        row.references
                            .iter()
                            .any(|r| r.subject == subject && r.version == version as i32)
                    })
                    .map(|row| SubjectVersion {
                        subject: row.subject.clone(),
                        version: row.version,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn is_healthy(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_registry_core::{schema::fingerprint, SchemaType};

    fn record(subject: &str, text: &str) -> Schema {
        Schema {
            id: 0,
            subject: subject.to_string(),
            version: 0,
            schema_type: SchemaType::Avro,
            schema: text.to_string(),
            references: vec![],
            fingerprint: fingerprint(text),
            deleted: false,
            metadata: None,
            rule_set: None,
        }
    }

    #[tokio::test]
    async fn append_allocates_dense_ids_and_versions() {
        let store = InMemoryStore::new();
        let a = store.append_schema(".", record("s", "\"string\"")).await.unwrap();
        let b = store.append_schema(".", record("s", "\"int\"")).await.unwrap();
        let c = store.append_schema(".", record("t", "\"long\"")).await.unwrap();
        assert_eq!((a.id, a.version), (1, 1));
        assert_eq!((b.id, b.version), (2, 2));
        assert_eq!((c.id, c.version), (3, 1));
    }

    #[tokio::test]
    async fn duplicate_fingerprint_in_subject_is_rejected() {
        let store = InMemoryStore::new();
        store.append_schema(".", record("s", "\"string\"")).await.unwrap();
        let err = store
            .append_schema(".", record("s", "\"string\""))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::SchemaExists { id: 1, .. }));
    }

    #[tokio::test]
    async fn import_id_rules() {
        let store = InMemoryStore::new();
        let mut imported = record("user-value", "\"string\"");
        imported.id = 42;
        imported.version = 1;
        let stored = store.insert_schema_with_id(".", imported.clone()).await.unwrap();
        assert_eq!(stored.id, 42);

        // same id, same subject, same fingerprint: idempotent
        let again = store.insert_schema_with_id(".", imported.clone()).await.unwrap();
        assert_eq!(again.version, 1);

        // same id under another subject is a different schema
        let mut other = record("order-value", "\"string\"");
        other.id = 42;
        other.version = 1;
        let err = store.insert_schema_with_id(".", other).await.unwrap_err();
        assert!(matches!(err, RegistryError::ImportIdConflict(42)));

        // occupied coordinate with a different schema
        let mut clash = record("user-value", "\"int\"");
        clash.id = 43;
        clash.version = 1;
        let err = store.insert_schema_with_id(".", clash).await.unwrap_err();
        assert!(matches!(err, RegistryError::VersionConflict { .. }));

        // allocation continues past the imported id
        let appended = store.append_schema(".", record("user-value", "\"long\"")).await.unwrap();
        assert_eq!(appended.id, 43);
        assert_eq!(appended.version, 2);
    }

    #[tokio::test]
    async fn soft_delete_keeps_fingerprint_lookup() {
        let store = InMemoryStore::new();
        let stored = store.append_schema(".", record("s", "\"string\"")).await.unwrap();
        store.set_deleted(".", "s", 1, true).await.unwrap();

        let found = store
            .schema_by_fingerprint(".", "s", &stored.fingerprint)
            .await
            .unwrap()
            .unwrap();
        assert!(found.deleted);
        assert_eq!(found.id, stored.id);

        assert_eq!(store.list_versions(".", "s", false).await.unwrap(), Vec::<u32>::new());
        assert_eq!(store.list_versions(".", "s", true).await.unwrap(), vec![1]);
        assert!(store.list_subjects(".", false).await.unwrap().is_empty());
        assert_eq!(store.list_subjects(".", true).await.unwrap(), vec!["s"]);
    }

    #[tokio::test]
    async fn remove_version_clears_indexes_but_not_numbering() {
        let store = InMemoryStore::new();
        let first = store.append_schema(".", record("s", "\"string\"")).await.unwrap();
        store.append_schema(".", record("s", "\"int\"")).await.unwrap();
        store.remove_version(".", "s", 1).await.unwrap();

        assert!(store.schema_by_id(".", first.id).await.is_err());
        assert!(store
            .schema_by_fingerprint(".", "s", &first.fingerprint)
            .await
            .unwrap()
            .is_none());
        // version numbers are never reused
        let third = store.append_schema(".", record("s", "\"long\"")).await.unwrap();
        assert_eq!(third.version, 3);
    }

    #[tokio::test]
    async fn contexts_isolate_everything() {
        let store = InMemoryStore::new();
        let a = store.append_schema(".", record("s", "\"string\"")).await.unwrap();
        let b = store.append_schema(".prod", record("s", "\"string\"")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 1);
        assert!(store.schema_by_id(".stage", 1).await.is_err());
        assert_eq!(
            store.list_contexts().await.unwrap(),
            vec![".".to_string(), ".prod".to_string()]
        );
    }

    #[tokio::test]
    async fn import_mode_needs_empty_scope_or_force() {
        let store = InMemoryStore::new();
        store.append_schema(".", record("s", "\"string\"")).await.unwrap();

        let global = Scope::global(".");
        let err = store.put_mode(&global, Mode::Import, false).await.unwrap_err();
        assert!(matches!(err, RegistryError::OperationNotPermitted(_)));
        store.put_mode(&global, Mode::Import, true).await.unwrap();
        assert_eq!(store.mode(&global).await.unwrap(), Some(Mode::Import));

        // an empty subject scope admits IMPORT without force
        let empty = Scope::subject(".", "fresh");
        store.put_mode(&empty, Mode::Import, false).await.unwrap();
    }

    #[tokio::test]
    async fn referenced_by_scans_references() {
        let store = InMemoryStore::new();
        store.append_schema(".", record("base", "\"string\"")).await.unwrap();
        let mut referencing = record("top", "\"int\"");
        referencing.references = vec![schema_registry_core::SchemaReference {
            name: "base".into(),
            subject: "base".into(),
            version: 1,
        }];
        store.append_schema(".", referencing).await.unwrap();

        let referrers = store.referenced_by(".", "base", 1).await.unwrap();
        assert_eq!(
            referrers,
            vec![SubjectVersion {
                subject: "top".into(),
                version: 1
            }]
        );
        assert!(store.referenced_by(".", "base", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn config_and_mode_round_trip() {
        let store = InMemoryStore::new();
        let scope = Scope::subject(".", "s");
        assert_eq!(store.config(&scope).await.unwrap(), None);
        store
            .put_config(&scope, Config::with_level(Default::default()))
            .await
            .unwrap();
        assert!(store.config(&scope).await.unwrap().is_some());
        assert!(store.delete_config(&scope).await.unwrap().is_some());
        assert_eq!(store.config(&scope).await.unwrap(), None);
    }
}
