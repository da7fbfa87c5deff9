//! The registry coordinator
//!
//! Serialization point for every mutation: one keyed mutex per
//! (context, subject) covers each read-validate-write window, a
//! registry-wide mutex covers context-global writes, and id/version
//! allocation happens atomically inside the store so concurrent subjects
//! compose. Reads never take locks.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use schema_registry_compatibility::{CompatibilityChecker, CompatibilityResult, VersionedSchema};
use schema_registry_core::{
    context, Config, Mode, NewSchema, Page, QualifiedSubject, RegistryError, Result, Schema,
    SchemaId, SubjectVersion, VersionSpec,
};
use schema_registry_parsers::ParsedSchema;
use schema_registry_storage::{InMemoryStore, SchemaStoreRef, Scope};

use crate::locks::LockMap;
use crate::references::ReferenceResolver;
use crate::settings::RegistrySettings;

/// One entry of an [`Registry::import_schemas`] batch
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub subject: String,
    pub id: SchemaId,
    pub version: u32,
    pub schema: NewSchema,
}

/// Per-entry outcome of an import batch
#[derive(Debug)]
pub struct ImportOutcome {
    pub subject: String,
    pub id: SchemaId,
    pub version: u32,
    pub result: Result<Schema>,
}

/// Builder for [`Registry`]
#[derive(Default)]
pub struct RegistryBuilder {
    store: Option<SchemaStoreRef>,
    settings: RegistrySettings,
}

impl RegistryBuilder {
    pub fn store(mut self, store: SchemaStoreRef) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(mut self, settings: RegistrySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryStore::new())),
            checker: CompatibilityChecker::new(),
            locks: LockMap::new(),
            global_lock: Mutex::new(()),
            settings: self.settings,
        }
    }
}

/// The transactional brain of the schema registry
pub struct Registry {
    store: SchemaStoreRef,
    checker: CompatibilityChecker,
    locks: LockMap,
    global_lock: Mutex<()>,
    settings: RegistrySettings,
}

impl Registry {
    /// Registry over the given store with default settings
    pub fn new(store: SchemaStoreRef) -> Self {
        Registry::builder().store(store).build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn store(&self) -> &SchemaStoreRef {
        &self.store
    }

    // ---- registration -------------------------------------------------

    /// Register a schema under a subject.
    ///
    /// If a schema with the same fingerprint already exists in the subject
    /// (in any deleted state) its record is returned unchanged. Otherwise
    /// the candidate is checked against all live versions under the
    /// effective compatibility level and, on success, persisted with a
    /// freshly allocated id and version.
    #[instrument(skip(self, new, normalize))]
    pub async fn register_schema(
        &self,
        request_context: &str,
        subject: &str,
        new: NewSchema,
        normalize: Option<bool>,
    ) -> Result<Schema> {
        let q = self.resolve_aliased(request_context, subject).await?;
        context::ensure_writable_context(&q.context)?;
        self.ensure_writes_admitted(&q).await?;

        let _guard = self.locks.acquire(&q.context, &q.subject).await;

        let resolver = ReferenceResolver::new(self.store.as_ref(), &q.context);
        let resolved_refs = resolver.resolve(&new.references).await?;
        let parsed = ParsedSchema::parse(new.schema_type, &new.schema, &resolved_refs)?;
        let fingerprint = parsed.fingerprint();

        if let Some(existing) = self
            .store
            .schema_by_fingerprint(&q.context, &q.subject, &fingerprint)
            .await?
        {
            debug!(id = existing.id, version = existing.version, "dedup hit");
            return Ok(existing);
        }

        let level = self.effective_level(&q).await?;
        let existing = self.load_live_parsed(&q).await?;
        let compat = self.checker.check(level, &parsed, &existing);
        if !compat.is_compatible {
            return Err(RegistryError::Incompatible {
                messages: compat.messages,
            });
        }

        let normalize = self.effective_normalize(&q, normalize).await?;
        let text = if normalize {
            parsed.canonical().to_string()
        } else {
            new.schema
        };

        let record = Schema {
            id: 0,
            subject: q.subject.clone(),
            version: 0,
            schema_type: new.schema_type,
            schema: text,
            references: new.references,
            fingerprint: fingerprint.clone(),
            deleted: false,
            metadata: new.metadata,
            rule_set: new.rule_set,
        };
        match self.store.append_schema(&q.context, record).await {
            Ok(stored) => {
                info!(
                    context = %q.context,
                    subject = %q.subject,
                    id = stored.id,
                    version = stored.version,
                    "registered schema"
                );
                Ok(stored)
            }
            // the per-subject lock makes this unreachable for well-behaved
            // stores, but an equal fingerprint is still a success
            Err(RegistryError::SchemaExists { .. }) => self
                .store
                .schema_by_fingerprint(&q.context, &q.subject, &fingerprint)
                .await?
                .ok_or_else(|| {
                    RegistryError::Internal("schema vanished during registration".into())
                }),
            Err(e) => Err(e),
        }
    }

    /// Register a schema with a caller-chosen id and version.
    ///
    /// Admitted only under `IMPORT` mode; never compatibility-checked.
    #[instrument(skip(self, new))]
    pub async fn register_schema_with_id(
        &self,
        request_context: &str,
        subject: &str,
        new: NewSchema,
        id: SchemaId,
        version: u32,
    ) -> Result<Schema> {
        let q = self.resolve_aliased(request_context, subject).await?;
        context::ensure_writable_context(&q.context)?;

        if id < 1 {
            return Err(RegistryError::invalid_schema(format!(
                "schema id {id} must be positive"
            )));
        }
        if version < 1 || version > VersionSpec::MAX_VERSION {
            return Err(RegistryError::InvalidVersion(version.to_string()));
        }
        let mode = self.effective_mode(&q.context, Some(&q.subject)).await?;
        if !mode.allows_import() {
            return Err(RegistryError::OperationNotPermitted(format!(
                "subject '{}' is in {mode} mode; id-preserving registration requires IMPORT",
                q.subject
            )));
        }

        let _guard = self.locks.acquire(&q.context, &q.subject).await;

        let resolver = ReferenceResolver::new(self.store.as_ref(), &q.context);
        let resolved_refs = resolver.resolve(&new.references).await?;
        let parsed = ParsedSchema::parse(new.schema_type, &new.schema, &resolved_refs)?;

        let record = Schema {
            id,
            subject: q.subject.clone(),
            version,
            schema_type: new.schema_type,
            schema: new.schema,
            references: new.references,
            fingerprint: parsed.fingerprint(),
            deleted: false,
            metadata: new.metadata,
            rule_set: new.rule_set,
        };
        let stored = self.store.insert_schema_with_id(&q.context, record).await?;
        info!(
            context = %q.context,
            subject = %q.subject,
            id = stored.id,
            version = stored.version,
            "imported schema"
        );
        Ok(stored)
    }

    /// Bulk id-preserving import; per-item results, no compatibility
    /// checks. Requires `IMPORT` mode at the context-global scope.
    pub async fn import_schemas(
        &self,
        request_context: &str,
        requests: Vec<ImportRequest>,
    ) -> Result<Vec<ImportOutcome>> {
        context::validate_context(request_context)?;
        let global = self
            .store
            .mode(&Scope::global(request_context))
            .await?
            .unwrap_or_default();
        if !global.allows_import() {
            return Err(RegistryError::OperationNotPermitted(format!(
                "context '{request_context}' is in {global} mode; bulk import requires IMPORT"
            )));
        }

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let result = self
                .register_schema_with_id(
                    request_context,
                    &request.subject,
                    request.schema.clone(),
                    request.id,
                    request.version,
                )
                .await;
            outcomes.push(ImportOutcome {
                subject: request.subject,
                id: request.id,
                version: request.version,
                result,
            });
        }
        Ok(outcomes)
    }

    // ---- reads --------------------------------------------------------

    /// Fingerprint-based search for a schema within a subject.
    ///
    /// Deduplication keys on the parsing canonical form, so the
    /// `normalize` flag accepted on the wire cannot change the result;
    /// it is part of the signature for interface compatibility.
    pub async fn lookup_schema(
        &self,
        request_context: &str,
        subject: &str,
        new: &NewSchema,
        include_deleted: bool,
        _normalize: Option<bool>,
    ) -> Result<Schema> {
        let q = self.resolve_aliased(request_context, subject).await?;

        let all = self.store.list_versions(&q.context, &q.subject, true).await?;
        if all.is_empty() {
            return Err(RegistryError::SubjectNotFound(q.subject));
        }

        let resolver = ReferenceResolver::new(self.store.as_ref(), &q.context);
        let resolved_refs = resolver.resolve(&new.references).await?;
        let parsed = ParsedSchema::parse(new.schema_type, &new.schema, &resolved_refs)?;

        match self
            .store
            .schema_by_fingerprint(&q.context, &q.subject, &parsed.fingerprint())
            .await?
        {
            Some(row) if !row.deleted || include_deleted => Ok(row),
            _ => Err(RegistryError::SchemaNotFound(format!(
                "no matching schema in subject '{}'",
                q.subject
            ))),
        }
    }

    pub async fn schema_by_id(&self, request_context: &str, id: SchemaId) -> Result<Schema> {
        context::validate_context(request_context)?;
        self.store.schema_by_id(request_context, id).await
    }

    /// Fetch by (subject, version spec).
    ///
    /// `latest` means the highest live version; with `include_deleted`
    /// set and no live version left, the highest version overall.
    pub async fn schema_by_subject_version(
        &self,
        request_context: &str,
        subject: &str,
        spec: VersionSpec,
        include_deleted: bool,
    ) -> Result<Schema> {
        let q = self.resolve_aliased(request_context, subject).await?;
        let all = self.store.list_versions(&q.context, &q.subject, true).await?;
        if all.is_empty() {
            return Err(RegistryError::SubjectNotFound(q.subject));
        }

        let version = match spec {
            VersionSpec::Version(version) => version,
            VersionSpec::Latest => {
                let live = self.store.list_versions(&q.context, &q.subject, false).await?;
                match (live.last(), all.last(), include_deleted) {
                    (Some(latest), _, _) => *latest,
                    (None, Some(highest), true) => *highest,
                    _ => return Err(RegistryError::SubjectNotFound(q.subject)),
                }
            }
        };

        let row = self
            .store
            .schema_by_subject_version(&q.context, &q.subject, version)
            .await?;
        if row.deleted && !include_deleted {
            return Err(RegistryError::VersionNotFound {
                subject: q.subject,
                version,
            });
        }
        Ok(row)
    }

    pub async fn list_subjects(
        &self,
        request_context: &str,
        include_deleted: bool,
        page: Page,
    ) -> Result<Vec<String>> {
        context::validate_context(request_context)?;
        let subjects = self
            .store
            .list_subjects(request_context, include_deleted)
            .await?;
        Ok(page.apply(subjects))
    }

    pub async fn versions(
        &self,
        request_context: &str,
        subject: &str,
        include_deleted: bool,
    ) -> Result<Vec<u32>> {
        let q = self.resolve_aliased(request_context, subject).await?;
        let versions = self
            .store
            .list_versions(&q.context, &q.subject, include_deleted)
            .await?;
        if versions.is_empty() {
            return Err(RegistryError::SubjectNotFound(q.subject));
        }
        Ok(versions)
    }

    /// Subjects an id is registered under
    pub async fn subjects_by_schema_id(
        &self,
        request_context: &str,
        id: SchemaId,
        include_deleted: bool,
    ) -> Result<Vec<String>> {
        let coordinates = self
            .versions_by_schema_id(request_context, id, include_deleted)
            .await?;
        let mut subjects: Vec<String> = coordinates.into_iter().map(|c| c.subject).collect();
        subjects.sort();
        subjects.dedup();
        Ok(subjects)
    }

    /// (subject, version) coordinates an id is registered under
    pub async fn versions_by_schema_id(
        &self,
        request_context: &str,
        id: SchemaId,
        include_deleted: bool,
    ) -> Result<Vec<SubjectVersion>> {
        context::validate_context(request_context)?;
        let coordinates = self
            .store
            .subject_versions_by_id(request_context, id, include_deleted)
            .await?;
        if coordinates.is_empty() {
            return Err(RegistryError::SchemaNotFound(format!("id {id}")));
        }
        Ok(coordinates)
    }

    /// Filtered, paginated dump of schema records
    pub async fn list_schemas(
        &self,
        request_context: &str,
        subject_prefix: Option<&str>,
        latest_only: bool,
        include_deleted: bool,
        page: Page,
    ) -> Result<Vec<Schema>> {
        context::validate_context(request_context)?;
        let subjects = self
            .store
            .list_subjects(request_context, include_deleted)
            .await?;

        let mut rows = Vec::new();
        for subject in subjects {
            if let Some(prefix) = subject_prefix {
                if !subject.starts_with(prefix) {
                    continue;
                }
            }
            let mut versions = self
                .store
                .list_versions(request_context, &subject, include_deleted)
                .await?;
            if latest_only {
                versions = versions.split_off(versions.len().saturating_sub(1));
            }
            for version in versions {
                rows.push(
                    self.store
                        .schema_by_subject_version(request_context, &subject, version)
                        .await?,
                );
            }
        }
        Ok(page.apply(rows))
    }

    pub async fn list_contexts(&self) -> Result<Vec<String>> {
        self.store.list_contexts().await
    }

    pub async fn is_healthy(&self) -> Result<bool> {
        self.store.is_healthy().await
    }

    // ---- deletion -----------------------------------------------------

    /// Delete one version: soft (tombstone) or permanent (row removal).
    ///
    /// Permanent deletion requires the version to be soft-deleted already
    /// and refuses while other schemas reference it.
    #[instrument(skip(self))]
    pub async fn delete_version(
        &self,
        request_context: &str,
        subject: &str,
        spec: VersionSpec,
        permanent: bool,
    ) -> Result<u32> {
        let q = self.resolve_aliased(request_context, subject).await?;
        context::ensure_writable_context(&q.context)?;
        self.ensure_writes_admitted(&q).await?;

        let _guard = self.locks.acquire(&q.context, &q.subject).await;

        let all = self.store.list_versions(&q.context, &q.subject, true).await?;
        if all.is_empty() {
            return Err(RegistryError::SubjectNotFound(q.subject));
        }
        let version = match spec {
            VersionSpec::Version(version) => {
                if !all.contains(&version) {
                    return Err(RegistryError::VersionNotFound {
                        subject: q.subject,
                        version,
                    });
                }
                version
            }
            VersionSpec::Latest => {
                let live = self.store.list_versions(&q.context, &q.subject, false).await?;
                match (live.last(), all.last(), permanent) {
                    (Some(latest), _, _) => *latest,
                    (None, Some(highest), true) => *highest,
                    _ => return Err(RegistryError::SubjectNotFound(q.subject)),
                }
            }
        };

        let row = self
            .store
            .schema_by_subject_version(&q.context, &q.subject, version)
            .await?;

        if permanent {
            if !row.deleted {
                return Err(RegistryError::VersionNotSoftDeleted {
                    subject: q.subject,
                    version,
                });
            }
            self.ensure_unreferenced(&q, version).await?;
            self.store
                .remove_version(&q.context, &q.subject, version)
                .await?;
        } else {
            if row.deleted {
                return Err(RegistryError::VersionNotFound {
                    subject: q.subject,
                    version,
                });
            }
            self.store
                .set_deleted(&q.context, &q.subject, version, true)
                .await?;
        }
        info!(
            context = %q.context,
            subject = %q.subject,
            version,
            permanent,
            "deleted version"
        );
        Ok(version)
    }

    /// Delete a whole subject, two-phase like version deletion.
    /// Returns the affected version numbers in order.
    #[instrument(skip(self))]
    pub async fn delete_subject(
        &self,
        request_context: &str,
        subject: &str,
        permanent: bool,
    ) -> Result<Vec<u32>> {
        let q = self.resolve_aliased(request_context, subject).await?;
        context::ensure_writable_context(&q.context)?;
        self.ensure_writes_admitted(&q).await?;

        let _guard = self.locks.acquire(&q.context, &q.subject).await;

        let all = self.store.list_versions(&q.context, &q.subject, true).await?;
        if all.is_empty() {
            return Err(RegistryError::SubjectNotFound(q.subject));
        }
        let live = self.store.list_versions(&q.context, &q.subject, false).await?;

        if permanent {
            if !live.is_empty() {
                return Err(RegistryError::SubjectNotSoftDeleted(q.subject));
            }
            for version in &all {
                self.ensure_unreferenced(&q, *version).await?;
            }
            for version in &all {
                self.store
                    .remove_version(&q.context, &q.subject, *version)
                    .await?;
            }
            info!(context = %q.context, subject = %q.subject, "permanently deleted subject");
            Ok(all)
        } else {
            if live.is_empty() {
                return Err(RegistryError::SubjectDeleted(q.subject));
            }
            for version in &live {
                self.store
                    .set_deleted(&q.context, &q.subject, *version, true)
                    .await?;
            }
            info!(context = %q.context, subject = %q.subject, "soft-deleted subject");
            Ok(live)
        }
    }

    // ---- compatibility ------------------------------------------------

    /// Read-only compatibility check; registers nothing.
    ///
    /// `against` selects a single prior version; `None` checks per the
    /// effective level (latest, or all for transitive levels). Messages
    /// are included only when `verbose` is set.
    pub async fn check_compatibility(
        &self,
        request_context: &str,
        subject: &str,
        new: &NewSchema,
        against: Option<VersionSpec>,
        verbose: bool,
    ) -> Result<CompatibilityResult> {
        let q = self.resolve_aliased(request_context, subject).await?;

        let resolver = ReferenceResolver::new(self.store.as_ref(), &q.context);
        let resolved_refs = resolver.resolve(&new.references).await?;
        let parsed = ParsedSchema::parse(new.schema_type, &new.schema, &resolved_refs)?;

        let level = self.effective_level(&q).await?;
        let existing = match against {
            None => self.load_live_parsed(&q).await?,
            Some(spec) => {
                let row = self
                    .schema_by_subject_version(request_context, subject, spec, false)
                    .await?;
                vec![self.parse_row(&q, &row).await?]
            }
        };

        let mut result = self.checker.check(level, &parsed, &existing);
        if !verbose {
            result.messages.clear();
        }
        Ok(result)
    }

    // ---- config -------------------------------------------------------

    /// Read the config record at a scope.
    ///
    /// Global scope always yields a record (falling back to the service
    /// defaults); subject scope yields `None` when unset and
    /// `default_to_global` is off.
    pub async fn get_config(
        &self,
        request_context: &str,
        subject: Option<&str>,
        default_to_global: bool,
    ) -> Result<Option<Config>> {
        match subject {
            None => {
                context::validate_context(request_context)?;
                let stored = self.store.config(&Scope::global(request_context)).await?;
                Ok(Some(stored.unwrap_or_else(|| {
                    Config::with_level(self.settings.compatibility)
                })))
            }
            Some(subject) => {
                let q = QualifiedSubject::resolve(subject, Some(request_context))?;
                let stored = self
                    .store
                    .config(&Scope::subject(&q.context, &q.subject))
                    .await?;
                match stored {
                    Some(config) => Ok(Some(config)),
                    None if default_to_global => {
                        let global = self.store.config(&Scope::global(&q.context)).await?;
                        Ok(Some(global.unwrap_or_else(|| {
                            Config::with_level(self.settings.compatibility)
                        })))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    pub async fn set_config(
        &self,
        request_context: &str,
        subject: Option<&str>,
        config: Config,
    ) -> Result<Config> {
        let scope = self.mutable_scope(request_context, subject).await?;
        match &scope.subject {
            Some(subject) => {
                let _guard = self.locks.acquire(&scope.context, subject).await;
                self.store.put_config(&scope, config.clone()).await?;
            }
            None => {
                let _guard = self.global_lock.lock().await;
                self.store.put_config(&scope, config.clone()).await?;
            }
        }
        debug!(scope = %scope, "set config");
        Ok(config)
    }

    pub async fn delete_config(
        &self,
        request_context: &str,
        subject: Option<&str>,
    ) -> Result<Option<Config>> {
        let scope = self.mutable_scope(request_context, subject).await?;
        match &scope.subject {
            Some(subject) => {
                let _guard = self.locks.acquire(&scope.context, subject).await;
                self.store.delete_config(&scope).await
            }
            None => {
                let _guard = self.global_lock.lock().await;
                self.store.delete_config(&scope).await
            }
        }
    }

    // ---- mode ---------------------------------------------------------

    /// Read the mode at a scope; global scope defaults to `READWRITE`.
    pub async fn get_mode(
        &self,
        request_context: &str,
        subject: Option<&str>,
        default_to_global: bool,
    ) -> Result<Option<Mode>> {
        match subject {
            None => {
                context::validate_context(request_context)?;
                let stored = self.store.mode(&Scope::global(request_context)).await?;
                Ok(Some(stored.unwrap_or_default()))
            }
            Some(subject) => {
                let q = QualifiedSubject::resolve(subject, Some(request_context))?;
                let stored = self
                    .store
                    .mode(&Scope::subject(&q.context, &q.subject))
                    .await?;
                match stored {
                    Some(mode) => Ok(Some(mode)),
                    None if default_to_global => {
                        let global = self.store.mode(&Scope::global(&q.context)).await?;
                        Ok(Some(global.unwrap_or_default()))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    /// Set the mode at a scope. Entering `IMPORT` on a non-empty scope
    /// requires `force`; the store enforces that atomically.
    pub async fn set_mode(
        &self,
        request_context: &str,
        subject: Option<&str>,
        mode: Mode,
        force: bool,
    ) -> Result<Mode> {
        let scope = self.mode_scope(request_context, subject)?;
        match &scope.subject {
            Some(subject) => {
                let _guard = self.locks.acquire(&scope.context, subject).await;
                self.store.put_mode(&scope, mode, force).await?;
            }
            None => {
                let _guard = self.global_lock.lock().await;
                self.store.put_mode(&scope, mode, force).await?;
            }
        }
        info!(scope = %scope, %mode, "set mode");
        Ok(mode)
    }

    pub async fn delete_mode(
        &self,
        request_context: &str,
        subject: Option<&str>,
    ) -> Result<Option<Mode>> {
        let scope = self.mode_scope(request_context, subject)?;
        match &scope.subject {
            Some(subject) => {
                let _guard = self.locks.acquire(&scope.context, subject).await;
                self.store.delete_mode(&scope).await
            }
            None => {
                let _guard = self.global_lock.lock().await;
                self.store.delete_mode(&scope).await
            }
        }
    }

    // ---- internals ----------------------------------------------------

    /// Apply qualified-subject routing, then a single alias hop
    async fn resolve_aliased(
        &self,
        request_context: &str,
        subject: &str,
    ) -> Result<QualifiedSubject> {
        let q = QualifiedSubject::resolve(subject, Some(request_context))?;
        let config = self
            .store
            .config(&Scope::subject(&q.context, &q.subject))
            .await?;
        if let Some(alias) = config.and_then(|c| c.alias) {
            context::validate_subject(&alias)?;
            return Ok(QualifiedSubject {
                context: q.context,
                subject: alias,
            });
        }
        Ok(q)
    }

    /// Effective mode: subject scope if set, else global, else READWRITE
    async fn effective_mode(&self, ctx: &str, subject: Option<&str>) -> Result<Mode> {
        if let Some(subject) = subject {
            if let Some(mode) = self.store.mode(&Scope::subject(ctx, subject)).await? {
                return Ok(mode);
            }
        }
        Ok(self
            .store
            .mode(&Scope::global(ctx))
            .await?
            .unwrap_or_default())
    }

    async fn ensure_writes_admitted(&self, q: &QualifiedSubject) -> Result<()> {
        let mode = self.effective_mode(&q.context, Some(&q.subject)).await?;
        if !mode.allows_writes() {
            return Err(RegistryError::OperationNotPermitted(format!(
                "subject '{}' is in {mode} mode",
                q.subject
            )));
        }
        Ok(())
    }

    /// Effective compatibility level: subject config, global config, then
    /// the service default
    async fn effective_level(
        &self,
        q: &QualifiedSubject,
    ) -> Result<schema_registry_core::CompatibilityLevel> {
        if let Some(level) = self
            .store
            .config(&Scope::subject(&q.context, &q.subject))
            .await?
            .and_then(|c| c.compatibility_level)
        {
            return Ok(level);
        }
        if let Some(level) = self
            .store
            .config(&Scope::global(&q.context))
            .await?
            .and_then(|c| c.compatibility_level)
        {
            return Ok(level);
        }
        Ok(self.settings.compatibility)
    }

    async fn effective_normalize(
        &self,
        q: &QualifiedSubject,
        request: Option<bool>,
    ) -> Result<bool> {
        if let Some(normalize) = request {
            return Ok(normalize);
        }
        if let Some(normalize) = self
            .store
            .config(&Scope::subject(&q.context, &q.subject))
            .await?
            .and_then(|c| c.normalize)
        {
            return Ok(normalize);
        }
        if let Some(normalize) = self
            .store
            .config(&Scope::global(&q.context))
            .await?
            .and_then(|c| c.normalize)
        {
            return Ok(normalize);
        }
        Ok(self.settings.normalize)
    }

    /// Parse every live version of a subject for the compatibility gate
    async fn load_live_parsed(&self, q: &QualifiedSubject) -> Result<Vec<VersionedSchema>> {
        let versions = self.store.list_versions(&q.context, &q.subject, false).await?;
        let mut parsed = Vec::with_capacity(versions.len());
        for version in versions {
            let row = self
                .store
                .schema_by_subject_version(&q.context, &q.subject, version)
                .await?;
            parsed.push(self.parse_row(q, &row).await?);
        }
        Ok(parsed)
    }

    async fn parse_row(&self, q: &QualifiedSubject, row: &Schema) -> Result<VersionedSchema> {
        let resolver = ReferenceResolver::new(self.store.as_ref(), &q.context);
        let resolved_refs = resolver.resolve(&row.references).await?;
        let parsed =
            ParsedSchema::parse(row.schema_type, &row.schema, &resolved_refs).map_err(|e| {
                RegistryError::Internal(format!(
                    "stored schema '{}' version {} no longer parses: {e}",
                    row.subject, row.version
                ))
            })?;
        Ok(VersionedSchema {
            version: row.version,
            parsed,
        })
    }

    async fn ensure_unreferenced(&self, q: &QualifiedSubject, version: u32) -> Result<()> {
        let referrers = self
            .store
            .referenced_by(&q.context, &q.subject, version)
            .await?;
        if !referrers.is_empty() {
            return Err(RegistryError::ReferenceExists {
                subject: q.subject.clone(),
                version,
            });
        }
        Ok(())
    }

    /// Scope for config writes, which consult the effective mode
    async fn mutable_scope(
        &self,
        request_context: &str,
        subject: Option<&str>,
    ) -> Result<Scope> {
        let scope = self.mode_scope(request_context, subject)?;
        let mode = self
            .effective_mode(&scope.context, scope.subject.as_deref())
            .await?;
        if !mode.allows_writes() {
            return Err(RegistryError::OperationNotPermitted(format!(
                "scope {scope} is in {mode} mode"
            )));
        }
        Ok(scope)
    }

    /// Scope for mode writes, which must stay available in any mode
    fn mode_scope(&self, request_context: &str, subject: Option<&str>) -> Result<Scope> {
        match subject {
            Some(subject) => {
                let q = QualifiedSubject::resolve(subject, Some(request_context))?;
                context::ensure_writable_context(&q.context)?;
                Ok(Scope::subject(q.context, q.subject))
            }
            None => {
                context::validate_context(request_context)?;
                context::ensure_writable_context(request_context)?;
                Ok(Scope::global(request_context))
            }
        }
    }
}
