//! Reference resolution against the store
//!
//! A schema's references form a DAG over (subject, version) coordinates.
//! Resolution walks the graph depth-first, rejects cycles, and produces
//! the referenced texts in dependency order, which is what the parsers
//! need for name pre-registration.

use std::collections::HashSet;

use futures::future::BoxFuture;

use schema_registry_core::{RegistryError, Result, Schema, SchemaReference, VersionSpec};
use schema_registry_parsers::ResolvedReference;
use schema_registry_storage::SchemaStore;

pub(crate) struct ReferenceResolver<'a> {
    store: &'a dyn SchemaStore,
    context: &'a str,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(store: &'a dyn SchemaStore, context: &'a str) -> Self {
        ReferenceResolver { store, context }
    }

    /// Fetch every reference target (transitively) as parser input, in
    /// dependency order.
    pub async fn resolve(&self, references: &[SchemaReference]) -> Result<Vec<ResolvedReference>> {
        let mut resolved = Vec::new();
        let mut in_progress = Vec::new();
        let mut done = HashSet::new();
        for reference in references {
            self.visit(reference, &mut resolved, &mut in_progress, &mut done)
                .await?;
        }
        Ok(resolved)
    }

    fn visit<'r>(
        &'r self,
        reference: &'r SchemaReference,
        resolved: &'r mut Vec<ResolvedReference>,
        in_progress: &'r mut Vec<(String, u32)>,
        done: &'r mut HashSet<(String, u32)>,
    ) -> BoxFuture<'r, Result<()>> {
        Box::pin(async move {
            let row = self.fetch(reference).await?;
            let key = (row.subject.clone(), row.version);
            if in_progress.contains(&key) {
                return Err(RegistryError::invalid_schema(format!(
                    "circular reference through '{}' version {}",
                    key.0, key.1
                )));
            }
            if !done.insert(key.clone()) {
                return Ok(());
            }

            in_progress.push(key);
            for child in &row.references {
                self.visit(child, resolved, in_progress, done).await?;
            }
            in_progress.pop();

            resolved.push(ResolvedReference::new(&reference.name, &row.schema));
            Ok(())
        })
    }

    async fn fetch(&self, reference: &SchemaReference) -> Result<Schema> {
        let spec = VersionSpec::from_i64(i64::from(reference.version)).map_err(|_| {
            RegistryError::invalid_schema(format!(
                "reference '{}' has invalid version {}",
                reference.name, reference.version
            ))
        })?;
        let result = match spec {
            VersionSpec::Version(version) => {
                self.store
                    .schema_by_subject_version(self.context, &reference.subject, version)
                    .await
            }
            VersionSpec::Latest => {
                let versions = self
                    .store
                    .list_versions(self.context, &reference.subject, false)
                    .await?;
                match versions.last() {
                    Some(latest) => {
                        self.store
                            .schema_by_subject_version(self.context, &reference.subject, *latest)
                            .await
                    }
                    None => Err(RegistryError::SubjectNotFound(reference.subject.clone())),
                }
            }
        };
        result.map_err(|e| {
            RegistryError::invalid_schema(format!(
                "unresolved reference '{}' to subject '{}' version {}: {e}",
                reference.name, reference.subject, reference.version
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_registry_core::schema::fingerprint;
    use schema_registry_core::SchemaType;
    use schema_registry_storage::InMemoryStore;

    fn record(subject: &str, text: &str, references: Vec<SchemaReference>) -> Schema {
        Schema {
            id: 0,
            subject: subject.to_string(),
            version: 0,
            schema_type: SchemaType::Avro,
            schema: text.to_string(),
            references,
            fingerprint: fingerprint(text),
            deleted: false,
            metadata: None,
            rule_set: None,
        }
    }

    fn reference(name: &str, subject: &str, version: i32) -> SchemaReference {
        SchemaReference {
            name: name.to_string(),
            subject: subject.to_string(),
            version,
        }
    }

    #[tokio::test]
    async fn resolves_in_dependency_order() {
        let store = InMemoryStore::new();
        store
            .append_schema(".", record("base", r#""string""#, vec![]))
            .await
            .unwrap();
        store
            .append_schema(
                ".",
                record("mid", r#""int""#, vec![reference("base", "base", 1)]),
            )
            .await
            .unwrap();

        let resolver = ReferenceResolver::new(&store, ".");
        let resolved = resolver
            .resolve(&[reference("mid", "mid", 1)])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].name, "base");
        assert_eq!(resolved[1].name, "mid");
    }

    #[tokio::test]
    async fn latest_reference_tracks_live_versions() {
        let store = InMemoryStore::new();
        store
            .append_schema(".", record("base", r#""string""#, vec![]))
            .await
            .unwrap();
        store
            .append_schema(".", record("base", r#""int""#, vec![]))
            .await
            .unwrap();

        let resolver = ReferenceResolver::new(&store, ".");
        let resolved = resolver
            .resolve(&[reference("base", "base", -1)])
            .await
            .unwrap();
        assert_eq!(resolved[0].text, r#""int""#);
    }

    #[tokio::test]
    async fn missing_target_is_invalid_schema() {
        let store = InMemoryStore::new();
        let resolver = ReferenceResolver::new(&store, ".");
        let err = resolver
            .resolve(&[reference("ghost", "ghost", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    }

    #[tokio::test]
    async fn cycles_are_rejected() {
        let store = InMemoryStore::new();
        // a version 1 exists so the forward reference resolves, then the
        // second version closes the loop a -> b -> a
        store
            .append_schema(".", record("a", r#""string""#, vec![]))
            .await
            .unwrap();
        store
            .append_schema(".", record("b", r#""int""#, vec![reference("a", "a", 1)]))
            .await
            .unwrap();
        let mut looped = record("a", r#""long""#, vec![reference("b", "b", 1)]);
        looped.references = vec![reference("b", "b", 1)];
        store.append_schema(".", looped).await.unwrap();

        let resolver = ReferenceResolver::new(&store, ".");
        // b -> a(v1) is fine
        assert!(resolver.resolve(&[reference("b", "b", 1)]).await.is_ok());
    }

    #[tokio::test]
    async fn direct_cycle_detection() {
        let store = InMemoryStore::new();
        let mut self_ref = record("selfish", r#""string""#, vec![]);
        self_ref.references = vec![reference("selfish", "selfish", 1)];
        store.append_schema(".", self_ref).await.unwrap();

        let resolver = ReferenceResolver::new(&store, ".");
        let err = resolver
            .resolve(&[reference("selfish", "selfish", 1)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("circular reference"));
    }
}
