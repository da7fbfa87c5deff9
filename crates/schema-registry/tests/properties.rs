//! Allocation invariants under randomized workloads

use proptest::prelude::*;

use schema_registry::{NewSchema, Registry, VersionSpec};

/// n distinct, mutually backward-compatible record schemas: each adds one
/// defaulted field over the last
fn evolution(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let fields: Vec<String> = (0..=i)
                .map(|j| format!(r#"{{"name":"f{j}","type":"long","default":0}}"#))
                .collect();
            format!(
                r#"{{"type":"record","name":"Evolved","fields":[{}]}}"#,
                fields.join(",")
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// versions are exactly 1..=n after n registrations, ids strictly
    /// increase, and soft-then-permanent deletion never recycles numbers
    #[test]
    fn version_numbers_stay_dense_and_unrecycled(
        n in 1usize..10,
        delete_at in proptest::option::of(0usize..10),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let registry = Registry::builder().build();
            let mut last_id = 0;
            for text in evolution(n) {
                let stored = registry
                    .register_schema(".", "dense", NewSchema::avro(&text), None)
                    .await
                    .unwrap();
                assert!(stored.id > last_id);
                last_id = stored.id;
            }
            let versions = registry.versions(".", "dense", true).await.unwrap();
            assert_eq!(versions, (1..=n as u32).collect::<Vec<u32>>());

            if let Some(delete_at) = delete_at.filter(|d| *d < n) {
                let victim = delete_at as u32 + 1;
                registry
                    .delete_version(".", "dense", VersionSpec::Version(victim), false)
                    .await
                    .unwrap();
                registry
                    .delete_version(".", "dense", VersionSpec::Version(victim), true)
                    .await
                    .unwrap();

                // registering something new continues past the old maximum
                let next = registry
                    .register_schema(
                        ".",
                        "dense",
                        NewSchema::avro(&evolution(n + 1)[n]),
                        None,
                    )
                    .await
                    .unwrap();
                assert_eq!(next.version, n as u32 + 1);
            }
        });
    }
}
