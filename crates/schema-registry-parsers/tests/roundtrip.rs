//! Canonical-form round-trip properties

use proptest::prelude::*;
use serde_json::json;

use schema_registry_core::SchemaType;
use schema_registry_parsers::ParsedSchema;

const FIELD_TYPES: [&str; 7] = ["null", "boolean", "int", "long", "double", "bytes", "string"];

fn record_schema() -> impl Strategy<Value = serde_json::Value> {
    let field = ("[a-z][a-z0-9_]{0,7}", 0..FIELD_TYPES.len());
    proptest::collection::vec(field, 1..8).prop_map(|raw_fields| {
        let mut seen = Vec::new();
        let fields: Vec<serde_json::Value> = raw_fields
            .into_iter()
            .filter(|(name, _)| {
                if seen.contains(name) {
                    false
                } else {
                    seen.push(name.clone());
                    true
                }
            })
            .map(|(name, type_index)| json!({"name": name, "type": FIELD_TYPES[type_index]}))
            .collect();
        json!({
            "type": "record",
            "name": "Generated",
            "namespace": "prop.test",
            "fields": fields,
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// parse(canonical(s)) has the same fingerprint as parse(s)
    #[test]
    fn canonical_form_is_a_fixed_point(schema in record_schema()) {
        let text = schema.to_string();
        let parsed = ParsedSchema::parse(SchemaType::Avro, &text, &[]).unwrap();
        let reparsed =
            ParsedSchema::parse(SchemaType::Avro, parsed.canonical(), &[]).unwrap();
        prop_assert_eq!(parsed.fingerprint(), reparsed.fingerprint());
        prop_assert_eq!(parsed.canonical(), reparsed.canonical());
    }

    /// whitespace and key order never change the fingerprint
    #[test]
    fn pretty_printing_is_canonicalized_away(schema in record_schema()) {
        let compact = schema.to_string();
        let pretty = serde_json::to_string_pretty(&schema).unwrap();
        let a = ParsedSchema::parse(SchemaType::Avro, &compact, &[]).unwrap();
        let b = ParsedSchema::parse(SchemaType::Avro, &pretty, &[]).unwrap();
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
