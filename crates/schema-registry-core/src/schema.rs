//! Schema record structures

use serde::{Deserialize, Serialize};

use crate::types::{CompatibilityLevel, SchemaId, SchemaType};

/// Reference from one schema to a registered version of another subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReference {
    /// Name the referencing schema uses for the target (type fullname,
    /// `$ref` value, or proto import path, depending on the format)
    pub name: String,
    /// Subject holding the referenced schema
    pub subject: String,
    /// Version of the referenced schema; `-1` selects the latest live
    /// version at resolution time
    pub version: i32,
}

/// A (subject, version) coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectVersion {
    pub subject: String,
    pub version: u32,
}

/// A registered schema, immutable except for its soft-delete tombstone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Globally unique (within a context) positive identifier
    pub id: SchemaId,
    /// Logical schema name
    pub subject: String,
    /// Dense, monotonic index within the subject, starting at 1
    pub version: u32,
    #[serde(default)]
    pub schema_type: SchemaType,
    /// Schema text as registered (normalized when normalization was on)
    pub schema: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
    /// Hex SHA-256 of the parsing canonical form; the dedup key
    pub fingerprint: String,
    /// Soft-delete tombstone
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    /// Opaque, passed through unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Opaque, passed through unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<serde_json::Value>,
}

/// Candidate schema submitted by register, lookup, and compatibility calls
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchema {
    pub schema: String,
    #[serde(default)]
    pub schema_type: SchemaType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<serde_json::Value>,
}

impl NewSchema {
    /// Candidate with just schema text in the default (Avro) format
    pub fn avro(schema: impl Into<String>) -> Self {
        NewSchema {
            schema: schema.into(),
            ..Default::default()
        }
    }

    /// Candidate with schema text in an explicit format
    pub fn of_type(schema_type: SchemaType, schema: impl Into<String>) -> Self {
        NewSchema {
            schema: schema.into(),
            schema_type,
            ..Default::default()
        }
    }
}

/// Per-scope configuration record
///
/// Fields the registry does not interpret ride along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility_level: Option<CompatibilityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalize: Option<bool>,
    /// Single-hop redirection to another subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Config {
    /// Config setting only the compatibility level
    pub fn with_level(level: CompatibilityLevel) -> Self {
        Config {
            compatibility_level: Some(level),
            ..Default::default()
        }
    }
}

/// Hex SHA-256 over a canonical schema rendering
pub fn fingerprint(canonical: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint(r#""string""#);
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, fingerprint(r#""string""#));
        assert_ne!(fp, fingerprint(r#""bytes""#));
    }

    #[test]
    fn schema_serializes_in_wire_shape() {
        let schema = Schema {
            id: 1,
            subject: "test".into(),
            version: 1,
            schema_type: SchemaType::Avro,
            schema: r#""string""#.into(),
            references: vec![],
            fingerprint: fingerprint(r#""string""#),
            deleted: false,
            metadata: None,
            rule_set: None,
        };
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["schemaType"], "AVRO");
        assert!(json.get("references").is_none());
        assert!(json.get("deleted").is_none());
    }

    #[test]
    fn config_passes_opaque_fields_through() {
        let raw = r#"{"compatibilityLevel":"FULL","alias":"other","defaultMetadata":{"owner":"data"}}"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(
            config.compatibility_level,
            Some(CompatibilityLevel::Full)
        );
        assert_eq!(config.alias.as_deref(), Some("other"));
        assert!(config.extra.contains_key("defaultMetadata"));
        let out = serde_json::to_value(&config).unwrap();
        assert_eq!(out["defaultMetadata"]["owner"], "data");
    }
}
