//! # Schema Registry Parsers
//!
//! Format parsers for the three registered schema kinds. Each parser turns
//! schema text (plus any resolved references) into an AST, a parsing
//! canonical form, and a content fingerprint. The canonical form is the
//! dedup key for the whole registry, so it must be a total, deterministic
//! function over valid schemas.

pub mod avro;
pub mod json_schema;
pub mod protobuf;

use schema_registry_core::{schema, RegistryError, Result, SchemaType};

/// A reference target resolved to its text, handed to the parser so the
/// referencing schema can be validated structurally.
///
/// References must appear in dependency order: a reference's own targets
/// come earlier in the slice.
#[derive(Debug, Clone)]
pub struct ResolvedReference {
    /// Name the referencing schema uses: an Avro fullname, a JSON `$ref`
    /// value, or a protobuf import path
    pub name: String,
    pub text: String,
}

impl ResolvedReference {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        ResolvedReference {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Output flavor for [`ParsedSchema::formatted`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaFormat {
    /// The parsing canonical form
    #[default]
    Canonical,
    /// Canonical form with references inlined
    Resolved,
}

impl std::str::FromStr for SchemaFormat {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "canonical" => Ok(SchemaFormat::Canonical),
            "resolved" => Ok(SchemaFormat::Resolved),
            other => Err(RegistryError::invalid_schema(format!(
                "unknown schema format '{other}'"
            ))),
        }
    }
}

/// A successfully parsed schema of any supported format
#[derive(Debug, Clone)]
pub enum ParsedSchema {
    Avro(avro::AvroParsed),
    Json(json_schema::JsonParsed),
    Protobuf(protobuf::ProtoParsed),
}

impl ParsedSchema {
    /// Parse `text` as `schema_type`, resolving names against `references`
    pub fn parse(
        schema_type: SchemaType,
        text: &str,
        references: &[ResolvedReference],
    ) -> Result<ParsedSchema> {
        match schema_type {
            SchemaType::Avro => Ok(ParsedSchema::Avro(avro::AvroParsed::parse(
                text, references,
            )?)),
            SchemaType::Json => Ok(ParsedSchema::Json(json_schema::JsonParsed::parse(
                text, references,
            )?)),
            SchemaType::Protobuf => Ok(ParsedSchema::Protobuf(protobuf::ProtoParsed::parse(
                text, references,
            )?)),
        }
    }

    pub fn schema_type(&self) -> SchemaType {
        match self {
            ParsedSchema::Avro(_) => SchemaType::Avro,
            ParsedSchema::Json(_) => SchemaType::Json,
            ParsedSchema::Protobuf(_) => SchemaType::Protobuf,
        }
    }

    /// The parsing canonical form
    pub fn canonical(&self) -> &str {
        match self {
            ParsedSchema::Avro(p) => p.canonical(),
            ParsedSchema::Json(p) => p.canonical(),
            ParsedSchema::Protobuf(p) => p.canonical(),
        }
    }

    /// Hex SHA-256 of the canonical form
    pub fn fingerprint(&self) -> String {
        schema::fingerprint(self.canonical())
    }

    /// Serialize in the requested flavor
    pub fn formatted(&self, format: SchemaFormat) -> Result<String> {
        match format {
            SchemaFormat::Canonical => Ok(self.canonical().to_string()),
            SchemaFormat::Resolved => match self {
                ParsedSchema::Avro(p) => Ok(p.resolved()),
                ParsedSchema::Json(p) => p.resolved(),
                ParsedSchema::Protobuf(p) => Ok(p.resolved()),
            },
        }
    }
}
