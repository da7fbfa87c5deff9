//! Apache Avro schema parsing and canonicalization
//!
//! The AST keeps what the compatibility engine needs (field defaults and
//! aliases, enum defaults, named-type identity by fullname); everything
//! else the canonical form strips.

mod canonical;
mod parser;

use std::collections::HashMap;

use schema_registry_core::Result;

use crate::ResolvedReference;

/// Name of a record, enum, or fixed type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub name: String,
    pub namespace: Option<String>,
}

impl Name {
    pub fn fullname(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{}.{}", ns, self.name),
            _ => self.name.clone(),
        }
    }
}

/// An Avro schema node
#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Array(Box<AvroSchema>),
    Map(Box<AvroSchema>),
    Union(Vec<AvroSchema>),
    Record(Record),
    Enum(EnumDef),
    Fixed(FixedDef),
    /// Reference to a previously defined named type, by fullname
    Named(String),
}

impl AvroSchema {
    /// Fullname of this node when it is a definition or reference
    pub fn name(&self) -> Option<String> {
        match self {
            AvroSchema::Record(r) => Some(r.name.fullname()),
            AvroSchema::Enum(e) => Some(e.name.fullname()),
            AvroSchema::Fixed(f) => Some(f.name.fullname()),
            AvroSchema::Named(n) => Some(n.clone()),
            _ => None,
        }
    }

    pub fn is_union(&self) -> bool {
        matches!(self, AvroSchema::Union(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: Name,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: AvroSchema,
    /// Raw default value as written in the schema text
    pub default: Option<serde_json::Value>,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: Name,
    pub symbols: Vec<String>,
    /// Fallback symbol for readers that see an unknown symbol
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixedDef {
    pub name: Name,
    pub size: u64,
}

/// A parsed Avro schema with its named-type tables and canonical form
#[derive(Debug, Clone)]
pub struct AvroParsed {
    root: AvroSchema,
    /// Named types defined by this schema text, by fullname
    names: HashMap<String, AvroSchema>,
    /// Named types contributed by references, by fullname
    externals: HashMap<String, AvroSchema>,
    canonical: String,
}

impl AvroParsed {
    /// Parse Avro schema text, pre-registering each reference into the
    /// name cache first so the main text can use their fullnames.
    pub fn parse(text: &str, references: &[ResolvedReference]) -> Result<AvroParsed> {
        parser::parse(text, references)
    }

    pub fn root(&self) -> &AvroSchema {
        &self.root
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Canonical form with referenced types expanded inline
    pub fn resolved(&self) -> String {
        canonical::render(&self.root, self, true)
    }

    /// Look up a named type definition, local first, then references
    pub fn resolve_name(&self, fullname: &str) -> Option<&AvroSchema> {
        self.names
            .get(fullname)
            .or_else(|| self.externals.get(fullname))
    }

    /// Follow `Named` indirections until a structural node appears
    pub fn dereference<'a>(&'a self, schema: &'a AvroSchema) -> &'a AvroSchema {
        let mut current = schema;
        let mut hops = 0;
        while let AvroSchema::Named(fullname) = current {
            match self.resolve_name(fullname) {
                // named-type tables never form cycles of Named entries,
                // but guard against a malformed table anyway
                Some(next) if hops < 64 => {
                    current = next;
                    hops += 1;
                }
                _ => break,
            }
        }
        current
    }

    pub(crate) fn new(
        root: AvroSchema,
        names: HashMap<String, AvroSchema>,
        externals: HashMap<String, AvroSchema>,
    ) -> AvroParsed {
        let mut parsed = AvroParsed {
            root,
            names,
            externals,
            canonical: String::new(),
        };
        parsed.canonical = canonical::render(&parsed.root, &parsed, false);
        parsed
    }
}
