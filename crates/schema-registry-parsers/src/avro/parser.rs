//! JSON-driven Avro schema parser with a named-type registry

use std::collections::HashMap;

use serde_json::{Map, Value};

use schema_registry_core::{RegistryError, Result};

use super::{AvroParsed, AvroSchema, EnumDef, Field, FixedDef, Name, Record};
use crate::ResolvedReference;

pub(super) fn parse(text: &str, references: &[ResolvedReference]) -> Result<AvroParsed> {
    let mut registry = Registry::default();

    for reference in references {
        let value: Value = serde_json::from_str(&reference.text).map_err(|e| {
            RegistryError::invalid_schema(format!(
                "reference '{}' is not valid JSON: {e}",
                reference.name
            ))
        })?;
        registry.parse_schema(&value, None)?;
        registry.seal_externals();
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| RegistryError::invalid_schema(format!("invalid JSON: {e}")))?;
    let root = registry.parse_schema(&value, None)?;

    Ok(AvroParsed::new(root, registry.names, registry.externals))
}

#[derive(Default)]
struct Registry {
    /// Named types defined by the text currently being parsed
    names: HashMap<String, AvroSchema>,
    /// Named types from already-parsed references
    externals: HashMap<String, AvroSchema>,
}

impl Registry {
    /// Move freshly defined names into the external set between reference
    /// parses, so each reference sees every earlier one.
    fn seal_externals(&mut self) {
        let drained: Vec<(String, AvroSchema)> = self.names.drain().collect();
        self.externals.extend(drained);
    }

    fn parse_schema(&mut self, value: &Value, enclosing: Option<&str>) -> Result<AvroSchema> {
        match value {
            Value::String(s) => self.parse_primitive(s, enclosing),
            Value::Object(map) => self.parse_object(map, enclosing),
            Value::Array(branches) => self.parse_union(branches, enclosing),
            other => Err(RegistryError::invalid_schema(format!(
                "expected schema, found {other}"
            ))),
        }
    }

    fn parse_primitive(&mut self, s: &str, enclosing: Option<&str>) -> Result<AvroSchema> {
        match s {
            "null" => Ok(AvroSchema::Null),
            "boolean" => Ok(AvroSchema::Boolean),
            "int" => Ok(AvroSchema::Int),
            "long" => Ok(AvroSchema::Long),
            "float" => Ok(AvroSchema::Float),
            "double" => Ok(AvroSchema::Double),
            "bytes" => Ok(AvroSchema::Bytes),
            "string" => Ok(AvroSchema::String),
            name => self.resolve_reference(name, enclosing),
        }
    }

    fn resolve_reference(&self, name: &str, enclosing: Option<&str>) -> Result<AvroSchema> {
        let mut candidates = Vec::with_capacity(2);
        if name.contains('.') {
            candidates.push(name.to_string());
        } else {
            if let Some(ns) = enclosing {
                candidates.push(format!("{ns}.{name}"));
            }
            candidates.push(name.to_string());
        }
        for candidate in &candidates {
            if self.names.contains_key(candidate) || self.externals.contains_key(candidate) {
                return Ok(AvroSchema::Named(candidate.clone()));
            }
        }
        Err(RegistryError::invalid_schema(format!(
            "unknown type '{name}'"
        )))
    }

    fn parse_union(&mut self, branches: &[Value], enclosing: Option<&str>) -> Result<AvroSchema> {
        let mut parsed = Vec::with_capacity(branches.len());
        let mut seen = Vec::new();
        for branch in branches {
            let schema = self.parse_schema(branch, enclosing)?;
            if schema.is_union() {
                return Err(RegistryError::invalid_schema(
                    "unions may not immediately contain other unions",
                ));
            }
            let signature = union_signature(&schema);
            if seen.contains(&signature) {
                return Err(RegistryError::invalid_schema(format!(
                    "duplicate union branch '{signature}'"
                )));
            }
            seen.push(signature);
            parsed.push(schema);
        }
        Ok(AvroSchema::Union(parsed))
    }

    fn parse_object(&mut self, map: &Map<String, Value>, enclosing: Option<&str>) -> Result<AvroSchema> {
        let type_value = map
            .get("type")
            .ok_or_else(|| RegistryError::invalid_schema("schema object has no \"type\""))?;

        let type_str = match type_value {
            Value::String(s) => s.as_str(),
            // e.g. {"type": {"type": "array", ...}} or {"type": [...]}
            nested => return self.parse_schema(nested, enclosing),
        };

        match type_str {
            "record" | "error" => self.parse_record(map, enclosing),
            "enum" => self.parse_enum(map, enclosing),
            "fixed" => self.parse_fixed(map, enclosing),
            "array" => {
                let items = map.get("items").ok_or_else(|| {
                    RegistryError::invalid_schema("array schema has no \"items\"")
                })?;
                Ok(AvroSchema::Array(Box::new(
                    self.parse_schema(items, enclosing)?,
                )))
            }
            "map" => {
                let values = map.get("values").ok_or_else(|| {
                    RegistryError::invalid_schema("map schema has no \"values\"")
                })?;
                Ok(AvroSchema::Map(Box::new(
                    self.parse_schema(values, enclosing)?,
                )))
            }
            primitive => self.parse_primitive(primitive, enclosing),
        }
    }

    fn parse_record(&mut self, map: &Map<String, Value>, enclosing: Option<&str>) -> Result<AvroSchema> {
        let name = parse_name(map, enclosing)?;
        let fullname = name.fullname();
        self.define_placeholder(&fullname)?;

        let field_values = map
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                RegistryError::invalid_schema(format!(
                    "record '{fullname}' has no \"fields\" array"
                ))
            })?;

        let record_ns = name.namespace.as_deref().map(str::to_string);
        let mut fields = Vec::with_capacity(field_values.len());
        let mut field_names = Vec::with_capacity(field_values.len());
        for field_value in field_values {
            let field = self.parse_field(field_value, record_ns.as_deref())?;
            if field_names.contains(&field.name) {
                return Err(RegistryError::invalid_schema(format!(
                    "record '{fullname}' declares field '{}' twice",
                    field.name
                )));
            }
            field_names.push(field.name.clone());
            fields.push(field);
        }

        let record = AvroSchema::Record(Record { name, fields });
        self.names.insert(fullname, record.clone());
        Ok(record)
    }

    fn parse_field(&mut self, value: &Value, enclosing: Option<&str>) -> Result<Field> {
        let map = value
            .as_object()
            .ok_or_else(|| RegistryError::invalid_schema("record field must be an object"))?;
        let name = map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RegistryError::invalid_schema("record field has no \"name\""))?;
        validate_name_part(name)?;

        let type_value = map.get("type").ok_or_else(|| {
            RegistryError::invalid_schema(format!("field '{name}' has no \"type\""))
        })?;
        let schema = self.parse_schema(type_value, enclosing)?;

        let aliases = match map.get("aliases") {
            None => Vec::new(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        RegistryError::invalid_schema(format!(
                            "field '{name}' has a non-string alias"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(RegistryError::invalid_schema(format!(
                    "field '{name}' aliases must be an array"
                )))
            }
        };

        Ok(Field {
            name: name.to_string(),
            schema,
            default: map.get("default").cloned(),
            aliases,
        })
    }

    fn parse_enum(&mut self, map: &Map<String, Value>, enclosing: Option<&str>) -> Result<AvroSchema> {
        let name = parse_name(map, enclosing)?;
        let fullname = name.fullname();
        self.define_placeholder(&fullname)?;

        let symbol_values = map
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                RegistryError::invalid_schema(format!("enum '{fullname}' has no \"symbols\""))
            })?;
        let mut symbols = Vec::with_capacity(symbol_values.len());
        for symbol in symbol_values {
            let symbol = symbol.as_str().ok_or_else(|| {
                RegistryError::invalid_schema(format!("enum '{fullname}' has a non-string symbol"))
            })?;
            validate_name_part(symbol)?;
            if symbols.iter().any(|s| s == symbol) {
                return Err(RegistryError::invalid_schema(format!(
                    "enum '{fullname}' repeats symbol '{symbol}'"
                )));
            }
            symbols.push(symbol.to_string());
        }

        let default = match map.get("default") {
            None => None,
            Some(Value::String(symbol)) if symbols.iter().any(|s| s == symbol) => {
                Some(symbol.clone())
            }
            Some(other) => {
                return Err(RegistryError::invalid_schema(format!(
                    "enum '{fullname}' default {other} is not a symbol"
                )))
            }
        };

        let parsed = AvroSchema::Enum(EnumDef {
            name,
            symbols,
            default,
        });
        self.names.insert(fullname, parsed.clone());
        Ok(parsed)
    }

    fn parse_fixed(&mut self, map: &Map<String, Value>, enclosing: Option<&str>) -> Result<AvroSchema> {
        let name = parse_name(map, enclosing)?;
        let fullname = name.fullname();
        self.define_placeholder(&fullname)?;

        let size = map.get("size").and_then(Value::as_u64).ok_or_else(|| {
            RegistryError::invalid_schema(format!(
                "fixed '{fullname}' needs a non-negative integer \"size\""
            ))
        })?;

        let parsed = AvroSchema::Fixed(FixedDef { name, size });
        self.names.insert(fullname, parsed.clone());
        Ok(parsed)
    }

    /// Claim a fullname before parsing the body, so recursive references
    /// to the type under construction resolve.
    fn define_placeholder(&mut self, fullname: &str) -> Result<()> {
        if self.names.contains_key(fullname) || self.externals.contains_key(fullname) {
            return Err(RegistryError::invalid_schema(format!(
                "type '{fullname}' is defined more than once"
            )));
        }
        self.names
            .insert(fullname.to_string(), AvroSchema::Named(fullname.to_string()));
        Ok(())
    }
}

fn parse_name(map: &Map<String, Value>, enclosing: Option<&str>) -> Result<Name> {
    let raw = map
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| RegistryError::invalid_schema("named type has no \"name\""))?;

    // a dotted name carries its own namespace and wins over the attribute
    if let Some(idx) = raw.rfind('.') {
        let (ns, name) = raw.split_at(idx);
        let name = &name[1..];
        validate_namespace(ns)?;
        validate_name_part(name)?;
        return Ok(Name {
            name: name.to_string(),
            namespace: Some(ns.to_string()),
        });
    }

    validate_name_part(raw)?;
    let namespace = match map.get("namespace") {
        Some(Value::String(ns)) if !ns.is_empty() => {
            validate_namespace(ns)?;
            Some(ns.clone())
        }
        Some(Value::String(_)) => None,
        None => enclosing.map(str::to_string),
        Some(other) => {
            return Err(RegistryError::invalid_schema(format!(
                "namespace must be a string, found {other}"
            )))
        }
    };
    Ok(Name {
        name: raw.to_string(),
        namespace,
    })
}

fn validate_name_part(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RegistryError::invalid_schema(format!(
            "invalid name '{name}'"
        )))
    }
}

fn validate_namespace(namespace: &str) -> Result<()> {
    for part in namespace.split('.') {
        validate_name_part(part)?;
    }
    Ok(())
}

/// Discriminant used to reject duplicate union branches
fn union_signature(schema: &AvroSchema) -> String {
    match schema {
        AvroSchema::Null => "null".into(),
        AvroSchema::Boolean => "boolean".into(),
        AvroSchema::Int => "int".into(),
        AvroSchema::Long => "long".into(),
        AvroSchema::Float => "float".into(),
        AvroSchema::Double => "double".into(),
        AvroSchema::Bytes => "bytes".into(),
        AvroSchema::String => "string".into(),
        AvroSchema::Array(_) => "array".into(),
        AvroSchema::Map(_) => "map".into(),
        AvroSchema::Union(_) => "union".into(),
        named => named.name().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_union_branches() {
        let err = parse(r#"["string", "string"]"#, &[]).unwrap_err();
        assert!(err.to_string().contains("duplicate union branch"));
        assert!(parse(r#"["null", ["int"]]"#, &[]).is_err());
    }

    #[test]
    fn rejects_redefinition() {
        let err = parse(
            r#"{"type":"record","name":"R","fields":[
                {"name":"a","type":{"type":"enum","name":"E","symbols":["X"]}},
                {"name":"b","type":{"type":"enum","name":"E","symbols":["Y"]}}
            ]}"#,
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn rejects_bad_names() {
        assert!(parse(r#"{"type":"record","name":"1bad","fields":[]}"#, &[]).is_err());
        assert!(parse(
            r#"{"type":"record","name":"R","fields":[{"name":"has space","type":"int"}]}"#,
            &[]
        )
        .is_err());
    }

    #[test]
    fn dotted_name_beats_namespace_attribute() {
        let parsed = parse(
            r#"{"type":"fixed","name":"a.b.MD5","namespace":"ignored","size":16}"#,
            &[],
        )
        .unwrap();
        assert!(parsed.resolve_name("a.b.MD5").is_some());
    }

    #[test]
    fn references_see_earlier_references() {
        let base = r#"{"type":"enum","name":"x.Kind","symbols":["A"]}"#;
        let mid = r#"{"type":"record","name":"x.Wrapper","fields":[{"name":"kind","type":"x.Kind"}]}"#;
        let parsed = parse(
            r#"{"type":"record","name":"x.Top","fields":[{"name":"w","type":"x.Wrapper"}]}"#,
            &[
                ResolvedReference::new("x.Kind", base),
                ResolvedReference::new("x.Wrapper", mid),
            ],
        )
        .unwrap();
        assert!(parsed.resolve_name("x.Wrapper").is_some());
        assert!(parsed.resolve_name("x.Kind").is_some());
    }
}
