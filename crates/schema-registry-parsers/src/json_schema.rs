//! JSON Schema parsing, canonicalization, and `$ref` resolution
//!
//! A schema document is any valid JSON object or boolean. The canonical
//! form is the compact, key-sorted rendering. External references resolve
//! by the name the referencing document uses (optionally with a `#/...`
//! fragment); `#/...` alone resolves within the current document.

use std::collections::HashMap;

use serde_json::Value;

use schema_registry_core::{RegistryError, Result};

use crate::ResolvedReference;

const KNOWN_TYPES: [&str; 7] = [
    "null", "boolean", "object", "array", "number", "string", "integer",
];

/// A parsed JSON Schema with its external reference set
#[derive(Debug, Clone)]
pub struct JsonParsed {
    root: Value,
    externals: HashMap<String, Value>,
    canonical: String,
}

impl JsonParsed {
    pub fn parse(text: &str, references: &[ResolvedReference]) -> Result<JsonParsed> {
        let mut externals = HashMap::new();
        for reference in references {
            let value: Value = serde_json::from_str(&reference.text).map_err(|e| {
                RegistryError::invalid_schema(format!(
                    "reference '{}' is not valid JSON: {e}",
                    reference.name
                ))
            })?;
            validate_document(&value)?;
            externals.insert(reference.name.clone(), value);
        }

        let root: Value = serde_json::from_str(text)
            .map_err(|e| RegistryError::invalid_schema(format!("invalid JSON: {e}")))?;
        validate_document(&root)?;

        let parsed = JsonParsed {
            // serde_json's default map keeps keys sorted, which makes the
            // compact rendering canonical
            canonical: root.to_string(),
            root,
            externals,
        };
        parsed.check_references(&parsed.root, 0)?;
        Ok(parsed)
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn resolver(&self) -> RefResolver<'_> {
        RefResolver {
            externals: &self.externals,
        }
    }

    /// Canonical rendering with external references inlined
    pub fn resolved(&self) -> Result<String> {
        let mut copy = self.root.clone();
        let mut stack = Vec::new();
        inline_externals(&mut copy, &self.externals, &mut stack)?;
        Ok(copy.to_string())
    }

    /// Every `$ref` in the document must resolve, locally or externally
    fn check_references(&self, value: &Value, depth: usize) -> Result<()> {
        if depth > 128 {
            return Err(RegistryError::invalid_schema("schema nesting too deep"));
        }
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    self.resolver().target(&self.root, reference)?;
                }
                for child in map.values() {
                    self.check_references(child, depth + 1)?;
                }
            }
            Value::Array(items) => {
                for child in items {
                    self.check_references(child, depth + 1)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Resolves `$ref` chains against a document and its external set
#[derive(Debug, Clone, Copy)]
pub struct RefResolver<'a> {
    externals: &'a HashMap<String, Value>,
}

impl<'a> RefResolver<'a> {
    /// Follow `$ref` chains from `node`. Returns the target together with
    /// the document its own local references resolve against.
    pub fn deref(&self, root: &'a Value, node: &'a Value) -> Result<(&'a Value, &'a Value)> {
        let mut root = root;
        let mut node = node;
        let mut hops = 0;
        while let Some(Value::String(reference)) = node.as_object().and_then(|m| m.get("$ref")) {
            hops += 1;
            if hops > 64 {
                return Err(RegistryError::invalid_schema(format!(
                    "circular $ref chain at '{reference}'"
                )));
            }
            let (next_root, next_node) = self.target(root, reference)?;
            root = next_root;
            node = next_node;
        }
        Ok((node, root))
    }

    /// Resolve one reference string to (owning document, node)
    fn target(&self, root: &'a Value, reference: &str) -> Result<(&'a Value, &'a Value)> {
        if let Some(pointer) = reference.strip_prefix('#') {
            return Ok((root, resolve_pointer(root, pointer, reference)?));
        }
        let (name, fragment) = match reference.split_once('#') {
            Some((name, fragment)) => (name, Some(fragment)),
            None => (reference, None),
        };
        let external = self.externals.get(name).ok_or_else(|| {
            RegistryError::invalid_schema(format!("unresolved reference '{reference}'"))
        })?;
        match fragment {
            Some(pointer) => Ok((external, resolve_pointer(external, pointer, reference)?)),
            None => Ok((external, external)),
        }
    }
}

fn resolve_pointer<'a>(root: &'a Value, pointer: &str, reference: &str) -> Result<&'a Value> {
    if pointer.is_empty() {
        return Ok(root);
    }
    let mut current = root;
    for token in pointer.trim_start_matches('/').split('/') {
        let token = token.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(map) => map.get(&token),
            Value::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
        .ok_or_else(|| {
            RegistryError::invalid_schema(format!("unresolved reference '{reference}'"))
        })?;
    }
    Ok(current)
}

fn validate_document(value: &Value) -> Result<()> {
    match value {
        Value::Bool(_) => Ok(()),
        Value::Object(map) => {
            match map.get("type") {
                None => {}
                Some(Value::String(t)) if KNOWN_TYPES.contains(&t.as_str()) => {}
                Some(Value::Array(types))
                    if types.iter().all(|t| {
                        t.as_str().is_some_and(|t| KNOWN_TYPES.contains(&t))
                    }) => {}
                Some(other) => {
                    return Err(RegistryError::invalid_schema(format!(
                        "invalid \"type\" value {other}"
                    )))
                }
            }
            Ok(())
        }
        other => Err(RegistryError::invalid_schema(format!(
            "schema must be an object or boolean, found {other}"
        ))),
    }
}

fn inline_externals(
    value: &mut Value,
    externals: &HashMap<String, Value>,
    stack: &mut Vec<String>,
) -> Result<()> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                let name = reference
                    .split_once('#')
                    .map(|(name, _)| name)
                    .unwrap_or(reference);
                if !name.is_empty() {
                    if let Some(external) = externals.get(name) {
                        if stack.iter().any(|seen| seen == name) {
                            return Err(RegistryError::invalid_schema(format!(
                                "circular reference through '{name}'"
                            )));
                        }
                        stack.push(name.to_string());
                        let mut replacement = external.clone();
                        inline_externals(&mut replacement, externals, stack)?;
                        stack.pop();
                        *value = replacement;
                        return Ok(());
                    }
                }
            }
            for child in map.values_mut() {
                inline_externals(child, externals, stack)?;
            }
        }
        Value::Array(items) => {
            for child in items {
                inline_externals(child, externals, stack)?;
            }
        }
        _ => {}
    }
    Ok(())
}
