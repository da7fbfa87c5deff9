//! JSON Schema compatibility, reader vs writer
//!
//! The question at every path is "can the reader accept any document the
//! writer could emit". The content model of the writer (open, closed, or
//! partially open through `additionalProperties`) decides how unknown
//! properties are judged, and sum types distribute: every writer branch
//! must land somewhere in the reader.

use std::collections::HashSet;

use regex::Regex;
use serde_json::{Map, Value};

use schema_registry_parsers::json_schema::JsonParsed;

use crate::violation::{join_path, Violation, ViolationKind};

/// Can `reader` accept every document `writer` may emit?
pub fn can_read(reader: &JsonParsed, writer: &JsonParsed) -> Vec<Violation> {
    let mut ctx = Ctx {
        reader,
        writer,
        violations: Vec::new(),
        seen: HashSet::new(),
    };
    ctx.check(
        "",
        Side::root(reader.root()),
        Side::root(writer.root()),
    );
    ctx.violations
}

/// A schema node plus the document its local `$ref`s resolve against
#[derive(Clone, Copy)]
struct Side<'a> {
    node: &'a Value,
    root: &'a Value,
}

impl<'a> Side<'a> {
    fn root(node: &'a Value) -> Side<'a> {
        Side { node, root: node }
    }

    fn with(&self, node: &'a Value) -> Side<'a> {
        Side {
            node,
            root: self.root,
        }
    }
}

struct Ctx<'a> {
    reader: &'a JsonParsed,
    writer: &'a JsonParsed,
    violations: Vec<Violation>,
    /// (reader node, writer node) pairs already visited, to terminate on
    /// recursive references
    seen: HashSet<(usize, usize)>,
}

const MIN_BOUNDS: [&str; 5] = [
    "minimum",
    "exclusiveMinimum",
    "minLength",
    "minItems",
    "minProperties",
];
const MAX_BOUNDS: [&str; 5] = [
    "maximum",
    "exclusiveMaximum",
    "maxLength",
    "maxItems",
    "maxProperties",
];

impl<'a> Ctx<'a> {
    fn check(&mut self, path: &str, reader: Side<'a>, writer: Side<'a>) {
        let reader = match self.deref(self.reader, reader, path) {
            Some(side) => side,
            None => return,
        };
        let writer = match self.deref(self.writer, writer, path) {
            Some(side) => side,
            None => return,
        };

        let key = (
            reader.node as *const Value as usize,
            writer.node as *const Value as usize,
        );
        if !self.seen.insert(key) {
            return;
        }

        // boolean schemas
        if writer.node == &Value::Bool(false) {
            return; // writer emits nothing
        }
        if let Value::Bool(accepts) = reader.node {
            if !accepts {
                self.violations.push(Violation::breaking(
                    ViolationKind::ConstraintTightened,
                    path,
                    "reader accepts nothing but the writer may emit documents",
                ));
            }
            return;
        }
        if writer.node == &Value::Bool(true) || writer.node.as_object().is_none() {
            if !is_unconstrained(reader.node) {
                self.violations.push(Violation::breaking(
                    ViolationKind::ConstraintTightened,
                    path,
                    "reader constrains documents the writer may emit freely",
                ));
            }
            return;
        }

        let (Some(rn), Some(wn)) = (reader.node.as_object(), writer.node.as_object()) else {
            return;
        };

        // writer sum types distribute: every branch must be readable, and
        // each branch recursion performs the remaining checks
        let mut distributed = false;
        for keyword in ["oneOf", "anyOf"] {
            if let Some(Value::Array(branches)) = wn.get(keyword) {
                distributed = true;
                for (i, branch) in branches.iter().enumerate() {
                    let before = self.breaking_count();
                    self.check(path, reader, writer.with(branch));
                    if self.breaking_count() > before {
                        // keep the detail, add which branch broke
                        self.violations.push(Violation::breaking(
                            ViolationKind::UnionBranchUncovered,
                            path,
                            format!("writer {keyword} branch {i} is not accepted by the reader"),
                        ));
                    }
                }
            }
        }
        if distributed {
            return;
        }

        // reader sum types: the writer must land in some branch
        for keyword in ["oneOf", "anyOf"] {
            if let Some(Value::Array(branches)) = rn.get(keyword) {
                if !branches
                    .iter()
                    .any(|branch| self.probe(reader.with(branch), writer))
                {
                    self.violations.push(Violation::breaking(
                        ViolationKind::UnionBranchUncovered,
                        path,
                        format!("no reader {keyword} branch accepts the writer schema"),
                    ));
                }
            }
        }

        // every reader conjunct is an extra gate the writer must pass
        if let Some(Value::Array(conjuncts)) = rn.get("allOf") {
            for conjunct in conjuncts {
                self.check(path, reader.with(conjunct), writer);
            }
        }

        if rn.contains_key("not") && rn.get("not") != wn.get("not") {
            self.violations.push(Violation::breaking(
                ViolationKind::ConstraintTightened,
                path,
                "reader adds or changes a 'not' constraint",
            ));
        }

        self.check_types(path, rn, wn);
        self.check_values(path, rn, wn);
        self.check_bounds(path, rn, wn);
        self.check_required(path, rn, wn);
        self.check_properties(path, reader, writer, rn, wn);
        self.check_items(path, reader, writer, rn, wn);
    }

    fn check_types(&mut self, path: &str, rn: &Map<String, Value>, wn: &Map<String, Value>) {
        let reader_types = match type_set(rn) {
            Some(types) => types,
            None => return, // reader takes any type
        };
        let writer_types = match type_set(wn).or_else(|| inferred_types(wn)) {
            Some(types) => types,
            None => {
                self.violations.push(Violation::breaking(
                    ViolationKind::TypeChanged,
                    path,
                    format!(
                        "reader restricts type to [{}] but the writer allows any type",
                        reader_types.join(", ")
                    ),
                ));
                return;
            }
        };
        let uncovered: Vec<&String> = writer_types
            .iter()
            .filter(|wt| {
                !(reader_types.contains(wt)
                    || (wt.as_str() == "integer" && reader_types.iter().any(|t| t == "number")))
            })
            .collect();
        if !uncovered.is_empty() {
            self.violations.push(Violation::breaking(
                ViolationKind::TypeChanged,
                path,
                format!(
                    "writer may emit type {} the reader does not accept",
                    uncovered
                        .iter()
                        .map(|t| format!("'{t}'"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
    }

    fn check_values(&mut self, path: &str, rn: &Map<String, Value>, wn: &Map<String, Value>) {
        let writer_values: Option<Vec<&Value>> = match (wn.get("const"), wn.get("enum")) {
            (Some(c), _) => Some(vec![c]),
            (None, Some(Value::Array(values))) => Some(values.iter().collect()),
            _ => None,
        };

        if let Some(reader_const) = rn.get("const") {
            match &writer_values {
                Some(values) if values.iter().all(|v| *v == reader_const) => {}
                _ => self.violations.push(Violation::breaking(
                    ViolationKind::ConstraintTightened,
                    path,
                    "reader adds or changes a 'const' the writer does not guarantee",
                )),
            }
            return;
        }

        if let Some(Value::Array(reader_enum)) = rn.get("enum") {
            match &writer_values {
                Some(values) => {
                    let missing: Vec<String> = values
                        .iter()
                        .filter(|v| !reader_enum.contains(v))
                        .map(|v| v.to_string())
                        .collect();
                    if !missing.is_empty() {
                        self.violations.push(Violation::breaking(
                            ViolationKind::EnumValueRemoved,
                            path,
                            format!(
                                "writer may emit enum value(s) [{}] removed from the reader",
                                missing.join(", ")
                            ),
                        ));
                    }
                }
                None => self.violations.push(Violation::breaking(
                    ViolationKind::ConstraintTightened,
                    path,
                    "reader adds an 'enum' constraint the writer does not have",
                )),
            }
        }
    }

    fn check_bounds(&mut self, path: &str, rn: &Map<String, Value>, wn: &Map<String, Value>) {
        for key in MIN_BOUNDS {
            if let Some(reader_bound) = rn.get(key).and_then(Value::as_f64) {
                match wn.get(key).and_then(Value::as_f64) {
                    Some(writer_bound) if reader_bound <= writer_bound => {}
                    Some(writer_bound) => self.violations.push(Violation::breaking(
                        ViolationKind::ConstraintTightened,
                        path,
                        format!("'{key}' raised from {writer_bound} to {reader_bound}"),
                    )),
                    None => self.violations.push(Violation::breaking(
                        ViolationKind::ConstraintTightened,
                        path,
                        format!("'{key}' added by the reader"),
                    )),
                }
            }
        }
        for key in MAX_BOUNDS {
            if let Some(reader_bound) = rn.get(key).and_then(Value::as_f64) {
                match wn.get(key).and_then(Value::as_f64) {
                    Some(writer_bound) if reader_bound >= writer_bound => {}
                    Some(writer_bound) => self.violations.push(Violation::breaking(
                        ViolationKind::ConstraintTightened,
                        path,
                        format!("'{key}' lowered from {writer_bound} to {reader_bound}"),
                    )),
                    None => self.violations.push(Violation::breaking(
                        ViolationKind::ConstraintTightened,
                        path,
                        format!("'{key}' added by the reader"),
                    )),
                }
            }
        }

        if let Some(reader_mult) = rn.get("multipleOf").and_then(Value::as_f64) {
            let compatible = wn
                .get("multipleOf")
                .and_then(Value::as_f64)
                .is_some_and(|writer_mult| {
                    reader_mult != 0.0 && (writer_mult / reader_mult).fract().abs() < 1e-9
                });
            if !compatible {
                self.violations.push(Violation::breaking(
                    ViolationKind::ConstraintTightened,
                    path,
                    "'multipleOf' added or not a divisor of the writer's",
                ));
            }
        }

        if let Some(reader_pattern) = rn.get("pattern").and_then(Value::as_str) {
            if wn.get("pattern").and_then(Value::as_str) != Some(reader_pattern) {
                self.violations.push(Violation::breaking(
                    ViolationKind::ConstraintTightened,
                    path,
                    "'pattern' added or changed by the reader",
                ));
            }
        }

        if rn.get("uniqueItems") == Some(&Value::Bool(true))
            && wn.get("uniqueItems") != Some(&Value::Bool(true))
        {
            self.violations.push(Violation::breaking(
                ViolationKind::ConstraintTightened,
                path,
                "'uniqueItems' enabled by the reader",
            ));
        }
    }

    fn check_required(&mut self, path: &str, rn: &Map<String, Value>, wn: &Map<String, Value>) {
        let writer_required = string_set(wn.get("required"));
        for name in string_set(rn.get("required")) {
            if !writer_required.contains(&name) {
                self.violations.push(Violation::breaking(
                    ViolationKind::RequiredAdded,
                    join_path(path, &name),
                    format!("property '{name}' is required by the reader but the writer may omit it"),
                ));
            }
        }
    }

    fn check_properties(
        &mut self,
        path: &str,
        reader: Side<'a>,
        writer: Side<'a>,
        rn: &'a Map<String, Value>,
        wn: &'a Map<String, Value>,
    ) {
        let rprops = rn.get("properties").and_then(Value::as_object);
        let wprops = wn.get("properties").and_then(Value::as_object);

        for (name, wprop) in wprops.into_iter().flatten() {
            let child_path = join_path(path, name);
            if let Some(rprop) = rprops.and_then(|props| props.get(name)) {
                self.check(&child_path, reader.with(rprop), writer.with(wprop));
            } else if let Some(pattern_schema) = pattern_property(rn, name) {
                self.check(&child_path, reader.with(pattern_schema), writer.with(wprop));
            } else {
                match content_model(rn) {
                    ContentModel::Open => {}
                    ContentModel::Closed => self.violations.push(Violation::breaking(
                        ViolationKind::FieldRemoved,
                        child_path,
                        format!(
                            "property '{name}' may be emitted by the writer but the reader rejects unknown properties"
                        ),
                    )),
                    ContentModel::Partial(schema) => {
                        self.check(&child_path, reader.with(schema), writer.with(wprop))
                    }
                }
            }
        }

        for (name, rprop) in rprops.into_iter().flatten() {
            if wprops.is_some_and(|props| props.contains_key(name)) {
                continue;
            }
            let child_path = join_path(path, name);
            if let Some(pattern_schema) = pattern_property(wn, name) {
                self.check(&child_path, reader.with(rprop), writer.with(pattern_schema));
                continue;
            }
            match content_model(wn) {
                ContentModel::Closed => {} // writer never emits it
                ContentModel::Partial(schema) => {
                    self.check(&child_path, reader.with(rprop), writer.with(schema))
                }
                ContentModel::Open => {
                    if !is_unconstrained(rprop) {
                        self.violations.push(Violation::breaking(
                            ViolationKind::TypeChanged,
                            child_path,
                            format!(
                                "reader constrains property '{name}' which an open writer may emit with any type"
                            ),
                        ));
                    }
                }
            }
        }

        // narrowing of the unknown-property policy itself
        match (content_model(rn), content_model(wn)) {
            (ContentModel::Closed, ContentModel::Open) => {
                self.violations.push(Violation::breaking(
                    ViolationKind::ConstraintTightened,
                    path,
                    "reader closes a content model the writer leaves open",
                ))
            }
            (ContentModel::Closed, ContentModel::Partial(_)) => {
                self.violations.push(Violation::breaking(
                    ViolationKind::ConstraintTightened,
                    path,
                    "reader rejects additional properties the writer may emit",
                ))
            }
            (ContentModel::Partial(rs), ContentModel::Partial(ws)) => {
                self.check(
                    &join_path(path, "additionalProperties"),
                    reader.with(rs),
                    writer.with(ws),
                )
            }
            (ContentModel::Partial(rs), ContentModel::Open) => {
                if !is_unconstrained(rs) {
                    self.violations.push(Violation::breaking(
                        ViolationKind::ConstraintTightened,
                        path,
                        "reader constrains additional properties the writer may emit freely",
                    ));
                }
            }
            _ => {}
        }
    }

    fn check_items(
        &mut self,
        path: &str,
        reader: Side<'a>,
        writer: Side<'a>,
        rn: &'a Map<String, Value>,
        wn: &'a Map<String, Value>,
    ) {
        let items_path = join_path(path, "items");
        match (tuple_items(rn), tuple_items(wn)) {
            (Some(rtuple), Some(wtuple)) => {
                for (i, (ritem, witem)) in rtuple.iter().zip(wtuple.iter()).enumerate() {
                    self.check(
                        &join_path(path, &format!("items[{i}]")),
                        reader.with(ritem),
                        writer.with(witem),
                    );
                }
                if rtuple.len() > wtuple.len() {
                    // writer may emit the extra positions via its
                    // additional-items policy
                    for (i, ritem) in rtuple.iter().enumerate().skip(wtuple.len()) {
                        match additional_items(wn) {
                            ContentModel::Closed => {}
                            ContentModel::Partial(schema) => self.check(
                                &join_path(path, &format!("items[{i}]")),
                                reader.with(ritem),
                                writer.with(schema),
                            ),
                            ContentModel::Open => {
                                if !is_unconstrained(ritem) {
                                    self.violations.push(Violation::breaking(
                                        ViolationKind::ConstraintTightened,
                                        join_path(path, &format!("items[{i}]")),
                                        "reader constrains a tuple position the writer leaves open",
                                    ));
                                }
                            }
                        }
                    }
                }
                if wtuple.len() > rtuple.len() {
                    for (i, witem) in wtuple.iter().enumerate().skip(rtuple.len()) {
                        match additional_items(rn) {
                            ContentModel::Open => {}
                            ContentModel::Partial(schema) => self.check(
                                &join_path(path, &format!("items[{i}]")),
                                reader.with(schema),
                                writer.with(witem),
                            ),
                            ContentModel::Closed => self.violations.push(Violation::breaking(
                                ViolationKind::FieldRemoved,
                                join_path(path, &format!("items[{i}]")),
                                "writer may emit a tuple position the reader rejects",
                            )),
                        }
                    }
                }
            }
            (Some(rtuple), None) => {
                if let Some(witems) = schema_items(wn) {
                    for (i, ritem) in rtuple.iter().enumerate() {
                        self.check(
                            &join_path(path, &format!("items[{i}]")),
                            reader.with(ritem),
                            writer.with(witems),
                        );
                    }
                }
            }
            (None, Some(wtuple)) => {
                if let Some(ritems) = schema_items(rn) {
                    for (i, witem) in wtuple.iter().enumerate() {
                        self.check(
                            &join_path(path, &format!("items[{i}]")),
                            reader.with(ritems),
                            writer.with(witem),
                        );
                    }
                }
            }
            (None, None) => {
                if let (Some(ritems), Some(witems)) = (schema_items(rn), schema_items(wn)) {
                    self.check(&items_path, reader.with(ritems), writer.with(witems));
                } else if let (Some(ritems), None) = (schema_items(rn), schema_items(wn)) {
                    if !is_unconstrained(ritems) {
                        self.violations.push(Violation::breaking(
                            ViolationKind::ConstraintTightened,
                            items_path,
                            "reader constrains array items the writer leaves open",
                        ));
                    }
                }
            }
        }
    }

    fn deref(&mut self, parsed: &'a JsonParsed, side: Side<'a>, path: &str) -> Option<Side<'a>> {
        match parsed.resolver().deref(side.root, side.node) {
            Ok((node, root)) => Some(Side { node, root }),
            Err(e) => {
                self.violations.push(Violation::breaking(
                    ViolationKind::TypeChanged,
                    path,
                    e.to_string(),
                ));
                None
            }
        }
    }

    fn breaking_count(&self) -> usize {
        self.violations.iter().filter(|v| v.is_breaking()).count()
    }

    /// Silent acceptance test used for sum-type branch matching
    fn probe(&self, reader: Side<'a>, writer: Side<'a>) -> bool {
        let mut scratch = Ctx {
            reader: self.reader,
            writer: self.writer,
            violations: Vec::new(),
            seen: self.seen.clone(),
        };
        scratch.check("", reader, writer);
        scratch.violations.iter().all(|v| !v.is_breaking())
    }
}

/// Writer openness to properties it does not declare
enum ContentModel<'a> {
    Open,
    Closed,
    Partial(&'a Value),
}

fn content_model(node: &Map<String, Value>) -> ContentModel<'_> {
    match node.get("additionalProperties") {
        None | Some(Value::Bool(true)) => ContentModel::Open,
        Some(Value::Bool(false)) => ContentModel::Closed,
        Some(schema) => ContentModel::Partial(schema),
    }
}

fn additional_items(node: &Map<String, Value>) -> ContentModel<'_> {
    match node.get("additionalItems") {
        None | Some(Value::Bool(true)) => ContentModel::Open,
        Some(Value::Bool(false)) => ContentModel::Closed,
        Some(schema) => ContentModel::Partial(schema),
    }
}

fn tuple_items(node: &Map<String, Value>) -> Option<&Vec<Value>> {
    if let Some(Value::Array(items)) = node.get("prefixItems") {
        return Some(items);
    }
    match node.get("items") {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn schema_items(node: &Map<String, Value>) -> Option<&Value> {
    match node.get("items") {
        Some(items @ (Value::Object(_) | Value::Bool(_))) => Some(items),
        _ => None,
    }
}

fn pattern_property<'a>(node: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    let patterns = node.get("patternProperties")?.as_object()?;
    for (pattern, schema) in patterns {
        if Regex::new(pattern).is_ok_and(|re| re.is_match(name)) {
            return Some(schema);
        }
    }
    None
}

fn type_set(node: &Map<String, Value>) -> Option<Vec<String>> {
    match node.get("type") {
        Some(Value::String(t)) => Some(vec![t.clone()]),
        Some(Value::Array(types)) => Some(
            types
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    }
}

/// Infer the writer's emitted types from `const`/`enum` when it has no
/// explicit `type`
fn inferred_types(node: &Map<String, Value>) -> Option<Vec<String>> {
    let values: Vec<&Value> = match (node.get("const"), node.get("enum")) {
        (Some(c), _) => vec![c],
        (None, Some(Value::Array(values))) => values.iter().collect(),
        _ => return None,
    };
    let mut types: Vec<String> = Vec::new();
    for value in values {
        let t = match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        if !types.iter().any(|existing| existing == t) {
            types.push(t.to_string());
        }
    }
    Some(types)
}

fn string_set(value: Option<&Value>) -> HashSet<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// A node that accepts any document at all
fn is_unconstrained(node: &Value) -> bool {
    const CONSTRAINING: [&str; 22] = [
        "type",
        "enum",
        "const",
        "pattern",
        "required",
        "minimum",
        "maximum",
        "exclusiveMinimum",
        "exclusiveMaximum",
        "minLength",
        "maxLength",
        "minItems",
        "maxItems",
        "minProperties",
        "maxProperties",
        "multipleOf",
        "uniqueItems",
        "allOf",
        "anyOf",
        "oneOf",
        "not",
        "$ref",
    ];
    match node {
        Value::Bool(accepts) => *accepts,
        Value::Object(map) => {
            !CONSTRAINING.iter().any(|k| map.contains_key(*k))
                && !matches!(map.get("additionalProperties"), Some(Value::Bool(false)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> JsonParsed {
        JsonParsed::parse(text, &[]).unwrap()
    }

    fn breaking(reader: &str, writer: &str) -> Vec<Violation> {
        can_read(&parse(reader), &parse(writer))
            .into_iter()
            .filter(Violation::is_breaking)
            .collect()
    }

    #[test]
    fn identical_schemas_are_compatible() {
        let schema = r#"{"type":"object","properties":{"a":{"type":"string"}}}"#;
        assert!(breaking(schema, schema).is_empty());
    }

    #[test]
    fn integer_widens_to_number() {
        assert!(breaking(r#"{"type":"number"}"#, r#"{"type":"integer"}"#).is_empty());
        assert!(!breaking(r#"{"type":"integer"}"#, r#"{"type":"number"}"#).is_empty());
    }

    #[test]
    fn type_union_must_cover_writer() {
        assert!(breaking(
            r#"{"type":["string","null"]}"#,
            r#"{"type":"string"}"#
        )
        .is_empty());
        let violations = breaking(r#"{"type":"string"}"#, r#"{"type":["string","null"]}"#);
        assert_eq!(violations[0].kind, ViolationKind::TypeChanged);
    }

    #[test]
    fn new_required_property_is_breaking() {
        let writer = r#"{"type":"object","properties":{"a":{"type":"string"}}}"#;
        let reader = r#"{"type":"object","properties":{"a":{"type":"string"},
            "b":{"type":"string"}},"required":["b"]}"#;
        let violations = breaking(reader, writer);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::RequiredAdded));
    }

    #[test]
    fn open_writer_makes_new_constrained_property_breaking() {
        // writer is open, so it may already emit "b" with any type
        let writer = r#"{"type":"object","properties":{"a":{"type":"string"}}}"#;
        let reader = r#"{"type":"object","properties":{"a":{"type":"string"},
            "b":{"type":"integer"}}}"#;
        let violations = breaking(reader, writer);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::TypeChanged));
    }

    #[test]
    fn closed_writer_allows_new_reader_property() {
        let writer = r#"{"type":"object","properties":{"a":{"type":"string"}},
            "additionalProperties":false}"#;
        let reader = r#"{"type":"object","properties":{"a":{"type":"string"},
            "b":{"type":"integer"}},"additionalProperties":false}"#;
        assert!(breaking(reader, writer).is_empty());
    }

    #[test]
    fn partially_open_writer_checks_against_its_additional_schema() {
        let writer = r#"{"type":"object","properties":{"a":{"type":"string"}},
            "additionalProperties":{"type":"integer"}}"#;
        let ok_reader = r#"{"type":"object","properties":{"a":{"type":"string"},
            "b":{"type":"integer"}},"additionalProperties":{"type":"integer"}}"#;
        let bad_reader = r#"{"type":"object","properties":{"a":{"type":"string"},
            "b":{"type":"string"}},"additionalProperties":{"type":"integer"}}"#;
        assert!(breaking(ok_reader, writer).is_empty());
        assert!(!breaking(bad_reader, writer).is_empty());
    }

    #[test]
    fn reader_closing_content_model_is_breaking() {
        let writer = r#"{"type":"object","properties":{"a":{"type":"string"}}}"#;
        let reader = r#"{"type":"object","properties":{"a":{"type":"string"}},
            "additionalProperties":false}"#;
        let violations = breaking(reader, writer);
        assert!(!violations.is_empty());
    }

    #[test]
    fn removed_writer_property_under_closed_reader_is_breaking() {
        let writer = r#"{"type":"object","properties":{"a":{"type":"string"},
            "b":{"type":"string"}},"additionalProperties":false}"#;
        let reader = r#"{"type":"object","properties":{"a":{"type":"string"}},
            "additionalProperties":false}"#;
        let violations = breaking(reader, writer);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::FieldRemoved));
    }

    #[test]
    fn enum_narrowing_is_breaking_widening_is_not() {
        let writer = r#"{"type":"string","enum":["a","b"]}"#;
        assert!(breaking(r#"{"type":"string","enum":["a","b","c"]}"#, writer).is_empty());
        let violations = breaking(r#"{"type":"string","enum":["a"]}"#, writer);
        assert_eq!(violations[0].kind, ViolationKind::EnumValueRemoved);
        // dropping the enum entirely is fine
        assert!(breaking(r#"{"type":"string"}"#, writer).is_empty());
    }

    #[test]
    fn const_change_is_breaking() {
        let writer = r#"{"const":"fixed"}"#;
        assert!(breaking(r#"{"const":"fixed"}"#, writer).is_empty());
        assert!(!breaking(r#"{"const":"other"}"#, writer).is_empty());
        assert!(!breaking(r#"{"type":"string","const":"x"}"#, r#"{"type":"string"}"#).is_empty());
    }

    #[test]
    fn bound_tightening_is_breaking() {
        let writer = r#"{"type":"integer","minimum":0,"maximum":100}"#;
        assert!(breaking(r#"{"type":"integer","minimum":0,"maximum":100}"#, writer).is_empty());
        assert!(breaking(r#"{"type":"integer","minimum":-5,"maximum":200}"#, writer).is_empty());
        assert!(!breaking(r#"{"type":"integer","minimum":1,"maximum":100}"#, writer).is_empty());
        assert!(!breaking(r#"{"type":"integer","minimum":0,"maximum":99}"#, writer).is_empty());
        assert!(!breaking(r#"{"type":"integer","minimum":0,"maximum":100,"multipleOf":2}"#, writer).is_empty());
    }

    #[test]
    fn pattern_rules() {
        let writer = r#"{"type":"string","pattern":"^a"}"#;
        assert!(breaking(r#"{"type":"string","pattern":"^a"}"#, writer).is_empty());
        assert!(!breaking(r#"{"type":"string","pattern":"^b"}"#, writer).is_empty());
        // removal is fine
        assert!(breaking(r#"{"type":"string"}"#, writer).is_empty());
        // addition is not
        assert!(!breaking(writer, r#"{"type":"string"}"#).is_empty());
    }

    #[test]
    fn unique_items_enablement_is_breaking() {
        let writer = r#"{"type":"array","items":{"type":"integer"}}"#;
        let reader = r#"{"type":"array","items":{"type":"integer"},"uniqueItems":true}"#;
        assert!(!breaking(reader, writer).is_empty());
    }

    #[test]
    fn tuple_items_compare_by_position() {
        let writer = r#"{"type":"array","items":[{"type":"string"},{"type":"integer"}]}"#;
        let same = r#"{"type":"array","items":[{"type":"string"},{"type":"integer"}]}"#;
        let changed = r#"{"type":"array","items":[{"type":"string"},{"type":"string"}]}"#;
        assert!(breaking(same, writer).is_empty());
        assert!(!breaking(changed, writer).is_empty());

        // writer emits a third position the closed reader rejects
        let longer_writer = r#"{"type":"array","items":[{"type":"string"},{"type":"integer"},
            {"type":"boolean"}],"additionalItems":false}"#;
        let closed_reader = r#"{"type":"array","items":[{"type":"string"},{"type":"integer"}],
            "additionalItems":false}"#;
        assert!(!breaking(closed_reader, longer_writer).is_empty());
    }

    #[test]
    fn writer_sum_branches_must_all_be_readable() {
        let writer = r#"{"oneOf":[{"type":"string"},{"type":"integer"}]}"#;
        let wide_reader = r#"{"oneOf":[{"type":"string"},{"type":"integer"},{"type":"null"}]}"#;
        let narrow_reader = r#"{"oneOf":[{"type":"string"}]}"#;
        assert!(breaking(wide_reader, writer).is_empty());
        assert!(!breaking(narrow_reader, writer).is_empty());
    }

    #[test]
    fn reader_allof_gates_the_writer() {
        let writer = r#"{"type":"integer","minimum":0}"#;
        let reader = r#"{"allOf":[{"type":"integer"},{"minimum":5}]}"#;
        assert!(!breaking(reader, writer).is_empty());
        let subsumed = r#"{"allOf":[{"type":"integer"},{"minimum":0}]}"#;
        assert!(breaking(subsumed, writer).is_empty());
    }

    #[test]
    fn local_refs_are_followed() {
        let writer = r##"{"definitions":{"id":{"type":"integer"}},
            "type":"object","properties":{"id":{"$ref":"#/definitions/id"}}}"##;
        let reader_ok = r##"{"definitions":{"id":{"type":"number"}},
            "type":"object","properties":{"id":{"$ref":"#/definitions/id"}}}"##;
        let reader_bad = r##"{"definitions":{"id":{"type":"string"}},
            "type":"object","properties":{"id":{"$ref":"#/definitions/id"}}}"##;
        assert!(breaking(reader_ok, writer).is_empty());
        assert!(!breaking(reader_bad, writer).is_empty());
    }

    #[test]
    fn recursive_schemas_terminate() {
        let tree = r##"{"definitions":{"node":{"type":"object","properties":{
            "children":{"type":"array","items":{"$ref":"#/definitions/node"}}}}},
            "$ref":"#/definitions/node"}"##;
        assert!(breaking(tree, tree).is_empty());
    }
}
