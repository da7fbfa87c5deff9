//! Protocol Buffers schema parsing and canonicalization
//!
//! Parses proto2/proto3 text into a structural AST: messages (with
//! nesting), enums, oneofs, map fields, and reserved declarations. Field
//! identity for the compatibility engine is the tag number, so the AST
//! keeps tags, labels, types, and oneof membership.

mod parser;

use std::collections::HashMap;

use schema_registry_core::{RegistryError, Result};

use crate::ResolvedReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

#[derive(Debug, Clone)]
pub struct ProtoFile {
    pub syntax: Syntax,
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub messages: Vec<Message>,
    pub enums: Vec<EnumDef>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    /// All fields, oneof members included (see [`Field::oneof`])
    pub fields: Vec<Field>,
    /// Declared oneof names, in order
    pub oneofs: Vec<String>,
    pub messages: Vec<Message>,
    pub enums: Vec<EnumDef>,
    /// Inclusive reserved tag ranges
    pub reserved_numbers: Vec<(u32, u32)>,
    pub reserved_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    None,
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Map(Box<FieldType>, Box<FieldType>),
    /// Message or enum type, as written (possibly qualified)
    Named(String),
}

impl FieldType {
    pub fn keyword(&self) -> String {
        match self {
            FieldType::Double => "double".into(),
            FieldType::Float => "float".into(),
            FieldType::Int32 => "int32".into(),
            FieldType::Int64 => "int64".into(),
            FieldType::Uint32 => "uint32".into(),
            FieldType::Uint64 => "uint64".into(),
            FieldType::Sint32 => "sint32".into(),
            FieldType::Sint64 => "sint64".into(),
            FieldType::Fixed32 => "fixed32".into(),
            FieldType::Fixed64 => "fixed64".into(),
            FieldType::Sfixed32 => "sfixed32".into(),
            FieldType::Sfixed64 => "sfixed64".into(),
            FieldType::Bool => "bool".into(),
            FieldType::String => "string".into(),
            FieldType::Bytes => "bytes".into(),
            FieldType::Map(k, v) => format!("map<{}, {}>", k.keyword(), v.keyword()),
            FieldType::Named(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub number: u32,
    pub label: Label,
    pub ty: FieldType,
    /// Name of the containing oneof, when any
    pub oneof: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<(String, i32)>,
}

/// Whether a fullname denotes a message or an enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Message,
    Enum,
}

/// A parsed protobuf schema with its import set
#[derive(Debug, Clone)]
pub struct ProtoParsed {
    file: ProtoFile,
    externals: HashMap<String, ProtoFile>,
    canonical: String,
}

impl ProtoParsed {
    pub fn parse(text: &str, references: &[ResolvedReference]) -> Result<ProtoParsed> {
        let mut externals = HashMap::new();
        for reference in references {
            let file = parser::parse(&reference.text).map_err(|e| {
                RegistryError::invalid_schema(format!(
                    "reference '{}': {e}",
                    reference.name
                ))
            })?;
            externals.insert(reference.name.clone(), file);
        }

        let file = parser::parse(text)?;
        for import in &file.imports {
            if !externals.contains_key(import) && !import.starts_with("google/protobuf/") {
                return Err(RegistryError::invalid_schema(format!(
                    "unresolved import '{import}'"
                )));
            }
        }

        let canonical = render(&file);
        Ok(ProtoParsed {
            file,
            externals,
            canonical,
        })
    }

    pub fn file(&self) -> &ProtoFile {
        &self.file
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Imports have no inline form in protobuf, so the resolved flavor is
    /// the canonical rendering
    pub fn resolved(&self) -> String {
        self.canonical.clone()
    }

    /// Messages declared by this file, by fullname (package-qualified,
    /// nested names joined with dots)
    pub fn message_index(&self) -> HashMap<String, &Message> {
        let mut index = HashMap::new();
        let prefix = self.file.package.clone().unwrap_or_default();
        for message in &self.file.messages {
            index_message(message, &prefix, &mut index);
        }
        index
    }

    /// Resolve a type name written in a field to message or enum, looking
    /// at this file first, then imported files
    pub fn type_kind(&self, written: &str) -> Option<TypeKind> {
        let name = written.trim_start_matches('.');
        if let Some(kind) = file_type_kind(&self.file, name) {
            return Some(kind);
        }
        self.externals
            .values()
            .find_map(|file| file_type_kind(file, name))
    }
}

fn index_message<'a>(
    message: &'a Message,
    prefix: &str,
    index: &mut HashMap<String, &'a Message>,
) {
    let fullname = if prefix.is_empty() {
        message.name.clone()
    } else {
        format!("{prefix}.{}", message.name)
    };
    for nested in &message.messages {
        index_message(nested, &fullname, index);
    }
    index.insert(fullname, message);
}

fn file_type_kind(file: &ProtoFile, name: &str) -> Option<TypeKind> {
    let prefix = file.package.clone().unwrap_or_default();
    let mut messages = HashMap::new();
    for message in &file.messages {
        index_message(message, &prefix, &mut messages);
    }
    let matches_name = |fullname: &str| {
        fullname == name || fullname.ends_with(&format!(".{name}"))
    };
    if messages.keys().any(|f| matches_name(f)) {
        return Some(TypeKind::Message);
    }

    let mut enum_names = Vec::new();
    collect_enum_names(&file.enums, &prefix, &mut enum_names);
    for message in &file.messages {
        collect_message_enum_names(message, &prefix, &mut enum_names);
    }
    if enum_names.iter().any(|f| matches_name(f)) {
        return Some(TypeKind::Enum);
    }
    None
}

fn collect_enum_names(enums: &[EnumDef], prefix: &str, out: &mut Vec<String>) {
    for en in enums {
        out.push(if prefix.is_empty() {
            en.name.clone()
        } else {
            format!("{prefix}.{}", en.name)
        });
    }
}

fn collect_message_enum_names(message: &Message, prefix: &str, out: &mut Vec<String>) {
    let fullname = if prefix.is_empty() {
        message.name.clone()
    } else {
        format!("{prefix}.{}", message.name)
    };
    collect_enum_names(&message.enums, &fullname, out);
    for nested in &message.messages {
        collect_message_enum_names(nested, &fullname, out);
    }
}

/// Deterministic canonical rendering: normalized whitespace, no comments
/// or options, two-space indent
fn render(file: &ProtoFile) -> String {
    let mut out = String::new();
    match file.syntax {
        Syntax::Proto2 => out.push_str("syntax = \"proto2\";\n"),
        Syntax::Proto3 => out.push_str("syntax = \"proto3\";\n"),
    }
    if let Some(package) = &file.package {
        out.push_str(&format!("package {package};\n"));
    }
    for import in &file.imports {
        out.push_str(&format!("import \"{import}\";\n"));
    }
    for message in &file.messages {
        out.push('\n');
        render_message(message, 0, &mut out);
    }
    for en in &file.enums {
        out.push('\n');
        render_enum(en, 0, &mut out);
    }
    out
}

fn render_message(message: &Message, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    out.push_str(&format!("{pad}message {} {{\n", message.name));
    let inner = "  ".repeat(depth + 1);

    for field in message.fields.iter().filter(|f| f.oneof.is_none()) {
        render_field(field, &inner, out);
    }
    for oneof in &message.oneofs {
        out.push_str(&format!("{inner}oneof {oneof} {{\n"));
        let member_pad = "  ".repeat(depth + 2);
        for field in message
            .fields
            .iter()
            .filter(|f| f.oneof.as_deref() == Some(oneof.as_str()))
        {
            render_field(field, &member_pad, out);
        }
        out.push_str(&format!("{inner}}}\n"));
    }
    if !message.reserved_numbers.is_empty() {
        let ranges: Vec<String> = message
            .reserved_numbers
            .iter()
            .map(|(lo, hi)| {
                if lo == hi {
                    lo.to_string()
                } else {
                    format!("{lo} to {hi}")
                }
            })
            .collect();
        out.push_str(&format!("{inner}reserved {};\n", ranges.join(", ")));
    }
    if !message.reserved_names.is_empty() {
        let names: Vec<String> = message
            .reserved_names
            .iter()
            .map(|n| format!("\"{n}\""))
            .collect();
        out.push_str(&format!("{inner}reserved {};\n", names.join(", ")));
    }
    for nested in &message.messages {
        render_message(nested, depth + 1, out);
    }
    for en in &message.enums {
        render_enum(en, depth + 1, out);
    }
    out.push_str(&format!("{pad}}}\n"));
}

fn render_field(field: &Field, pad: &str, out: &mut String) {
    let label = match field.label {
        Label::None => "",
        Label::Optional => "optional ",
        Label::Required => "required ",
        Label::Repeated => "repeated ",
    };
    out.push_str(&format!(
        "{pad}{label}{} {} = {};\n",
        field.ty.keyword(),
        field.name,
        field.number
    ));
}

fn render_enum(en: &EnumDef, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    out.push_str(&format!("{pad}enum {} {{\n", en.name));
    let inner = "  ".repeat(depth + 1);
    for (name, number) in &en.values {
        out.push_str(&format!("{inner}{name} = {number};\n"));
    }
    out.push_str(&format!("{pad}}}\n"));
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: &str = r#"
        // order events
        syntax = "proto3";
        package shop.v1;

        import "google/protobuf/timestamp.proto";

        message Order {
            string id = 1;
            repeated Item items = 2;
            map<string, int64> totals = 3;
            oneof payment {
                Card card = 4;
                string voucher_code = 5;
            }
            reserved 6, 10 to 12;
            reserved "legacy_total";

            message Item {
                string sku = 1;
                int32 quantity = 2;
            }
            message Card {
                string pan_token = 1;
            }
            enum Status {
                STATUS_UNSPECIFIED = 0;
                PLACED = 1;
            }
        }
    "#;

    #[test]
    fn parses_and_renders_canonically() {
        let parsed = ProtoParsed::parse(ORDER, &[]).unwrap();
        let canonical = parsed.canonical();
        assert!(canonical.starts_with("syntax = \"proto3\";\npackage shop.v1;\n"));
        assert!(canonical.contains("map<string, int64> totals = 3;"));
        assert!(canonical.contains("oneof payment {"));
        assert!(canonical.contains("reserved 6, 10 to 12;"));
        assert!(!canonical.contains("//"));

        // canonical form is a fixed point
        let again = ProtoParsed::parse(canonical, &[]).unwrap();
        assert_eq!(again.canonical(), canonical);
    }

    #[test]
    fn message_index_uses_fullnames() {
        let parsed = ProtoParsed::parse(ORDER, &[]).unwrap();
        let index = parsed.message_index();
        assert!(index.contains_key("shop.v1.Order"));
        assert!(index.contains_key("shop.v1.Order.Item"));
        let order = index["shop.v1.Order"];
        assert_eq!(order.fields.len(), 5);
        assert_eq!(
            order
                .fields
                .iter()
                .find(|f| f.number == 4)
                .and_then(|f| f.oneof.as_deref()),
            Some("payment")
        );
    }

    #[test]
    fn type_kinds_resolve() {
        let parsed = ProtoParsed::parse(ORDER, &[]).unwrap();
        assert_eq!(parsed.type_kind("Order.Item"), Some(TypeKind::Message));
        assert_eq!(parsed.type_kind("Order.Status"), Some(TypeKind::Enum));
        assert_eq!(parsed.type_kind("shop.v1.Order"), Some(TypeKind::Message));
        assert_eq!(parsed.type_kind("Nope"), None);
    }

    #[test]
    fn unresolved_import_fails() {
        let err = ProtoParsed::parse(
            "syntax = \"proto3\"; import \"missing.proto\"; message M { int32 a = 1; }",
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("unresolved import"));
    }

    #[test]
    fn imports_resolve_from_references() {
        let common = "syntax = \"proto3\"; package common; message Money { int64 units = 1; }";
        let parsed = ProtoParsed::parse(
            "syntax = \"proto3\"; import \"common.proto\"; message Bill { common.Money total = 1; }",
            &[ResolvedReference::new("common.proto", common)],
        )
        .unwrap();
        assert_eq!(parsed.type_kind("common.Money"), Some(TypeKind::Message));
    }

    #[test]
    fn proto2_labels_survive() {
        let parsed = ProtoParsed::parse(
            "syntax = \"proto2\"; message Legacy { required string id = 1; optional int32 n = 2; }",
            &[],
        )
        .unwrap();
        assert!(parsed.canonical().contains("required string id = 1;"));
    }
}
