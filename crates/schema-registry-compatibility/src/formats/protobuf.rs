//! Protocol Buffers compatibility, reader vs writer
//!
//! Field identity is the tag number, never the name. Messages pair up by
//! fullname; within a pair, a tag the writer uses must still exist in the
//! reader with the same wire shape. A rename at the same tag is fine and
//! reported as a non-breaking note.

use std::collections::HashMap;

use schema_registry_parsers::protobuf::{
    EnumDef, Field, FieldType, Label, Message, ProtoParsed, TypeKind,
};

use crate::violation::{join_path, Violation, ViolationKind};

/// Can `reader` decode every message `writer` may serialize?
pub fn can_read(reader: &ProtoParsed, writer: &ProtoParsed) -> Vec<Violation> {
    let mut violations = Vec::new();

    let reader_messages = reader.message_index();
    let writer_messages = writer.message_index();

    let mut writer_names: Vec<&String> = writer_messages.keys().collect();
    writer_names.sort();

    for fullname in writer_names {
        match reader_messages.get(fullname) {
            None => violations.push(Violation::breaking(
                ViolationKind::MessageRemoved,
                fullname.as_str(),
                format!("message '{fullname}' is missing from the reader schema"),
            )),
            Some(reader_message) => check_message(
                fullname,
                reader,
                writer,
                reader_message,
                writer_messages[fullname],
                &mut violations,
            ),
        }
    }

    check_enums(reader, writer, &mut violations);
    violations
}

fn check_message(
    path: &str,
    reader: &ProtoParsed,
    writer: &ProtoParsed,
    reader_message: &Message,
    writer_message: &Message,
    violations: &mut Vec<Violation>,
) {
    let reader_by_tag: HashMap<u32, &Field> =
        reader_message.fields.iter().map(|f| (f.number, f)).collect();

    for writer_field in &writer_message.fields {
        let field_path = join_path(path, &writer_field.name);
        match reader_by_tag.get(&writer_field.number) {
            None => violations.push(Violation::breaking(
                ViolationKind::FieldRemoved,
                field_path,
                format!(
                    "field '{}' (tag {}) was removed from the reader",
                    writer_field.name, writer_field.number
                ),
            )),
            Some(reader_field) => {
                check_field(&field_path, reader, writer, reader_field, writer_field, violations)
            }
        }
    }
    // tags only the reader declares are fine: old writers simply omit them

    for reader_field in &reader_message.fields {
        if reader_field.label == Label::Required
            && !writer_message
                .fields
                .iter()
                .any(|w| w.number == reader_field.number)
        {
            violations.push(Violation::breaking(
                ViolationKind::RequiredAdded,
                join_path(path, &reader_field.name),
                format!(
                    "required field '{}' (tag {}) is absent from the writer",
                    reader_field.name, reader_field.number
                ),
            ));
        }
    }
}

fn check_field(
    path: &str,
    reader: &ProtoParsed,
    writer: &ProtoParsed,
    reader_field: &Field,
    writer_field: &Field,
    violations: &mut Vec<Violation>,
) {
    if reader_field.name != writer_field.name {
        violations.push(Violation::warning(
            ViolationKind::FieldRenamed,
            path,
            format!(
                "tag {} renamed from '{}' to '{}'",
                writer_field.number, writer_field.name, reader_field.name
            ),
        ));
    }

    let reader_wire = wire_shape(&reader_field.ty, reader);
    let writer_wire = wire_shape(&writer_field.ty, writer);
    if reader_wire != writer_wire {
        violations.push(Violation::breaking(
            ViolationKind::TypeChanged,
            path,
            format!(
                "tag {} changed wire type from {} to {}",
                writer_field.number,
                writer_field.ty.keyword(),
                reader_field.ty.keyword()
            ),
        ));
    } else if let (FieldType::Named(r), FieldType::Named(w)) =
        (&reader_field.ty, &writer_field.ty)
    {
        if last_segment(r) != last_segment(w) {
            violations.push(Violation::breaking(
                ViolationKind::TypeChanged,
                path,
                format!("tag {} changed type from '{w}' to '{r}'", writer_field.number),
            ));
        }
    }

    if reader_field.label == Label::Required && writer_field.label != Label::Required {
        violations.push(Violation::breaking(
            ViolationKind::FieldMadeRequired,
            path,
            format!(
                "field '{}' became required in the reader",
                reader_field.name
            ),
        ));
    }
    if (reader_field.label == Label::Repeated) != (writer_field.label == Label::Repeated) {
        violations.push(Violation::breaking(
            ViolationKind::TypeChanged,
            path,
            format!(
                "field '{}' changed between repeated and singular",
                reader_field.name
            ),
        ));
    }

    check_oneof(path, reader_field, writer_field, violations);
}

fn check_oneof(
    path: &str,
    reader_field: &Field,
    writer_field: &Field,
    violations: &mut Vec<Violation>,
) {
    match (&reader_field.oneof, &writer_field.oneof) {
        (None, None) => {}
        (Some(r), Some(w)) if r == w => {}
        (Some(r), Some(w)) => violations.push(Violation::breaking(
            ViolationKind::OneofChanged,
            path,
            format!("field '{}' moved from oneof '{w}' to '{r}'", reader_field.name),
        )),
        (Some(r), None) => violations.push(Violation::breaking(
            ViolationKind::OneofChanged,
            path,
            format!("field '{}' moved into oneof '{r}'", reader_field.name),
        )),
        (None, Some(w)) => violations.push(Violation::breaking(
            ViolationKind::OneofChanged,
            path,
            format!("field '{}' moved out of oneof '{w}'", reader_field.name),
        )),
    }
}

fn check_enums(reader: &ProtoParsed, writer: &ProtoParsed, violations: &mut Vec<Violation>) {
    let reader_enums = enum_index(reader);
    let writer_enums = enum_index(writer);

    let mut writer_names: Vec<&String> = writer_enums.keys().collect();
    writer_names.sort();

    for fullname in writer_names {
        let writer_enum = writer_enums[fullname];
        let Some(reader_enum) = reader_enums.get(fullname) else {
            violations.push(Violation::breaking(
                ViolationKind::MessageRemoved,
                fullname.as_str(),
                format!("enum '{fullname}' is missing from the reader schema"),
            ));
            continue;
        };
        for (name, number) in &writer_enum.values {
            if !reader_enum.values.iter().any(|(_, n)| n == number) {
                violations.push(Violation::breaking(
                    ViolationKind::EnumValueRemoved,
                    join_path(fullname, name),
                    format!("enum value '{name}' ({number}) was removed from the reader"),
                ));
            }
        }
    }
}

/// Wire-level shape classes; a tag may move within a class without
/// breaking decoders
#[derive(Debug, PartialEq, Eq)]
enum WireShape {
    Varint,
    VarintZigzag,
    Bits32,
    Bits64,
    LengthDelimited,
    Map(Box<WireShape>, Box<WireShape>),
}

fn wire_shape(ty: &FieldType, parsed: &ProtoParsed) -> WireShape {
    match ty {
        FieldType::Int32
        | FieldType::Int64
        | FieldType::Uint32
        | FieldType::Uint64
        | FieldType::Bool => WireShape::Varint,
        FieldType::Sint32 | FieldType::Sint64 => WireShape::VarintZigzag,
        FieldType::Fixed32 | FieldType::Sfixed32 | FieldType::Float => WireShape::Bits32,
        FieldType::Fixed64 | FieldType::Sfixed64 | FieldType::Double => WireShape::Bits64,
        FieldType::String | FieldType::Bytes => WireShape::LengthDelimited,
        FieldType::Map(key, value) => WireShape::Map(
            Box::new(wire_shape(key, parsed)),
            Box::new(wire_shape(value, parsed)),
        ),
        FieldType::Named(name) => match parsed.type_kind(name) {
            Some(TypeKind::Enum) => WireShape::Varint,
            _ => WireShape::LengthDelimited,
        },
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn enum_index(parsed: &ProtoParsed) -> HashMap<String, &EnumDef> {
    let file = parsed.file();
    let mut index = HashMap::new();
    let prefix = file.package.clone().unwrap_or_default();
    for en in &file.enums {
        index.insert(qualified(&prefix, &en.name), en);
    }
    for message in &file.messages {
        index_message_enums(message, &prefix, &mut index);
    }
    index
}

fn index_message_enums<'a>(
    message: &'a Message,
    prefix: &str,
    index: &mut HashMap<String, &'a EnumDef>,
) {
    let fullname = qualified(prefix, &message.name);
    for en in &message.enums {
        index.insert(qualified(&fullname, &en.name), en);
    }
    for nested in &message.messages {
        index_message_enums(nested, &fullname, index);
    }
}

fn qualified(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ProtoParsed {
        ProtoParsed::parse(text, &[]).unwrap()
    }

    fn breaking(reader: &str, writer: &str) -> Vec<Violation> {
        can_read(&parse(reader), &parse(writer))
            .into_iter()
            .filter(Violation::is_breaking)
            .collect()
    }

    const BASE: &str = r#"
        syntax = "proto3";
        message User {
            string name = 1;
            int64 id = 2;
        }
    "#;

    #[test]
    fn identical_schemas_are_compatible() {
        assert!(breaking(BASE, BASE).is_empty());
    }

    #[test]
    fn removing_a_tag_is_breaking() {
        let reader = r#"syntax = "proto3"; message User { string name = 1; }"#;
        let violations = breaking(reader, BASE);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::FieldRemoved);
    }

    #[test]
    fn adding_a_tag_in_the_reader_is_fine() {
        let reader = r#"
            syntax = "proto3";
            message User { string name = 1; int64 id = 2; string email = 3; }
        "#;
        assert!(breaking(reader, BASE).is_empty());
    }

    #[test]
    fn rename_at_same_tag_is_a_warning_only() {
        let reader = r#"syntax = "proto3"; message User { string full_name = 1; int64 id = 2; }"#;
        let all = can_read(&parse(reader), &parse(BASE));
        assert!(all.iter().any(|v| v.kind == ViolationKind::FieldRenamed));
        assert!(all.iter().all(|v| !v.is_breaking()));
    }

    #[test]
    fn wire_type_change_is_breaking() {
        let reader = r#"syntax = "proto3"; message User { string name = 1; string id = 2; }"#;
        let violations = breaking(reader, BASE);
        assert_eq!(violations[0].kind, ViolationKind::TypeChanged);
    }

    #[test]
    fn compatible_varint_widening_is_fine() {
        let reader = r#"syntax = "proto3"; message User { string name = 1; int32 id = 2; }"#;
        assert!(breaking(reader, BASE).is_empty());
        let zigzag_reader =
            r#"syntax = "proto3"; message User { string name = 1; sint64 id = 2; }"#;
        assert!(!breaking(zigzag_reader, BASE).is_empty());
    }

    #[test]
    fn repeated_flip_is_breaking() {
        let reader = r#"syntax = "proto3"; message User { string name = 1; repeated int64 id = 2; }"#;
        assert!(!breaking(reader, BASE).is_empty());
    }

    #[test]
    fn oneof_membership_changes_are_breaking() {
        let writer = r#"
            syntax = "proto3";
            message Event { oneof body { string text = 1; bytes blob = 2; } }
        "#;
        let moved_out = r#"
            syntax = "proto3";
            message Event { string text = 1; oneof body { bytes blob = 2; } }
        "#;
        let violations = breaking(moved_out, writer);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::OneofChanged));
    }

    #[test]
    fn message_removal_is_breaking() {
        let writer = r#"
            syntax = "proto3";
            message A { int32 x = 1; }
            message B { int32 y = 1; }
        "#;
        let reader = r#"syntax = "proto3"; message A { int32 x = 1; }"#;
        let violations = breaking(reader, writer);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::MessageRemoved));
    }

    #[test]
    fn enum_value_removal_is_breaking() {
        let writer = r#"
            syntax = "proto3";
            enum Status { UNKNOWN = 0; ACTIVE = 1; RETIRED = 2; }
            message S { Status status = 1; }
        "#;
        let reader = r#"
            syntax = "proto3";
            enum Status { UNKNOWN = 0; ACTIVE = 1; }
            message S { Status status = 1; }
        "#;
        let violations = breaking(reader, writer);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::EnumValueRemoved));
    }

    #[test]
    fn proto2_required_rules() {
        let writer = r#"syntax = "proto2"; message M { optional int32 a = 1; }"#;
        let made_required = r#"syntax = "proto2"; message M { required int32 a = 1; }"#;
        let violations = breaking(made_required, writer);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::FieldMadeRequired));

        // reader requires a tag the writer never sends
        let reader = r#"syntax = "proto2"; message M { optional int32 a = 1; required int32 b = 2; }"#;
        let violations = breaking(reader, writer);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::RequiredAdded));
    }

    #[test]
    fn message_type_reference_change_is_breaking() {
        let writer = r#"
            syntax = "proto3";
            message Inner1 { int32 a = 1; }
            message Inner2 { int32 a = 1; }
            message Outer { Inner1 child = 1; }
        "#;
        let reader = r#"
            syntax = "proto3";
            message Inner1 { int32 a = 1; }
            message Inner2 { int32 a = 1; }
            message Outer { Inner2 child = 1; }
        "#;
        assert!(!breaking(reader, writer).is_empty());
    }

    #[test]
    fn map_value_change_is_breaking() {
        let writer = r#"syntax = "proto3"; message M { map<string, int64> x = 1; }"#;
        let same = r#"syntax = "proto3"; message M { map<string, int32> x = 1; }"#;
        let changed = r#"syntax = "proto3"; message M { map<string, string> x = 1; }"#;
        assert!(breaking(same, writer).is_empty());
        assert!(!breaking(changed, writer).is_empty());
    }
}
