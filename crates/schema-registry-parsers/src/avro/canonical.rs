//! Parsing Canonical Form rendering
//!
//! Key order is fixed per type shape, names are fullnames, and
//! doc/aliases/defaults/order never appear. Each named type is expanded at
//! its first occurrence only; later occurrences are written by name.
//! Types supplied by references stay as names unless expansion is asked
//! for (the "resolved" flavor).

use std::collections::HashSet;

use super::{AvroParsed, AvroSchema};

pub(super) fn render(schema: &AvroSchema, parsed: &AvroParsed, expand_external: bool) -> String {
    let mut out = String::new();
    let mut emitted = HashSet::new();
    write(schema, parsed, expand_external, &mut emitted, &mut out);
    out
}

fn write(
    schema: &AvroSchema,
    parsed: &AvroParsed,
    expand_external: bool,
    emitted: &mut HashSet<String>,
    out: &mut String,
) {
    match schema {
        AvroSchema::Null => out.push_str("\"null\""),
        AvroSchema::Boolean => out.push_str("\"boolean\""),
        AvroSchema::Int => out.push_str("\"int\""),
        AvroSchema::Long => out.push_str("\"long\""),
        AvroSchema::Float => out.push_str("\"float\""),
        AvroSchema::Double => out.push_str("\"double\""),
        AvroSchema::Bytes => out.push_str("\"bytes\""),
        AvroSchema::String => out.push_str("\"string\""),
        AvroSchema::Array(items) => {
            out.push_str(r#"{"type":"array","items":"#);
            write(items, parsed, expand_external, emitted, out);
            out.push('}');
        }
        AvroSchema::Map(values) => {
            out.push_str(r#"{"type":"map","values":"#);
            write(values, parsed, expand_external, emitted, out);
            out.push('}');
        }
        AvroSchema::Union(branches) => {
            out.push('[');
            for (i, branch) in branches.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write(branch, parsed, expand_external, emitted, out);
            }
            out.push(']');
        }
        AvroSchema::Named(fullname) => {
            if emitted.contains(fullname) {
                push_name(fullname, out);
                return;
            }
            let definition = parsed.names.get(fullname).or_else(|| {
                if expand_external {
                    parsed.externals.get(fullname)
                } else {
                    None
                }
            });
            match definition {
                Some(definition) => write(definition, parsed, expand_external, emitted, out),
                None => push_name(fullname, out),
            }
        }
        AvroSchema::Record(record) => {
            let fullname = record.name.fullname();
            if !emitted.insert(fullname.clone()) {
                push_name(&fullname, out);
                return;
            }
            out.push_str("{\"name\":");
            push_name(&fullname, out);
            out.push_str(",\"type\":\"record\",\"fields\":[");
            for (i, field) in record.fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str("{\"name\":");
                push_name(&field.name, out);
                out.push_str(",\"type\":");
                write(&field.schema, parsed, expand_external, emitted, out);
                out.push('}');
            }
            out.push_str("]}");
        }
        AvroSchema::Enum(en) => {
            let fullname = en.name.fullname();
            if !emitted.insert(fullname.clone()) {
                push_name(&fullname, out);
                return;
            }
            out.push_str("{\"name\":");
            push_name(&fullname, out);
            out.push_str(",\"type\":\"enum\",\"symbols\":[");
            for (i, symbol) in en.symbols.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_name(symbol, out);
            }
            out.push_str("]}");
        }
        AvroSchema::Fixed(fixed) => {
            let fullname = fixed.name.fullname();
            if !emitted.insert(fullname.clone()) {
                push_name(&fullname, out);
                return;
            }
            out.push_str("{\"name\":");
            push_name(&fullname, out);
            out.push_str(",\"type\":\"fixed\",\"size\":");
            out.push_str(&fixed.size.to_string());
            out.push('}');
        }
    }
}

// names and symbols are validated to [A-Za-z0-9_.], so no JSON escaping
// can ever be required here
fn push_name(name: &str, out: &mut String) {
    out.push('"');
    out.push_str(name);
    out.push('"');
}
