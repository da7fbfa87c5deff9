//! Avro schema resolution rules, reader vs writer
//!
//! Follows the Avro specification's schema resolution: primitive
//! promotions, records matched field-by-field with reader defaults and
//! aliases, enum symbol coverage with enum defaults, union branch
//! coverage, and fixed name/size identity. Named types resolve by
//! fullname against each side's own name table.

use std::collections::HashSet;

use schema_registry_parsers::avro::{AvroParsed, AvroSchema, EnumDef, FixedDef, Record};

use crate::violation::{join_path, Violation, ViolationKind};

/// Can `reader` decode every value `writer` may have written?
pub fn can_read(reader: &AvroParsed, writer: &AvroParsed) -> Vec<Violation> {
    let mut ctx = Ctx {
        reader,
        writer,
        violations: Vec::new(),
        in_progress: HashSet::new(),
    };
    ctx.check("", reader.root(), writer.root());
    ctx.violations
}

struct Ctx<'a> {
    reader: &'a AvroParsed,
    writer: &'a AvroParsed,
    violations: Vec<Violation>,
    /// (reader record, writer record) pairs on the walk stack, to cut
    /// recursion through self-referential records
    in_progress: HashSet<(String, String)>,
}

impl<'a> Ctx<'a> {
    fn check(&mut self, path: &str, reader: &'a AvroSchema, writer: &'a AvroSchema) {
        let reader = self.reader.dereference(reader);
        let writer = self.writer.dereference(writer);

        use AvroSchema::*;
        match (reader, writer) {
            // identity on primitives
            (Null, Null)
            | (Boolean, Boolean)
            | (Int, Int)
            | (Long, Long)
            | (Float, Float)
            | (Double, Double)
            | (Bytes, Bytes)
            | (String, String) => {}

            // promotions the reader may apply to writer data
            (Long, Int)
            | (Float, Int)
            | (Float, Long)
            | (Double, Int)
            | (Double, Long)
            | (Double, Float)
            | (String, Bytes)
            | (Bytes, String) => {}

            (Array(r), Array(w)) => self.check(&join_path(path, "items"), r, w),
            (Map(r), Map(w)) => self.check(&join_path(path, "values"), r, w),

            // every writer branch must be readable by some reader branch
            (Union(rb), Union(wb)) => {
                for branch in wb {
                    if !rb.iter().any(|r| self.probe(r, branch)) {
                        self.violations.push(Violation::breaking(
                            ViolationKind::UnionBranchUncovered,
                            path,
                            format!(
                                "no reader union branch accepts writer branch {}",
                                describe(self.writer, branch)
                            ),
                        ));
                    }
                }
            }
            // a reader union accepts a bare writer if any branch does
            (Union(rb), w) => {
                if !rb.iter().any(|r| self.probe(r, w)) {
                    self.violations.push(Violation::breaking(
                        ViolationKind::UnionBranchUncovered,
                        path,
                        format!(
                            "no reader union branch accepts writer type {}",
                            describe(self.writer, w)
                        ),
                    ));
                }
            }
            // a bare reader must accept every writer branch
            (r, Union(wb)) => {
                for branch in wb {
                    if !self.probe(r, branch) {
                        self.violations.push(Violation::breaking(
                            ViolationKind::UnionBranchUncovered,
                            path,
                            format!(
                                "reader type {} cannot read writer union branch {}",
                                describe(self.reader, r),
                                describe(self.writer, branch)
                            ),
                        ));
                    }
                }
            }

            (Record(r), Record(w)) => self.check_record(path, r, w),
            (Enum(r), Enum(w)) => self.check_enum(path, r, w),
            (Fixed(r), Fixed(w)) => self.check_fixed(path, r, w),

            (r, w) => self.violations.push(Violation::breaking(
                ViolationKind::TypeChanged,
                path,
                format!(
                    "reader type {} cannot read writer type {}",
                    describe(self.reader, r),
                    describe(self.writer, w)
                ),
            )),
        }
    }

    fn check_record(&mut self, path: &str, reader: &'a Record, writer: &'a Record) {
        let pair = (reader.name.fullname(), writer.name.fullname());
        if pair.0 != pair.1 {
            self.violations.push(Violation::breaking(
                ViolationKind::NameMismatch,
                path,
                format!("record name changed from '{}' to '{}'", pair.1, pair.0),
            ));
            return;
        }
        if !self.in_progress.insert(pair.clone()) {
            return;
        }

        for reader_field in &reader.fields {
            let writer_field = writer
                .fields
                .iter()
                .find(|w| w.name == reader_field.name)
                .or_else(|| {
                    writer
                        .fields
                        .iter()
                        .find(|w| reader_field.aliases.iter().any(|a| a == &w.name))
                });
            match writer_field {
                Some(writer_field) => self.check(
                    &join_path(path, &reader_field.name),
                    &reader_field.schema,
                    &writer_field.schema,
                ),
                None if reader_field.default.is_some() => {}
                None => self.violations.push(Violation::breaking(
                    ViolationKind::RequiredAdded,
                    join_path(path, &reader_field.name),
                    format!(
                        "reader field '{}' has no default value and is missing from the writer schema",
                        reader_field.name
                    ),
                )),
            }
        }
        // writer fields unknown to the reader are skipped by resolution

        self.in_progress.remove(&pair);
    }

    fn check_enum(&mut self, path: &str, reader: &EnumDef, writer: &EnumDef) {
        if reader.name.fullname() != writer.name.fullname() {
            self.violations.push(Violation::breaking(
                ViolationKind::NameMismatch,
                path,
                format!(
                    "enum name changed from '{}' to '{}'",
                    writer.name.fullname(),
                    reader.name.fullname()
                ),
            ));
            return;
        }
        if reader.default.is_some() {
            return;
        }
        let missing: Vec<&str> = writer
            .symbols
            .iter()
            .filter(|s| !reader.symbols.contains(s))
            .map(|s| s.as_str())
            .collect();
        if !missing.is_empty() {
            self.violations.push(Violation::breaking(
                ViolationKind::EnumValueRemoved,
                path,
                format!(
                    "reader enum '{}' has no default and misses writer symbols [{}]",
                    reader.name.fullname(),
                    missing.join(", ")
                ),
            ));
        }
    }

    fn check_fixed(&mut self, path: &str, reader: &FixedDef, writer: &FixedDef) {
        if reader.name.fullname() != writer.name.fullname() {
            self.violations.push(Violation::breaking(
                ViolationKind::NameMismatch,
                path,
                format!(
                    "fixed name changed from '{}' to '{}'",
                    writer.name.fullname(),
                    reader.name.fullname()
                ),
            ));
        } else if reader.size != writer.size {
            self.violations.push(Violation::breaking(
                ViolationKind::FixedSizeChanged,
                path,
                format!(
                    "fixed '{}' size changed from {} to {}",
                    reader.name.fullname(),
                    writer.size,
                    reader.size
                ),
            ));
        }
    }

    /// Silent readability test used for union branch matching
    fn probe(&self, reader: &'a AvroSchema, writer: &'a AvroSchema) -> bool {
        let mut scratch = Ctx {
            reader: self.reader,
            writer: self.writer,
            violations: Vec::new(),
            in_progress: self.in_progress.clone(),
        };
        scratch.check("", reader, writer);
        scratch.violations.iter().all(|v| !v.is_breaking())
    }
}

fn describe(parsed: &AvroParsed, schema: &AvroSchema) -> String {
    match parsed.dereference(schema) {
        AvroSchema::Null => "\"null\"".into(),
        AvroSchema::Boolean => "\"boolean\"".into(),
        AvroSchema::Int => "\"int\"".into(),
        AvroSchema::Long => "\"long\"".into(),
        AvroSchema::Float => "\"float\"".into(),
        AvroSchema::Double => "\"double\"".into(),
        AvroSchema::Bytes => "\"bytes\"".into(),
        AvroSchema::String => "\"string\"".into(),
        AvroSchema::Array(_) => "array".into(),
        AvroSchema::Map(_) => "map".into(),
        AvroSchema::Union(_) => "union".into(),
        named => named
            .name()
            .map(|n| format!("'{n}'"))
            .unwrap_or_else(|| "schema".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> AvroParsed {
        AvroParsed::parse(text, &[]).unwrap()
    }

    fn breaking(reader: &str, writer: &str) -> Vec<Violation> {
        can_read(&parse(reader), &parse(writer))
            .into_iter()
            .filter(Violation::is_breaking)
            .collect()
    }

    #[test]
    fn primitive_promotions() {
        assert!(breaking(r#""long""#, r#""int""#).is_empty());
        assert!(breaking(r#""double""#, r#""float""#).is_empty());
        assert!(breaking(r#""string""#, r#""bytes""#).is_empty());
        assert!(breaking(r#""bytes""#, r#""string""#).is_empty());
        assert!(!breaking(r#""int""#, r#""long""#).is_empty());
        assert!(!breaking(r#""long""#, r#""string""#).is_empty());
    }

    #[test]
    fn reader_field_needs_default_or_writer_value() {
        let writer = r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int"}]}"#;
        let with_default = r#"{"type":"record","name":"R","fields":[
            {"name":"a","type":"int"},{"name":"b","type":"string","default":"x"}]}"#;
        let without_default = r#"{"type":"record","name":"R","fields":[
            {"name":"a","type":"int"},{"name":"b","type":"string"}]}"#;
        assert!(breaking(with_default, writer).is_empty());
        let violations = breaking(without_default, writer);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::RequiredAdded);
    }

    #[test]
    fn writer_extra_fields_are_skipped() {
        let reader = r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int"}]}"#;
        let writer = r#"{"type":"record","name":"R","fields":[
            {"name":"a","type":"int"},{"name":"zombie","type":"string"}]}"#;
        assert!(breaking(reader, writer).is_empty());
    }

    #[test]
    fn reader_alias_matches_renamed_writer_field() {
        let writer = r#"{"type":"record","name":"R","fields":[{"name":"old_name","type":"int"}]}"#;
        let reader = r#"{"type":"record","name":"R","fields":[
            {"name":"new_name","type":"int","aliases":["old_name"]}]}"#;
        assert!(breaking(reader, writer).is_empty());
    }

    #[test]
    fn record_name_must_match() {
        let reader = r#"{"type":"record","name":"A","fields":[]}"#;
        let writer = r#"{"type":"record","name":"B","fields":[]}"#;
        let violations = breaking(reader, writer);
        assert_eq!(violations[0].kind, ViolationKind::NameMismatch);
    }

    #[test]
    fn enum_coverage_and_default() {
        let writer = r#"{"type":"enum","name":"E","symbols":["A","B","C"]}"#;
        let narrow = r#"{"type":"enum","name":"E","symbols":["A","B"]}"#;
        let narrow_with_default =
            r#"{"type":"enum","name":"E","symbols":["A","B"],"default":"A"}"#;
        assert_eq!(breaking(narrow, writer)[0].kind, ViolationKind::EnumValueRemoved);
        assert!(breaking(narrow_with_default, writer).is_empty());
    }

    #[test]
    fn union_branch_coverage() {
        assert!(breaking(r#"["null","string","int"]"#, r#"["null","string"]"#).is_empty());
        let violations = breaking(r#"["null","string"]"#, r#"["null","string","int"]"#);
        assert_eq!(violations[0].kind, ViolationKind::UnionBranchUncovered);
        // bare writer into reader union
        assert!(breaking(r#"["null","long"]"#, r#""int""#).is_empty());
        // bare reader must take every writer branch
        assert!(!breaking(r#""string""#, r#"["null","string"]"#).is_empty());
    }

    #[test]
    fn fixed_identity() {
        let writer = r#"{"type":"fixed","name":"F","size":8}"#;
        assert!(breaking(r#"{"type":"fixed","name":"F","size":8}"#, writer).is_empty());
        assert_eq!(
            breaking(r#"{"type":"fixed","name":"F","size":16}"#, writer)[0].kind,
            ViolationKind::FixedSizeChanged
        );
    }

    #[test]
    fn recursive_records_terminate() {
        let node = r#"{"type":"record","name":"Node","fields":[
            {"name":"next","type":["null","Node"],"default":null}]}"#;
        assert!(breaking(node, node).is_empty());
    }

    #[test]
    fn nested_type_change_reports_path() {
        let reader = r#"{"type":"record","name":"R","fields":[
            {"name":"tags","type":{"type":"array","items":"int"}}]}"#;
        let writer = r#"{"type":"record","name":"R","fields":[
            {"name":"tags","type":{"type":"array","items":"string"}}]}"#;
        let violations = breaking(reader, writer);
        assert_eq!(violations[0].path, "tags.items");
    }
}
