//! Per-format reader/writer compatibility rules

pub mod avro;
pub mod json_schema;
pub mod protobuf;
